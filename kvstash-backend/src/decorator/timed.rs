use std::{collections::HashMap, time::Duration};

use kvstash_core::{BackendLabel, Modifier, Operation, Raw};

use crate::{Backend, BackendResult, Capabilities, format::Format, metrics::Timer};

/// Records the duration of every operation of the wrapped backend.
///
/// Samples are labelled with the provider name, which defaults to the storage
/// at the bottom of the wrapped chain, and the operation name. Results and errors pass through
/// untouched. With the `metrics` feature disabled this is a plain forwarder.
pub struct Timed<B> {
    backend: B,
    provider: BackendLabel,
}

impl<B: Backend> Timed<B> {
    /// Wraps `backend`, naming the provider after the storage it ends in:
    /// `redis` for a hot cache over Redis.
    pub fn new(backend: B) -> Self {
        let provider = BackendLabel::new(backend.label().storage());
        Self { backend, provider }
    }

    /// Wraps `backend` under an explicit provider name.
    pub fn with_provider(backend: B, provider: impl Into<BackendLabel>) -> Self {
        Self {
            backend,
            provider: provider.into(),
        }
    }

    /// Provider name used in metric labels.
    pub fn provider(&self) -> &BackendLabel {
        &self.provider
    }

    /// Wrapped backend.
    pub fn inner(&self) -> &B {
        &self.backend
    }

    #[inline]
    fn measure<T>(&self, operation: Operation, f: impl FnOnce(&B) -> T) -> T {
        let timer = Timer::start(self.provider.clone(), operation);
        let result = f(&self.backend);
        timer.stop();
        result
    }
}

impl<B: Backend> Backend for Timed<B> {
    fn get(&self, key: &str) -> BackendResult<Option<Raw>> {
        self.measure(Operation::Get, |b| b.get(key))
    }

    fn mget(&self, keys: &[String]) -> BackendResult<HashMap<String, Raw>> {
        self.measure(Operation::Mget, |b| b.mget(keys))
    }

    fn set(&self, key: &str, value: Raw, ttl: Option<Duration>) -> BackendResult<bool> {
        self.measure(Operation::Set, |b| b.set(key, value, ttl))
    }

    fn mset(&self, entries: &[(String, Raw)], ttl: Option<Duration>) -> BackendResult<usize> {
        self.measure(Operation::Mset, |b| b.mset(entries, ttl))
    }

    fn add(&self, key: &str, value: Raw, ttl: Option<Duration>) -> BackendResult<bool> {
        self.measure(Operation::Add, |b| b.add(key, value, ttl))
    }

    fn create(
        &self,
        key: &str,
        modifier: Modifier<'_>,
        ttl: Option<Duration>,
    ) -> BackendResult<Option<Raw>> {
        self.measure(Operation::Create, |b| b.create(key, modifier, ttl))
    }

    fn update(
        &self,
        key: &str,
        modifier: Modifier<'_>,
        ttl: Option<Duration>,
    ) -> BackendResult<Option<Raw>> {
        self.measure(Operation::Update, |b| b.update(key, modifier, ttl))
    }

    fn delete(&self, key: &str) -> BackendResult<bool> {
        self.measure(Operation::Delete, |b| b.delete(key))
    }

    fn mdelete(&self, keys: &[String]) -> BackendResult<usize> {
        self.measure(Operation::Mdelete, |b| b.mdelete(keys))
    }

    fn increment(&self, key: &str, delta: i64) -> BackendResult<i64> {
        self.measure(Operation::Increment, |b| b.increment(key, delta))
    }

    fn flush(&self) -> BackendResult<bool> {
        self.measure(Operation::Flush, |b| b.flush())
    }

    fn label(&self) -> BackendLabel {
        self.backend.label().decorated_by("timed")
    }

    fn capabilities(&self) -> Capabilities {
        self.backend.capabilities()
    }

    fn value_format(&self) -> Format {
        self.backend.value_format()
    }
}
