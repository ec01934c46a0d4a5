//! Process-local read mirror in front of a backend.
//!
//! [`HotCache`] remembers the last value it saw for every key, including
//! "not found", and answers repeated reads from memory. Writes go to the
//! wrapped backend first; the mirror follows only when the backend reports
//! success, so the mirror never claims a write the backend did not make.
//!
//! The mirror is never invalidated by writes from other processes. It is meant
//! to live for one logical unit of work, typically one request, and is
//! rejected in [`ExecutionContext::Shared`] unless explicitly allowed.

use std::{collections::HashMap, time::Duration};

use kvstash_core::{BackendLabel, CacheError, Modifier, Raw, encode_counter};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::{Backend, BackendResult, Capabilities, format::Format};

/// Where the decorator is going to live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionContext {
    /// Scoped to one request or unit of work.
    #[default]
    Request,
    /// Reused across unrelated units of work, e.g. a worker or CLI process.
    Shared,
}

/// Hot cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotCacheOptions {
    /// Allow the decorator in [`ExecutionContext::Shared`].
    pub allow_shared_context: bool,
    /// Chance, between 0 and 1, that a read clears the whole mirror first.
    pub gc_probability: f64,
}

impl Default for HotCacheOptions {
    fn default() -> Self {
        Self {
            allow_shared_context: false,
            gc_probability: 0.0,
        }
    }
}

/// Read-through mirror decorator.
///
/// The mirror is guarded by a mutex that is never held across a call to the
/// wrapped backend, so modifiers passed to `create`/`update` may re-enter
/// the decorator.
#[derive(Debug)]
pub struct HotCache<B> {
    backend: B,
    mirror: Mutex<HashMap<String, Option<Raw>>>,
    gc_probability: f64,
}

impl<B: Backend> HotCache<B> {
    /// Wraps `backend` with default options.
    ///
    /// Fails with [`CacheError::Configuration`] in a shared context.
    pub fn new(backend: B, context: ExecutionContext) -> Result<Self, CacheError> {
        Self::builder(backend).context(context).build()
    }

    /// Creates a builder for a decorator around `backend`.
    pub fn builder(backend: B) -> HotCacheBuilder<B> {
        HotCacheBuilder {
            backend,
            context: ExecutionContext::default(),
            options: HotCacheOptions::default(),
        }
    }

    /// Wrapped backend.
    pub fn inner(&self) -> &B {
        &self.backend
    }

    /// Consumes the decorator, returning the wrapped backend.
    pub fn into_inner(self) -> B {
        self.backend
    }

    /// Whether the mirror holds an entry, positive or negative, for `key`.
    pub fn is_hot(&self, key: &str) -> bool {
        self.mirror.lock().contains_key(key)
    }

    /// Number of keys in the mirror.
    pub fn hot_len(&self) -> usize {
        self.mirror.lock().len()
    }

    /// Clears the whole mirror.
    pub fn collect_garbage(&self) {
        let mut mirror = self.mirror.lock();
        warn!(entries = mirror.len(), "hot cache garbage collection");
        mirror.clear();
    }

    fn maybe_collect_garbage(&self) {
        if self.gc_probability > 0.0 && fastrand::f64() < self.gc_probability {
            self.collect_garbage();
        }
    }

    fn remember(&self, key: &str, value: Option<Raw>) {
        self.mirror.lock().insert(key.to_owned(), value);
    }

    fn forget(&self, key: &str) {
        self.mirror.lock().remove(key);
    }
}

impl<B: Backend> Backend for HotCache<B> {
    fn get(&self, key: &str) -> BackendResult<Option<Raw>> {
        self.maybe_collect_garbage();
        if let Some(value) = self.mirror.lock().get(key) {
            debug!(key, found = value.is_some(), "hot cache hit");
            return Ok(value.clone());
        }
        debug!(key, "hot cache miss");
        let value = self.backend.get(key)?;
        self.remember(key, value.clone());
        Ok(value)
    }

    fn mget(&self, keys: &[String]) -> BackendResult<HashMap<String, Raw>> {
        self.maybe_collect_garbage();
        let mut result = HashMap::with_capacity(keys.len());
        let mut misses = Vec::new();
        {
            let mirror = self.mirror.lock();
            for key in keys {
                match mirror.get(key) {
                    Some(Some(value)) => {
                        result.insert(key.clone(), value.clone());
                    }
                    Some(None) => {}
                    None => misses.push(key.clone()),
                }
            }
        }
        debug!(hits = keys.len() - misses.len(), misses = misses.len(), "hot cache mget");
        if misses.is_empty() {
            return Ok(result);
        }

        let fetched = self.backend.mget(&misses)?;
        let mut mirror = self.mirror.lock();
        for key in misses {
            let value = fetched.get(&key).cloned();
            if let Some(value) = &value {
                result.insert(key.clone(), value.clone());
            }
            mirror.insert(key, value);
        }
        Ok(result)
    }

    fn set(&self, key: &str, value: Raw, ttl: Option<Duration>) -> BackendResult<bool> {
        match self.backend.set(key, value.clone(), ttl) {
            Ok(true) => {
                self.remember(key, Some(value));
                Ok(true)
            }
            other => {
                self.forget(key);
                other
            }
        }
    }

    fn mset(&self, entries: &[(String, Raw)], ttl: Option<Duration>) -> BackendResult<usize> {
        let result = self.backend.mset(entries, ttl);
        let mut mirror = self.mirror.lock();
        match &result {
            Ok(written) if *written == entries.len() => {
                for (key, value) in entries {
                    mirror.insert(key.clone(), Some(value.clone()));
                }
            }
            _ => {
                for (key, _) in entries {
                    mirror.remove(key);
                }
            }
        }
        result
    }

    fn add(&self, key: &str, value: Raw, ttl: Option<Duration>) -> BackendResult<bool> {
        match self.backend.add(key, value.clone(), ttl) {
            Ok(true) => {
                self.remember(key, Some(value));
                Ok(true)
            }
            other => {
                // The key exists with a value we have not seen.
                self.forget(key);
                other
            }
        }
    }

    fn create(
        &self,
        key: &str,
        modifier: Modifier<'_>,
        ttl: Option<Duration>,
    ) -> BackendResult<Option<Raw>> {
        let result = self.backend.create(key, modifier, ttl);
        self.sync_written(key, &result);
        result
    }

    fn update(
        &self,
        key: &str,
        modifier: Modifier<'_>,
        ttl: Option<Duration>,
    ) -> BackendResult<Option<Raw>> {
        let result = self.backend.update(key, modifier, ttl);
        self.sync_written(key, &result);
        result
    }

    fn delete(&self, key: &str) -> BackendResult<bool> {
        self.forget(key);
        self.backend.delete(key)
    }

    fn mdelete(&self, keys: &[String]) -> BackendResult<usize> {
        {
            let mut mirror = self.mirror.lock();
            for key in keys {
                mirror.remove(key);
            }
        }
        self.backend.mdelete(keys)
    }

    fn increment(&self, key: &str, delta: i64) -> BackendResult<i64> {
        match self.backend.increment(key, delta) {
            Ok(value) => {
                self.remember(key, Some(encode_counter(value)));
                Ok(value)
            }
            Err(err) => {
                self.forget(key);
                Err(err)
            }
        }
    }

    fn flush(&self) -> BackendResult<bool> {
        self.mirror.lock().clear();
        trace!(backend = %self.backend.label(), "hot cache flushed");
        self.backend.flush()
    }

    fn label(&self) -> BackendLabel {
        self.backend.label().decorated_by("hot")
    }

    fn capabilities(&self) -> Capabilities {
        self.backend.capabilities()
    }

    fn value_format(&self) -> Format {
        self.backend.value_format()
    }
}

impl<B: Backend> HotCache<B> {
    fn sync_written(&self, key: &str, result: &BackendResult<Option<Raw>>) {
        match result {
            Ok(Some(value)) => self.remember(key, Some(value.clone())),
            // Nothing written, or the entry changed under us: next read goes through.
            _ => self.forget(key),
        }
    }
}

/// Builder for [`HotCache`].
pub struct HotCacheBuilder<B> {
    backend: B,
    context: ExecutionContext,
    options: HotCacheOptions,
}

impl<B: Backend> HotCacheBuilder<B> {
    /// Execution context the decorator is created in.
    pub fn context(mut self, context: ExecutionContext) -> Self {
        self.context = context;
        self
    }

    /// Replaces all options at once.
    pub fn options(mut self, options: HotCacheOptions) -> Self {
        self.options = options;
        self
    }

    /// Allow use in a shared context.
    pub fn allow_shared_context(mut self, allow: bool) -> Self {
        self.options.allow_shared_context = allow;
        self
    }

    /// Probability that a read clears the mirror first.
    pub fn gc_probability(mut self, probability: f64) -> Self {
        self.options.gc_probability = probability;
        self
    }

    /// Builds the decorator.
    pub fn build(self) -> Result<HotCache<B>, CacheError> {
        if self.context == ExecutionContext::Shared && !self.options.allow_shared_context {
            return Err(CacheError::Configuration(
                "hot cache is not allowed in a shared execution context".to_owned(),
            ));
        }
        if !(0.0..=1.0).contains(&self.options.gc_probability) {
            return Err(CacheError::Configuration(format!(
                "gc probability must be between 0 and 1, got {}",
                self.options.gc_probability
            )));
        }
        Ok(HotCache {
            backend: self.backend,
            mirror: Mutex::new(HashMap::new()),
            gc_probability: self.options.gc_probability,
        })
    }
}
