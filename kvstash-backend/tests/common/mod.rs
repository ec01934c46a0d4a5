//! In-memory stub backend for tests, built on DashMap.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use kvstash_backend::atomic::{self, CompareAndSwap, Snapshot};
use kvstash_backend::{
    Backend, BackendLabel, BackendResult, CacheError, Capabilities, Modifier, Operation, Raw,
};
use kvstash_core::{decode_counter, encode_counter};
use parking_lot::Mutex;

#[derive(Clone)]
struct Stored {
    value: Raw,
    revision: u64,
}

/// Stub backend counting how often each operation reaches it.
///
/// Cloning shares the store and the counters.
#[derive(Clone, Default)]
pub struct CountingBackend {
    store: Arc<DashMap<String, Stored>>,
    revision: Arc<AtomicU64>,
    calls: Arc<DashMap<Operation, usize>>,
    fetched: Arc<Mutex<Vec<String>>>,
}

impl CountingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times `operation` reached the store.
    pub fn calls(&self, operation: Operation) -> usize {
        self.calls.get(&operation).map(|n| *n).unwrap_or(0)
    }

    /// Keys requested from the store by `get` and `mget`, in order.
    pub fn fetched_keys(&self) -> Vec<String> {
        self.fetched.lock().clone()
    }

    /// Writes directly into the store, bypassing any decorator.
    pub fn put(&self, key: &str, value: &'static str) {
        self.write(key, Raw::from_static(value.as_bytes()));
    }

    /// Reads directly from the store.
    pub fn peek(&self, key: &str) -> Option<Raw> {
        self.store.get(key).map(|stored| stored.value.clone())
    }

    fn record(&self, operation: Operation) {
        *self.calls.entry(operation).or_insert(0) += 1;
    }

    fn next_revision(&self) -> u64 {
        self.revision.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn write(&self, key: &str, value: Raw) {
        let revision = self.next_revision();
        self.store.insert(key.to_owned(), Stored { value, revision });
    }
}

impl Backend for CountingBackend {
    fn get(&self, key: &str) -> BackendResult<Option<Raw>> {
        self.record(Operation::Get);
        self.fetched.lock().push(key.to_owned());
        Ok(self.peek(key))
    }

    fn mget(&self, keys: &[String]) -> BackendResult<HashMap<String, Raw>> {
        self.record(Operation::Mget);
        self.fetched.lock().extend(keys.iter().cloned());
        Ok(keys
            .iter()
            .filter_map(|key| self.peek(key).map(|value| (key.clone(), value)))
            .collect())
    }

    fn set(&self, key: &str, value: Raw, _ttl: Option<Duration>) -> BackendResult<bool> {
        self.record(Operation::Set);
        self.write(key, value);
        Ok(true)
    }

    fn mset(&self, entries: &[(String, Raw)], _ttl: Option<Duration>) -> BackendResult<usize> {
        self.record(Operation::Mset);
        for (key, value) in entries {
            self.write(key, value.clone());
        }
        Ok(entries.len())
    }

    fn add(&self, key: &str, value: Raw, _ttl: Option<Duration>) -> BackendResult<bool> {
        self.record(Operation::Add);
        let revision = self.next_revision();
        match self.store.entry(key.to_owned()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(vacant) => {
                vacant.insert(Stored { value, revision });
                Ok(true)
            }
        }
    }

    fn create(
        &self,
        key: &str,
        modifier: Modifier<'_>,
        ttl: Option<Duration>,
    ) -> BackendResult<Option<Raw>> {
        self.record(Operation::Create);
        atomic::create(self, key, modifier, ttl)
    }

    fn update(
        &self,
        key: &str,
        modifier: Modifier<'_>,
        ttl: Option<Duration>,
    ) -> BackendResult<Option<Raw>> {
        self.record(Operation::Update);
        atomic::update(self, key, modifier, ttl)
    }

    fn delete(&self, key: &str) -> BackendResult<bool> {
        self.record(Operation::Delete);
        Ok(self.store.remove(key).is_some())
    }

    fn mdelete(&self, keys: &[String]) -> BackendResult<usize> {
        self.record(Operation::Mdelete);
        Ok(keys
            .iter()
            .filter(|key| self.store.remove(key.as_str()).is_some())
            .count())
    }

    fn increment(&self, key: &str, delta: i64) -> BackendResult<i64> {
        self.record(Operation::Increment);
        atomic::validate_delta(delta)?;
        let revision = self.next_revision();
        let mut entry = self.store.entry(key.to_owned()).or_insert(Stored {
            value: encode_counter(0),
            revision,
        });
        let current = decode_counter(&entry.value).ok_or_else(|| {
            CacheError::internal(std::io::Error::other("value is not an integer"))
        })?;
        let next = current + delta;
        entry.value = encode_counter(next);
        entry.revision = revision;
        Ok(next)
    }

    fn flush(&self) -> BackendResult<bool> {
        self.record(Operation::Flush);
        self.store.clear();
        Ok(true)
    }

    fn label(&self) -> BackendLabel {
        BackendLabel::new_static("counting")
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }
}

impl CompareAndSwap for CountingBackend {
    type Token = Option<u64>;

    fn read_for_update(&self, key: &str) -> BackendResult<Snapshot<Self::Token>> {
        let stored = self.store.get(key).map(|stored| stored.clone());
        Ok(Snapshot {
            value: stored.as_ref().map(|s| s.value.clone()),
            token: stored.map(|s| s.revision),
        })
    }

    fn write_if_unchanged(
        &self,
        key: &str,
        token: Self::Token,
        value: Raw,
        _ttl: Option<Duration>,
    ) -> BackendResult<bool> {
        let revision = self.next_revision();
        match (self.store.entry(key.to_owned()), token) {
            (Entry::Vacant(vacant), None) => {
                vacant.insert(Stored { value, revision });
                Ok(true)
            }
            (Entry::Occupied(mut occupied), Some(seen)) if occupied.get().revision == seen => {
                occupied.insert(Stored { value, revision });
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Backend offering only the single-key operations.
#[derive(Clone, Default)]
pub struct SingleKeyBackend {
    inner: CountingBackend,
}

impl SingleKeyBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for SingleKeyBackend {
    fn get(&self, key: &str) -> BackendResult<Option<Raw>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: Raw, ttl: Option<Duration>) -> BackendResult<bool> {
        self.inner.set(key, value, ttl)
    }

    fn add(&self, key: &str, value: Raw, ttl: Option<Duration>) -> BackendResult<bool> {
        self.inner.add(key, value, ttl)
    }

    fn delete(&self, key: &str) -> BackendResult<bool> {
        self.inner.delete(key)
    }

    fn increment(&self, key: &str, delta: i64) -> BackendResult<i64> {
        self.inner.increment(key, delta)
    }

    fn flush(&self) -> BackendResult<bool> {
        self.inner.flush()
    }

    fn label(&self) -> BackendLabel {
        BackendLabel::new_static("single")
    }
}

/// Backend whose every operation fails with a transport error.
#[derive(Clone, Default)]
pub struct ErrorBackend;

fn simulated() -> CacheError {
    CacheError::connection(std::io::Error::other("simulated error"))
}

impl Backend for ErrorBackend {
    fn get(&self, _key: &str) -> BackendResult<Option<Raw>> {
        Err(simulated())
    }

    fn set(&self, _key: &str, _value: Raw, _ttl: Option<Duration>) -> BackendResult<bool> {
        Err(simulated())
    }

    fn add(&self, _key: &str, _value: Raw, _ttl: Option<Duration>) -> BackendResult<bool> {
        Err(simulated())
    }

    fn delete(&self, _key: &str) -> BackendResult<bool> {
        Err(simulated())
    }

    fn increment(&self, _key: &str, _delta: i64) -> BackendResult<i64> {
        Err(simulated())
    }

    fn flush(&self) -> BackendResult<bool> {
        Err(simulated())
    }

    fn label(&self) -> BackendLabel {
        BackendLabel::new_static("error")
    }
}

pub fn raw(value: &'static str) -> Raw {
    Raw::from_static(value.as_bytes())
}

pub fn keys(keys: &[&str]) -> Vec<String> {
    keys.iter().map(|key| key.to_string()).collect()
}
