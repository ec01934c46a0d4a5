//! Moka backend implementation.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use kvstash_backend::atomic::{self, CompareAndSwap, Snapshot};
use kvstash_backend::{Backend, BackendResult, Capabilities, Format};
use kvstash_core::{
    BackendLabel, CacheError, Modifier, Raw, decode_counter, effective_ttl, encode_counter,
};
use moka::ops::compute::Op;
use moka::sync::Cache;
use tracing::trace;

/// Fixed per-entry overhead used by the byte weigher.
const ENTRY_OVERHEAD: usize = 48;

/// Value as stored in moka.
#[derive(Clone, Debug)]
pub(crate) struct StoredEntry {
    pub(crate) value: Raw,
    /// Changes on every write; the compare-and-swap token.
    pub(crate) revision: u64,
    pub(crate) expires_at: Option<Instant>,
}

impl StoredEntry {
    pub(crate) fn memory_size(&self) -> usize {
        self.value.len() + ENTRY_OVERHEAD
    }
}

/// In-memory cache backend powered by Moka.
///
/// The only copy of the data lives in this process, but modifiers passed to
/// `create`/`update` can still write the key they are computing. Every entry
/// therefore carries a revision, and the final write of the atomic protocol is
/// a compare-and-swap on it performed inside moka's per-key compute lock.
///
/// # Caveats
///
/// - Data is **not persisted** and **not shared** across processes
/// - Clones share the same cache
///
/// ```
/// use kvstash_backend::Backend;
/// use kvstash_moka::MokaBackend;
///
/// let backend = MokaBackend::builder().max_entries(1_000).build();
/// backend.set("greeting", "hello".into(), None).unwrap();
/// assert_eq!(backend.get("greeting").unwrap().as_deref(), Some(&b"hello"[..]));
/// ```
#[derive(Clone)]
pub struct MokaBackend {
    pub(crate) cache: Cache<String, StoredEntry>,
    pub(crate) revision: Arc<AtomicU64>,
    pub(crate) label: BackendLabel,
    pub(crate) value_format: Format,
}

impl std::fmt::Debug for MokaBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaBackend")
            .field("label", &self.label)
            .field("cache", &self.cache)
            .field("value_format", &self.value_format)
            .finish()
    }
}

impl MokaBackend {
    /// Creates a new builder for `MokaBackend`.
    pub fn builder() -> crate::builder::MokaBackendBuilder<crate::builder::NoCapacity> {
        crate::builder::MokaBackendBuilder::new()
    }

    /// Runs moka's pending maintenance: evictions, expirations, invalidations.
    pub fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks();
    }

    /// Approximate number of entries, accurate after [`run_pending_tasks`](Self::run_pending_tasks).
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    fn entry(&self, value: Raw, expires_at: Option<Instant>) -> StoredEntry {
        StoredEntry {
            value,
            revision: self.revision.fetch_add(1, Ordering::Relaxed) + 1,
            expires_at,
        }
    }

    fn fresh(&self, value: Raw, ttl: Option<Duration>) -> StoredEntry {
        let expires_at = effective_ttl(ttl).map(|ttl| Instant::now() + ttl);
        self.entry(value, expires_at)
    }
}

impl Backend for MokaBackend {
    fn get(&self, key: &str) -> BackendResult<Option<Raw>> {
        Ok(self.cache.get(key).map(|entry| entry.value))
    }

    fn mget(&self, keys: &[String]) -> BackendResult<HashMap<String, Raw>> {
        Ok(keys
            .iter()
            .filter_map(|key| self.cache.get(key).map(|entry| (key.clone(), entry.value)))
            .collect())
    }

    fn set(&self, key: &str, value: Raw, ttl: Option<Duration>) -> BackendResult<bool> {
        self.cache.insert(key.to_owned(), self.fresh(value, ttl));
        Ok(true)
    }

    fn mset(&self, entries: &[(String, Raw)], ttl: Option<Duration>) -> BackendResult<usize> {
        for (key, value) in entries {
            self.cache.insert(key.clone(), self.fresh(value.clone(), ttl));
        }
        Ok(entries.len())
    }

    fn add(&self, key: &str, value: Raw, ttl: Option<Duration>) -> BackendResult<bool> {
        let entry = self
            .cache
            .entry(key.to_owned())
            .or_insert_with(|| self.fresh(value, ttl));
        Ok(entry.is_fresh())
    }

    fn create(
        &self,
        key: &str,
        modifier: Modifier<'_>,
        ttl: Option<Duration>,
    ) -> BackendResult<Option<Raw>> {
        atomic::create(self, key, modifier, ttl)
    }

    fn update(
        &self,
        key: &str,
        modifier: Modifier<'_>,
        ttl: Option<Duration>,
    ) -> BackendResult<Option<Raw>> {
        atomic::update(self, key, modifier, ttl)
    }

    fn delete(&self, key: &str) -> BackendResult<bool> {
        Ok(self.cache.remove(key).is_some())
    }

    fn mdelete(&self, keys: &[String]) -> BackendResult<usize> {
        Ok(keys
            .iter()
            .filter(|key| self.cache.remove(key.as_str()).is_some())
            .count())
    }

    fn increment(&self, key: &str, delta: i64) -> BackendResult<i64> {
        atomic::validate_delta(delta)?;
        let mut outcome = Ok(delta);
        self.cache
            .entry(key.to_owned())
            .and_compute_with(|current| match current {
                None => Op::Put(self.fresh(encode_counter(delta), None)),
                Some(current) => {
                    let current = current.into_value();
                    match decode_counter(&current.value).and_then(|n| n.checked_add(delta)) {
                        Some(next) => {
                            outcome = Ok(next);
                            Op::Put(self.entry(encode_counter(next), current.expires_at))
                        }
                        None => {
                            outcome = Err(CacheError::internal(std::io::Error::other(format!(
                                "value of \"{key}\" is not an integer or would overflow"
                            ))));
                            Op::Nop
                        }
                    }
                }
            });
        outcome
    }

    fn flush(&self) -> BackendResult<bool> {
        trace!(backend = %self.label, "invalidating all entries");
        self.cache.invalidate_all();
        Ok(true)
    }

    fn label(&self) -> BackendLabel {
        self.label.clone()
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    fn value_format(&self) -> Format {
        self.value_format
    }
}

impl CompareAndSwap for MokaBackend {
    type Token = Option<u64>;

    fn read_for_update(&self, key: &str) -> BackendResult<Snapshot<Self::Token>> {
        let current = self.cache.get(key);
        Ok(Snapshot {
            token: current.as_ref().map(|entry| entry.revision),
            value: current.map(|entry| entry.value),
        })
    }

    fn write_if_unchanged(
        &self,
        key: &str,
        token: Self::Token,
        value: Raw,
        ttl: Option<Duration>,
    ) -> BackendResult<bool> {
        let mut written = false;
        self.cache
            .entry(key.to_owned())
            .and_compute_with(|current| {
                if current.map(|entry| entry.into_value().revision) == token {
                    written = true;
                    Op::Put(self.fresh(value, ttl))
                } else {
                    Op::Nop
                }
            });
        Ok(written)
    }
}
