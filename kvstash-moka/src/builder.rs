//! Builder for configuring [`MokaBackend`].

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::{Duration, Instant};

use kvstash_backend::Format;
use kvstash_core::BackendLabel;
use moka::Expiry;
use moka::policy::EvictionPolicy;
use moka::sync::{Cache, CacheBuilder};

use crate::backend::{MokaBackend, StoredEntry};

/// Expiration policy reading the deadline stored in each entry.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct Expiration;

impl Expiry<String, StoredEntry> for Expiration {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &StoredEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Self::remaining(value)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &StoredEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        // The replacing entry carries its own deadline; increments copy the old one.
        Self::remaining(value)
    }
}

impl Expiration {
    fn remaining(value: &StoredEntry) -> Option<Duration> {
        value
            .expires_at
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}

/// Marker type: capacity has not been configured yet.
///
/// Call either [`max_entries()`](MokaBackendBuilder::max_entries) or
/// [`max_bytes()`](MokaBackendBuilder::max_bytes) before `build()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCapacity;

/// Marker type: entry-count capacity has been configured.
#[derive(Debug, Clone, Copy)]
pub struct EntryCapacity(pub(crate) u64);

/// Marker type: byte-based capacity has been configured.
#[derive(Debug, Clone, Copy)]
pub struct ByteCapacity(pub(crate) u64);

/// Builder for creating and configuring a [`MokaBackend`].
///
/// Capacity must be configured with exactly one of
/// [`max_entries`](Self::max_entries) or [`max_bytes`](Self::max_bytes);
/// `build()` only exists afterwards.
///
/// ```
/// use kvstash_moka::MokaBackend;
///
/// let backend = MokaBackend::builder()
///     .label("sessions")
///     .max_entries(10_000)
///     .build();
/// ```
pub struct MokaBackendBuilder<Cap> {
    capacity: Cap,
    label: BackendLabel,
    value_format: Format,
    eviction_policy: Option<EvictionPolicy>,
}

impl MokaBackendBuilder<NoCapacity> {
    /// Creates a new builder with no capacity configured.
    pub fn new() -> Self {
        Self {
            capacity: NoCapacity,
            label: BackendLabel::new_static("moka"),
            value_format: Format::Json,
            eviction_policy: None,
        }
    }

    /// Sets the maximum number of entries the cache can hold.
    pub fn max_entries(self, capacity: u64) -> MokaBackendBuilder<EntryCapacity> {
        self.with_capacity(EntryCapacity(capacity))
    }

    /// Sets the approximate memory budget in bytes, keys included.
    pub fn max_bytes(self, bytes: u64) -> MokaBackendBuilder<ByteCapacity> {
        self.with_capacity(ByteCapacity(bytes))
    }

    fn with_capacity<Cap>(self, capacity: Cap) -> MokaBackendBuilder<Cap> {
        MokaBackendBuilder {
            capacity,
            label: self.label,
            value_format: self.value_format,
            eviction_policy: self.eviction_policy,
        }
    }
}

impl Default for MokaBackendBuilder<NoCapacity> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Cap> MokaBackendBuilder<Cap> {
    /// Sets a custom label for this backend.
    ///
    /// # Default
    ///
    /// `"moka"`
    pub fn label(mut self, label: impl Into<BackendLabel>) -> Self {
        self.label = label.into();
        self
    }

    /// Sets the format typed helpers use for this backend.
    ///
    /// # Default
    ///
    /// [`Format::Json`]
    pub fn value_format(mut self, format: Format) -> Self {
        self.value_format = format;
        self
    }

    /// Sets the eviction policy for the cache.
    ///
    /// # Default
    ///
    /// [`EvictionPolicy::tiny_lfu()`] with entry capacity,
    /// [`EvictionPolicy::lru()`] with byte capacity.
    pub fn eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.eviction_policy = Some(policy);
        self
    }

    fn finish(self, cache: Cache<String, StoredEntry>) -> MokaBackend {
        MokaBackend {
            cache,
            revision: Arc::new(AtomicU64::new(0)),
            label: self.label,
            value_format: self.value_format,
        }
    }
}

impl MokaBackendBuilder<EntryCapacity> {
    /// Builds the [`MokaBackend`] with entry-count based capacity.
    pub fn build(mut self) -> MokaBackend {
        let policy = self
            .eviction_policy
            .take()
            .unwrap_or_else(EvictionPolicy::tiny_lfu);
        let cache = CacheBuilder::new(self.capacity.0)
            .eviction_policy(policy)
            .expire_after(Expiration)
            .build();
        self.finish(cache)
    }
}

impl MokaBackendBuilder<ByteCapacity> {
    /// Builds the [`MokaBackend`] with byte-based capacity.
    ///
    /// Defaults to LRU: TinyLFU admission may reject new weighted entries even
    /// when eviction could make room.
    pub fn build(mut self) -> MokaBackend {
        let policy = self.eviction_policy.take().unwrap_or_else(EvictionPolicy::lru);
        let cache = CacheBuilder::new(self.capacity.0)
            .weigher(Self::byte_weigher)
            .eviction_policy(policy)
            .expire_after(Expiration)
            .build();
        self.finish(cache)
    }

    fn byte_weigher(key: &String, value: &StoredEntry) -> u32 {
        (key.len() + value.memory_size()).min(u32::MAX as usize) as u32
    }
}
