use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bincode::{
    config::standard as bincode_config,
    serde::{decode_from_slice, encode_to_vec},
};
use chrono::{DateTime, Utc};
use feoxdb::constants::MAX_KEY_SIZE;
use feoxdb::{FeoxError, FeoxStore};
use kvstash_backend::atomic;
use kvstash_backend::{Backend, BackendResult, Capabilities, Format};
use kvstash_core::{
    BackendLabel, CacheError, Operation, Raw, decode_counter, effective_ttl, encode_counter,
    ttl_secs,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::FeOxDbError;

/// What is written to FeOxDB for every key.
#[derive(Serialize, Deserialize)]
struct Envelope {
    #[serde(with = "serde_bytes")]
    data: Vec<u8>,
    expire: Option<DateTime<Utc>>,
}

impl Envelope {
    fn new(data: &[u8], ttl: Option<Duration>) -> Self {
        Self {
            data: data.to_vec(),
            expire: effective_ttl(ttl)
                .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
                .map(|ttl| Utc::now() + ttl),
        }
    }

    fn is_expired(&self) -> bool {
        self.expire.is_some_and(|expire| expire <= Utc::now())
    }

    /// Time left, `None` when the entry never expires.
    fn remaining(&self) -> Option<Duration> {
        self.expire.map(|expire| {
            (expire - Utc::now())
                .to_std()
                .unwrap_or(Duration::from_millis(1))
        })
    }
}

/// Keys fetched per `range_query` round while flushing.
const FLUSH_BATCH: usize = 1024;

/// Embedded cache backend using FeOxDB.
///
/// Use this when cache data must survive restarts or doesn't fit in memory.
/// Every write goes through one process-local lock, so `add` and `increment`
/// see a stable value. Other processes opening the same file are not
/// coordinated with.
///
/// `flush` deletes every key in the store, including keys persisted by an
/// earlier process.
#[derive(Clone)]
pub struct FeOxDbBackend {
    store: Arc<FeoxStore>,
    write_lock: Arc<Mutex<()>>,
    label: BackendLabel,
    value_format: Format,
}

impl std::fmt::Debug for FeOxDbBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeOxDbBackend")
            .field("label", &self.label)
            .field("value_format", &self.value_format)
            .finish_non_exhaustive()
    }
}

impl FeOxDbBackend {
    /// Creates a builder. Without a path the store lives in memory.
    pub fn builder() -> FeOxDbBackendBuilder {
        FeOxDbBackendBuilder::default()
    }

    /// Creates an in-memory backend.
    ///
    /// Data is lost when dropped. Equivalent to `builder().build()`.
    pub fn in_memory() -> Result<Self, FeOxDbError> {
        Self::builder().build()
    }

    /// Persists buffered writes to disk. A no-op for in-memory stores.
    pub fn sync(&self) -> Result<(), FeOxDbError> {
        Ok(self.store.flush()?)
    }

    fn read(&self, key: &str) -> Result<Option<Envelope>, FeOxDbError> {
        let encoded = match self.store.get(key.as_bytes()) {
            Ok(encoded) => encoded,
            Err(FeoxError::KeyNotFound) => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let (envelope, _): (Envelope, _) = decode_from_slice(&encoded, bincode_config())?;
        Ok((!envelope.is_expired()).then_some(envelope))
    }

    /// Caller must hold `write_lock`. Returns `false` when FeOxDB keeps a
    /// record stamped later than this write.
    fn write(&self, key: &str, envelope: &Envelope) -> Result<bool, FeOxDbError> {
        let encoded = encode_to_vec(envelope, bincode_config())?;
        let inserted = match ttl_secs(envelope.remaining()) {
            Some(secs) => self
                .store
                .insert_with_ttl(key.as_bytes(), &encoded, secs)
                .map(drop),
            None => self.store.insert(key.as_bytes(), &encoded).map(drop),
        };
        match inserted {
            Ok(()) => Ok(true),
            Err(FeoxError::OlderTimestamp) => {
                debug!(backend = %self.label, key, "newer record kept, write skipped");
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Caller must hold `write_lock`.
    fn remove(&self, key: &str) -> Result<bool, FeOxDbError> {
        let live = self.read(key)?.is_some();
        match self.store.delete(key.as_bytes()) {
            Ok(()) | Err(FeoxError::KeyNotFound) => Ok(live),
            Err(FeoxError::OlderTimestamp) => {
                debug!(backend = %self.label, key, "newer record kept, delete skipped");
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Caller must hold `write_lock`. Walks the key space in sorted batches,
    /// resuming just past the last key seen.
    fn remove_all(&self) -> Result<usize, FeOxDbError> {
        let end = vec![u8::MAX; MAX_KEY_SIZE];
        let mut start = Vec::new();
        let mut removed = 0;
        loop {
            let batch = self.store.range_query(&start, &end, FLUSH_BATCH)?;
            let Some((last, _)) = batch.last() else {
                return Ok(removed);
            };
            start = last.clone();
            start.push(0);
            for (key, _) in &batch {
                match self.store.delete(key) {
                    Ok(()) => removed += 1,
                    Err(FeoxError::KeyNotFound) => {}
                    Err(err) => return Err(err.into()),
                }
            }
            if batch.len() < FLUSH_BATCH {
                return Ok(removed);
            }
        }
    }
}

/// Builder for [`FeOxDbBackend`].
///
/// ```no_run
/// use kvstash_feoxdb::FeOxDbBackend;
///
/// let backend = FeOxDbBackend::builder()
///     .path("/var/cache/myapp")
///     .max_file_size(5 * 1024 * 1024 * 1024)  // 5 GB
///     .max_memory(256 * 1024 * 1024)          // 256 MB
///     .label("persistent")
///     .build()?;
/// # Ok::<(), kvstash_feoxdb::FeOxDbError>(())
/// ```
#[derive(Debug)]
pub struct FeOxDbBackendBuilder {
    path: Option<PathBuf>,
    max_file_size: Option<u64>,
    max_memory: Option<usize>,
    label: BackendLabel,
    value_format: Format,
}

impl Default for FeOxDbBackendBuilder {
    fn default() -> Self {
        Self {
            path: None,
            max_file_size: None,
            max_memory: None,
            label: BackendLabel::new_static("feoxdb"),
            value_format: Format::Json,
        }
    }
}

impl FeOxDbBackendBuilder {
    /// Stores data in a file. A directory gets a `cache.db` inside it.
    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Maximum size of the database file in bytes.
    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = Some(bytes);
        self
    }

    /// Maximum memory FeOxDB may use in bytes.
    pub fn max_memory(mut self, bytes: usize) -> Self {
        self.max_memory = Some(bytes);
        self
    }

    /// Sets a custom label for this backend.
    pub fn label(mut self, label: impl Into<BackendLabel>) -> Self {
        self.label = label.into();
        self
    }

    /// Sets the format typed helpers use on top of this backend.
    pub fn value_format(mut self, format: Format) -> Self {
        self.value_format = format;
        self
    }

    /// Creates the backend.
    ///
    /// Fails if the database file can't be opened or created.
    pub fn build(self) -> Result<FeOxDbBackend, FeOxDbError> {
        let mut builder = FeoxStore::builder().enable_ttl(true);

        if let Some(mut path) = self.path {
            if path.is_dir() {
                path.push("cache.db");
            }
            builder = builder.device_path(path.to_string_lossy().to_string());
        }

        if let Some(file_size) = self.max_file_size {
            builder = builder.file_size(file_size);
        }

        if let Some(memory) = self.max_memory {
            builder = builder.max_memory(memory);
        }

        Ok(FeOxDbBackend {
            store: Arc::new(builder.build()?),
            write_lock: Arc::default(),
            label: self.label,
            value_format: self.value_format,
        })
    }
}

impl Backend for FeOxDbBackend {
    fn get(&self, key: &str) -> BackendResult<Option<Raw>> {
        Ok(self.read(key)?.map(|envelope| Raw::from(envelope.data)))
    }

    fn set(&self, key: &str, value: Raw, ttl: Option<Duration>) -> BackendResult<bool> {
        let _guard = self.write_lock.lock();
        Ok(self.write(key, &Envelope::new(&value, ttl))?)
    }

    fn add(&self, key: &str, value: Raw, ttl: Option<Duration>) -> BackendResult<bool> {
        let _guard = self.write_lock.lock();
        if self.read(key)?.is_some() {
            return Ok(false);
        }
        Ok(self.write(key, &Envelope::new(&value, ttl))?)
    }

    fn delete(&self, key: &str) -> BackendResult<bool> {
        let _guard = self.write_lock.lock();
        Ok(self.remove(key)?)
    }

    fn increment(&self, key: &str, delta: i64) -> BackendResult<i64> {
        atomic::validate_delta(delta)?;
        let _guard = self.write_lock.lock();
        // An absent counter starts at zero and never expires.
        let mut envelope = self
            .read(key)?
            .unwrap_or_else(|| Envelope::new(&encode_counter(0), None));
        let next = decode_counter(&envelope.data)
            .and_then(|current| current.checked_add(delta))
            .ok_or_else(|| {
                CacheError::internal(std::io::Error::other(format!(
                    "value of \"{key}\" is not an integer or would overflow"
                )))
            })?;
        envelope.data = encode_counter(next).to_vec();
        if !self.write(key, &envelope)? {
            return Err(CacheError::atomic_violation(key, Operation::Increment));
        }
        Ok(next)
    }

    fn flush(&self) -> BackendResult<bool> {
        let _guard = self.write_lock.lock();
        let removed = self.remove_all()?;
        trace!(backend = %self.label, removed, "flushed store");
        Ok(true)
    }

    fn label(&self) -> BackendLabel {
        self.label.clone()
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::SINGLE_KEY
    }

    fn value_format(&self) -> Format {
        self.value_format
    }
}
