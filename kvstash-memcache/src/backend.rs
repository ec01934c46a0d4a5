//! Memcache backend implementation.

use std::collections::HashMap;
use std::time::Duration;

use kvstash_backend::atomic::{self, CompareAndSwap, Snapshot};
use kvstash_backend::{Backend, BackendResult, Capabilities, Format};
use kvstash_core::{BackendLabel, CacheError, Modifier, Raw};
use tracing::trace;

use crate::client::{CasUnique, MemcacheClient, expiration};

/// Longest key the text protocol accepts.
const MAX_KEY_LEN: usize = 250;

/// Cache backend on top of a [`MemcacheClient`].
///
/// Client errors surface as [`CacheError::Connection`]. Keys that memcached
/// would reject (longer than 250 bytes, or containing whitespace or control
/// characters) fail early with [`CacheError::InvalidArgument`].
#[derive(Debug)]
pub struct MemcacheBackend<C> {
    client: C,
    label: BackendLabel,
    value_format: Format,
}

impl<C: MemcacheClient> MemcacheBackend<C> {
    /// Wraps `client` with default settings.
    pub fn new(client: C) -> Self {
        Self::builder(client).build()
    }

    /// Creates a builder around `client`.
    pub fn builder(client: C) -> MemcacheBackendBuilder<C> {
        MemcacheBackendBuilder {
            client,
            label: BackendLabel::new_static("memcache"),
            value_format: Format::Json,
        }
    }

    /// The wrapped client.
    pub fn client(&self) -> &C {
        &self.client
    }

    fn call<T>(&self, key: &str, f: impl FnOnce(&C) -> Result<T, C::Error>) -> BackendResult<T> {
        check_key(key)?;
        f(&self.client).map_err(CacheError::connection)
    }
}

fn check_key(key: &str) -> BackendResult<()> {
    if key.is_empty() || key.len() > MAX_KEY_LEN {
        return Err(CacheError::InvalidArgument(format!(
            "memcache keys must be 1 to {MAX_KEY_LEN} bytes long, got {}",
            key.len()
        )));
    }
    if key.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(CacheError::InvalidArgument(format!(
            "memcache key {key:?} contains whitespace or control characters"
        )));
    }
    Ok(())
}

/// Builder for [`MemcacheBackend`].
#[derive(Debug)]
pub struct MemcacheBackendBuilder<C> {
    client: C,
    label: BackendLabel,
    value_format: Format,
}

impl<C: MemcacheClient> MemcacheBackendBuilder<C> {
    /// Sets a custom label for this backend.
    ///
    /// # Default
    ///
    /// `"memcache"`
    pub fn label(mut self, label: impl Into<BackendLabel>) -> Self {
        self.label = label.into();
        self
    }

    /// Sets the format typed helpers use on top of this backend.
    pub fn value_format(mut self, format: Format) -> Self {
        self.value_format = format;
        self
    }

    /// Builds the backend.
    pub fn build(self) -> MemcacheBackend<C> {
        MemcacheBackend {
            client: self.client,
            label: self.label,
            value_format: self.value_format,
        }
    }
}

impl<C: MemcacheClient> Backend for MemcacheBackend<C> {
    fn get(&self, key: &str) -> BackendResult<Option<Raw>> {
        self.call(key, |client| client.get(key))
    }

    fn mget(&self, keys: &[String]) -> BackendResult<HashMap<String, Raw>> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }
        for key in keys {
            check_key(key)?;
        }
        self.client.get_multi(keys).map_err(CacheError::connection)
    }

    fn set(&self, key: &str, value: Raw, ttl: Option<Duration>) -> BackendResult<bool> {
        self.call(key, |client| client.set(key, &value, expiration(ttl)))
    }

    fn mset(&self, entries: &[(String, Raw)], ttl: Option<Duration>) -> BackendResult<usize> {
        let expiration = expiration(ttl);
        let mut written = 0;
        for (key, value) in entries {
            if self.call(key, |client| client.set(key, value, expiration))? {
                written += 1;
            }
        }
        Ok(written)
    }

    fn add(&self, key: &str, value: Raw, ttl: Option<Duration>) -> BackendResult<bool> {
        self.call(key, |client| client.add(key, &value, expiration(ttl)))
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
        self.call(key, |client| client.delete(key))
    }

    fn mdelete(&self, keys: &[String]) -> BackendResult<usize> {
        let mut removed = 0;
        for key in keys {
            if self.delete(key)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn increment(&self, key: &str, delta: i64) -> BackendResult<i64> {
        atomic::increment_or_seed(
            key,
            delta,
            || {
                let step = delta.unsigned_abs();
                match self.call(key, |client| client.incr(key, step))? {
                    Some(value) => i64::try_from(value).map(Some).map_err(CacheError::internal),
                    None => Ok(None),
                }
            },
            || {
                trace!(key, backend = %self.label, "seeding absent counter");
                self.add(key, Raw::from(delta.to_string()), None)
            },
        )
    }

    fn flush(&self) -> BackendResult<bool> {
        trace!(backend = %self.label, "flush_all");
        self.client.flush().map_err(CacheError::connection)
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

impl<C: MemcacheClient> CompareAndSwap for MemcacheBackend<C> {
    /// `None` when the key was absent, which turns the write into an `add`.
    type Token = Option<CasUnique>;

    fn read_for_update(&self, key: &str) -> BackendResult<Snapshot<Self::Token>> {
        Ok(match self.call(key, |client| client.gets(key))? {
            Some((value, unique)) => Snapshot {
                value: Some(value),
                token: Some(unique),
            },
            None => Snapshot {
                value: None,
                token: None,
            },
        })
    }

    fn write_if_unchanged(
        &self,
        key: &str,
        token: Self::Token,
        value: Raw,
        ttl: Option<Duration>,
    ) -> BackendResult<bool> {
        let expiration = expiration(ttl);
        match token {
            Some(unique) => self.call(key, |client| client.cas(key, &value, expiration, unique)),
            None => self.call(key, |client| client.add(key, &value, expiration)),
        }
    }
}
