//! Redis backend implementation.

use std::collections::HashMap;
use std::time::Duration;

use kvstash_backend::atomic::{self, CompareAndSwap, Snapshot};
use kvstash_backend::{Backend, BackendResult, Capabilities, Format};
use kvstash_core::{BackendLabel, Modifier, Raw, effective_ttl};
use parking_lot::Mutex;
use redis::{Client, Cmd, Connection};
use tracing::trace;

use crate::error::Error;

/// Redis cache backend based on the redis-rs crate.
///
/// Regular operations share one lazily opened connection. Every atomic
/// operation opens its own connection for the lifetime of its `WATCH`, so a
/// modifier that writes through this backend lands on a different
/// connection and aborts the transaction as any other client would.
pub struct RedisBackend {
    client: Client,
    connection: Mutex<Option<Connection>>,
    label: BackendLabel,
    value_format: Format,
}

impl std::fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBackend")
            .field("label", &self.label)
            .field("value_format", &self.value_format)
            .finish_non_exhaustive()
    }
}

impl RedisBackend {
    /// Creates a backend connected to `redis://127.0.0.1/`.
    ///
    /// The connection is opened by the first operation, not here.
    pub fn new() -> Result<Self, Error> {
        Self::builder().build()
    }

    /// Creates new RedisBackend builder with default settings.
    #[must_use]
    pub fn builder() -> RedisBackendBuilder {
        RedisBackendBuilder::default()
    }

    /// Runs `f` on the shared connection, opening it first if needed.
    ///
    /// A transport failure drops the connection so the next call reconnects.
    fn with_connection<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> redis::RedisResult<T>,
    ) -> BackendResult<T> {
        let mut slot = self.connection.lock();
        let mut connection = match slot.take() {
            Some(connection) => connection,
            None => {
                trace!(backend = %self.label, "Initialize new redis connection");
                self.client.get_connection().map_err(Error::from)?
            }
        };
        match f(&mut connection) {
            Ok(value) => {
                *slot = Some(connection);
                Ok(value)
            }
            Err(err) => {
                let err = Error::from(err);
                if err.is_transport() {
                    trace!(backend = %self.label, "Dropping broken redis connection");
                } else {
                    *slot = Some(connection);
                }
                Err(err.into())
            }
        }
    }

    fn set_cmd(key: &str, value: &[u8], ttl: Option<Duration>) -> Cmd {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = effective_ttl(ttl) {
            cmd.arg("PX").arg(ttl_millis(ttl));
        }
        cmd
    }
}

/// Redis rejects `PX 0`, so sub-millisecond TTLs round up.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

/// Part of builder pattern implementation for RedisBackend.
#[derive(Debug)]
pub struct RedisBackendBuilder {
    connection_info: String,
    label: BackendLabel,
    value_format: Format,
}

impl Default for RedisBackendBuilder {
    fn default() -> Self {
        Self {
            connection_info: "redis://127.0.0.1/".to_owned(),
            label: BackendLabel::new_static("redis"),
            value_format: Format::Bincode,
        }
    }
}

impl RedisBackendBuilder {
    /// Set connection info (host, port, database, etc.) for RedisBackend.
    pub fn server(mut self, connection_info: impl Into<String>) -> Self {
        self.connection_info = connection_info.into();
        self
    }

    /// Set a custom label for this backend.
    pub fn label(mut self, label: impl Into<BackendLabel>) -> Self {
        self.label = label.into();
        self
    }

    /// Set the format typed helpers use on top of this backend.
    ///
    /// # Default
    ///
    /// [`Format::Bincode`]
    pub fn value_format(mut self, format: Format) -> Self {
        self.value_format = format;
        self
    }

    /// Create new instance of Redis backend with passed settings.
    ///
    /// Only the connection URL is validated here.
    pub fn build(self) -> Result<RedisBackend, Error> {
        Ok(RedisBackend {
            client: Client::open(self.connection_info)?,
            connection: Mutex::new(None),
            label: self.label,
            value_format: self.value_format,
        })
    }
}

impl Backend for RedisBackend {
    fn get(&self, key: &str) -> BackendResult<Option<Raw>> {
        let value: Option<Vec<u8>> =
            self.with_connection(|con| redis::cmd("GET").arg(key).query(con))?;
        Ok(value.map(Raw::from))
    }

    fn mget(&self, keys: &[String]) -> BackendResult<HashMap<String, Raw>> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }
        let values: Vec<Option<Vec<u8>>> =
            self.with_connection(|con| redis::cmd("MGET").arg(keys).query(con))?;
        Ok(keys
            .iter()
            .zip(values)
            .filter_map(|(key, value)| value.map(|value| (key.clone(), Raw::from(value))))
            .collect())
    }

    fn set(&self, key: &str, value: Raw, ttl: Option<Duration>) -> BackendResult<bool> {
        let reply: Option<String> =
            self.with_connection(|con| Self::set_cmd(key, &value, ttl).query(con))?;
        Ok(reply.is_some())
    }

    fn mset(&self, entries: &[(String, Raw)], ttl: Option<Duration>) -> BackendResult<usize> {
        if entries.is_empty() {
            return Ok(0);
        }
        let mut pipe = redis::pipe();
        for (key, value) in entries {
            pipe.add_command(Self::set_cmd(key, value, ttl));
        }
        let replies: Vec<Option<String>> = self.with_connection(|con| pipe.query(con))?;
        Ok(replies.iter().filter(|reply| reply.is_some()).count())
    }

    fn add(&self, key: &str, value: Raw, ttl: Option<Duration>) -> BackendResult<bool> {
        if effective_ttl(ttl).is_none() {
            let reply: Option<String> = self.with_connection(|con| {
                redis::cmd("SET").arg(key).arg(value.as_ref()).arg("NX").query(con)
            })?;
            return Ok(reply.is_some());
        }

        // The value and its TTL land on a temp key first, then move over
        // `key` only if it is still free.
        let temp = format!("{key}:add:{:016x}", fastrand::u64(..));
        let mut pipe = redis::pipe();
        pipe.atomic()
            .add_command(Self::set_cmd(&temp, &value, ttl))
            .ignore()
            .cmd("RENAMENX")
            .arg(&temp)
            .arg(key)
            .cmd("DEL")
            .arg(&temp)
            .ignore();
        let (renamed,): (i64,) = self.with_connection(|con| pipe.query(con))?;
        Ok(renamed == 1)
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
        let removed: i64 = self.with_connection(|con| redis::cmd("DEL").arg(key).query(con))?;
        Ok(removed > 0)
    }

    fn mdelete(&self, keys: &[String]) -> BackendResult<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        let removed: i64 = self.with_connection(|con| redis::cmd("DEL").arg(keys).query(con))?;
        Ok(usize::try_from(removed).unwrap_or_default())
    }

    fn increment(&self, key: &str, delta: i64) -> BackendResult<i64> {
        atomic::validate_delta(delta)?;
        self.with_connection(|con| redis::cmd("INCRBY").arg(key).arg(delta).query(con))
    }

    fn flush(&self) -> BackendResult<bool> {
        trace!(backend = %self.label, "FLUSHDB");
        let reply: String = self.with_connection(|con| redis::cmd("FLUSHDB").query(con))?;
        Ok(reply == "OK")
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

impl CompareAndSwap for RedisBackend {
    /// A dedicated connection with an active `WATCH` on the key.
    type Token = Connection;

    fn read_for_update(&self, key: &str) -> BackendResult<Snapshot<Self::Token>> {
        let mut watched = self.client.get_connection().map_err(Error::from)?;
        redis::cmd("WATCH")
            .arg(key)
            .query::<()>(&mut watched)
            .map_err(Error::from)?;
        let value: Option<Vec<u8>> = redis::cmd("GET")
            .arg(key)
            .query(&mut watched)
            .map_err(Error::from)?;
        Ok(Snapshot {
            value: value.map(Raw::from),
            token: watched,
        })
    }

    fn write_if_unchanged(
        &self,
        key: &str,
        mut token: Self::Token,
        value: Raw,
        ttl: Option<Duration>,
    ) -> BackendResult<bool> {
        let mut pipe = redis::pipe();
        pipe.atomic().add_command(Self::set_cmd(key, &value, ttl)).ignore();
        // EXEC replies nil when a watched key changed.
        let committed: Option<()> = pipe.query(&mut token).map_err(Error::from)?;
        Ok(committed.is_some())
    }

    fn release(&self, mut token: Self::Token) -> BackendResult<()> {
        redis::cmd("UNWATCH")
            .query::<()>(&mut token)
            .map_err(Error::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_millis_rounds_up() {
        assert_eq!(ttl_millis(Duration::from_micros(10)), 1);
        assert_eq!(ttl_millis(Duration::from_secs(2)), 2_000);
    }

    #[test]
    fn test_set_command_with_ttl_adds_px() {
        let cmd = RedisBackend::set_cmd("k", b"v", Some(Duration::from_secs(1)));
        assert_eq!(cmd.args_iter().count(), 5);
    }

    #[test]
    fn test_zero_ttl_sets_without_expiry() {
        let cmd = RedisBackend::set_cmd("k", b"v", Some(Duration::ZERO));
        assert_eq!(cmd.args_iter().count(), 3);
    }

    #[test]
    fn test_build_rejects_invalid_url() {
        assert!(RedisBackend::builder().server("not a url").build().is_err());
    }

    #[test]
    fn test_build_does_not_connect() {
        let backend = RedisBackend::builder()
            .server("redis://127.0.0.1:1/")
            .label("lazy")
            .build()
            .unwrap();
        assert_eq!(backend.label().as_str(), "lazy");
        assert_eq!(backend.value_format(), Format::Bincode);
    }
}
