//! The client seam the backend is written against.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use kvstash_core::{Raw, ttl_secs};

/// Value of the `cas unique` field returned by `gets`.
pub type CasUnique = u64;

/// Relative expirations above this many seconds are read by memcached as a
/// unix timestamp.
const MAX_RELATIVE_EXPIRATION: u64 = 60 * 60 * 24 * 30;

/// A synchronous memcache client.
///
/// Every method is a single protocol command. `Ok(false)` / `Ok(None)` are
/// the protocol's "not stored", "not found" and "exists" replies; `Err` is
/// reserved for transport and server errors.
pub trait MemcacheClient: Send + Sync {
    /// Transport or server error.
    type Error: std::error::Error + Send + Sync + 'static;

    /// `get <key>`.
    fn get(&self, key: &str) -> Result<Option<Raw>, Self::Error>;

    /// `get <key>*`. Missing keys are absent from the map.
    fn get_multi(&self, keys: &[String]) -> Result<HashMap<String, Raw>, Self::Error>;

    /// `gets <key>`: the value with its cas unique.
    fn gets(&self, key: &str) -> Result<Option<(Raw, CasUnique)>, Self::Error>;

    /// `set`. `expiration` is already in protocol form, see [`expiration`].
    fn set(&self, key: &str, value: &[u8], expiration: u32) -> Result<bool, Self::Error>;

    /// `add`: stores only when the key is absent.
    fn add(&self, key: &str, value: &[u8], expiration: u32) -> Result<bool, Self::Error>;

    /// `cas`: stores only when nobody wrote the key since `gets` returned `unique`.
    fn cas(
        &self,
        key: &str,
        value: &[u8],
        expiration: u32,
        unique: CasUnique,
    ) -> Result<bool, Self::Error>;

    /// `delete <key>`.
    fn delete(&self, key: &str) -> Result<bool, Self::Error>;

    /// `incr <key> <delta>`. `None` when the key does not exist.
    fn incr(&self, key: &str, delta: u64) -> Result<Option<u64>, Self::Error>;

    /// `flush_all`.
    fn flush(&self) -> Result<bool, Self::Error>;
}

/// Converts a TTL to the protocol's expiration field.
///
/// `0` means never expire. Sub-second TTLs round up to one second, and TTLs
/// longer than 30 days are sent as an absolute unix timestamp.
pub fn expiration(ttl: Option<Duration>) -> u32 {
    let Some(secs) = ttl_secs(ttl) else {
        return 0;
    };
    let secs = if secs > MAX_RELATIVE_EXPIRATION {
        u64::try_from(Utc::now().timestamp())
            .unwrap_or_default()
            .saturating_add(secs)
    } else {
        secs
    };
    u32::try_from(secs).unwrap_or(u32::MAX)
}
