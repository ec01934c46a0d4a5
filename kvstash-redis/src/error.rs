//! Error types for Redis backend operations.
//!
//! Every error converts into [`CacheError`] so it propagates through the
//! backend contract unchanged: transport failures become
//! [`CacheError::Connection`], everything the server rejects becomes
//! [`CacheError::Internal`].

use kvstash_core::CacheError;
use redis::RedisError;

/// Error type for Redis backend operations.
///
/// You typically don't handle this error directly. It appears when:
///
/// - [`RedisBackendBuilder::build`] gets an invalid connection URL
/// - The first operation runs while Redis is unreachable (connections are
///   opened lazily)
/// - The server rejects a command, e.g. `INCRBY` on a non-integer value
///
/// [`RedisBackendBuilder::build`]: crate::RedisBackendBuilder::build
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An error from the underlying Redis client.
    #[error("Redis backend error: {0}")]
    Redis(#[from] RedisError),
}

impl Error {
    pub(crate) fn is_transport(&self) -> bool {
        match self {
            Error::Redis(err) => {
                err.is_io_error()
                    || err.is_connection_dropped()
                    || err.is_connection_refusal()
                    || err.is_timeout()
            }
        }
    }
}

impl From<Error> for CacheError {
    fn from(error: Error) -> Self {
        if error.is_transport() {
            CacheError::connection(error)
        } else {
            CacheError::internal(error)
        }
    }
}
