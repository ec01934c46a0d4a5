use bincode::error::{DecodeError, EncodeError};
use feoxdb::FeoxError;
use kvstash_core::CacheError;
use thiserror::Error;

/// Errors that can occur when using [`FeOxDbBackend`](crate::FeOxDbBackend).
#[derive(Debug, Error)]
pub enum FeOxDbError {
    /// An error from the underlying FeOxDB database.
    #[error("FeOxDB error: {0}")]
    FeOxDb(#[from] FeoxError),

    /// Failed to encode a stored entry.
    #[error("Serialization error: {0}")]
    Serialization(#[from] EncodeError),

    /// Failed to decode a stored entry.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] DecodeError),
}

impl From<FeOxDbError> for CacheError {
    fn from(error: FeOxDbError) -> Self {
        CacheError::internal(error)
    }
}
