//! Error types for cache operations.
//!
//! Every component reports failures through [`CacheError`]. The variants map
//! one-to-one onto the failure classes callers are expected to handle:
//!
//! | Variant | Raised when |
//! |---------|-------------|
//! | [`InvalidArgument`](CacheError::InvalidArgument) | empty key part list, increment delta below one |
//! | [`Unsupported`](CacheError::Unsupported) | the backend lacks a capability (batch or atomic ops) |
//! | [`AtomicViolation`](CacheError::AtomicViolation) | a conditional write lost its race |
//! | [`Configuration`](CacheError::Configuration) | a decorator is built in a disallowed context |
//! | [`Runtime`](CacheError::Runtime) | a decorator is misused at call time |
//! | [`Connection`](CacheError::Connection) | the backend client failed to talk to its store |
//! | [`Internal`](CacheError::Internal) | the store is in a state the operation cannot handle |
//! | [`Format`](CacheError::Format) | a typed value could not be (de)serialized |
//!
//! None of these are retried by the library.

use std::fmt;

use thiserror::Error;

use crate::BackendLabel;

/// Names of the operations of the backend contract.
///
/// Used in error messages, log fields and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Single-key read.
    Get,
    /// Batch read.
    Mget,
    /// Unconditional write.
    Set,
    /// Batch write.
    Mset,
    /// Write only if absent.
    Add,
    /// Atomic create-or-replace through a modifier.
    Create,
    /// Atomic replace of an existing entry through a modifier.
    Update,
    /// Single-key removal.
    Delete,
    /// Batch removal.
    Mdelete,
    /// Integer increment.
    Increment,
    /// Removal of every entry.
    Flush,
}

impl Operation {
    /// Stable lowercase name of the operation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Operation::Get => "get",
            Operation::Mget => "mget",
            Operation::Set => "set",
            Operation::Mset => "mset",
            Operation::Add => "add",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Mdelete => "mdelete",
            Operation::Increment => "increment",
            Operation::Flush => "flush",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serialization or deserialization failure of a typed value.
#[derive(Debug, Error)]
pub enum FormatError {
    /// The value could not be encoded.
    #[error(transparent)]
    Serialize(Box<dyn std::error::Error + Send + Sync>),

    /// The stored bytes could not be decoded into the requested type.
    #[error(transparent)]
    Deserialize(Box<dyn std::error::Error + Send + Sync>),
}

/// Error type for every cache operation.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Invalid caller input.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The backend does not provide the requested capability.
    #[error("operation `{operation}` is not supported by backend `{backend}`")]
    Unsupported {
        /// Backend that rejected the call.
        backend: BackendLabel,
        /// Rejected operation.
        operation: Operation,
    },

    /// A conditional write observed that the entry changed after it was read.
    #[error("atomic violation occurred on `{operation}` of key \"{key}\"")]
    AtomicViolation {
        /// Key whose write lost the race.
        key: String,
        /// Operation that attempted the write.
        operation: Operation,
    },

    /// A decorator was constructed where it cannot work correctly.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A decorator was used in a way it cannot serve.
    #[error("runtime error: {0}")]
    Runtime(String),

    /// Transport failure of the backend client.
    #[error(transparent)]
    Connection(Box<dyn std::error::Error + Send + Sync>),

    /// Backend state or computation error not related to transport.
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),

    /// Typed value (de)serialization error.
    #[error(transparent)]
    Format(#[from] FormatError),
}

impl CacheError {
    /// Shorthand for [`CacheError::Unsupported`].
    pub fn unsupported(backend: impl Into<BackendLabel>, operation: Operation) -> Self {
        CacheError::Unsupported {
            backend: backend.into(),
            operation,
        }
    }

    /// Shorthand for [`CacheError::AtomicViolation`].
    pub fn atomic_violation(key: impl Into<String>, operation: Operation) -> Self {
        CacheError::AtomicViolation {
            key: key.into(),
            operation,
        }
    }

    /// Wraps a client error as a transport failure.
    pub fn connection<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        CacheError::Connection(Box::new(error))
    }

    /// Wraps an error as an internal backend failure.
    pub fn internal<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        CacheError::Internal(Box::new(error))
    }

    /// Returns `true` if this is an atomic violation.
    pub fn is_atomic_violation(&self) -> bool {
        matches!(self, CacheError::AtomicViolation { .. })
    }

    /// Returns `true` if this is an unsupported-operation error.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, CacheError::Unsupported { .. })
    }
}
