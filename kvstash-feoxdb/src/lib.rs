#![warn(missing_docs)]
//! FeOxDB backend for kvstash.
//!
//! An embedded store, in memory or backed by a file, with per-key TTL.
//! FeOxDB has no compare-and-swap, so this backend supports single-key
//! operations only: `mget`, `mset`, `mdelete`, `create` and `update` fail
//! with [`CacheError::Unsupported`](kvstash_core::CacheError::Unsupported).
//!
//! ```no_run
//! use kvstash_backend::Backend;
//! use kvstash_feoxdb::FeOxDbBackend;
//!
//! let backend = FeOxDbBackend::builder()
//!     .path("/var/cache/myapp")
//!     .build()?;
//! backend.increment("visits", 1)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod backend;
mod error;

pub use backend::{FeOxDbBackend, FeOxDbBackendBuilder};
pub use error::FeOxDbError;
