#![warn(missing_docs)]
//! Redis backend for kvstash.
//!
//! [`RedisBackend`] stores raw values as plain Redis strings, so counters
//! written by `increment` are ordinary `INCRBY` integers and other clients
//! can read them.
//!
//! Atomic `create`/`update` follow the classic optimistic transaction:
//! `WATCH key`, `GET key`, run the modifier, then `MULTI` / `SET` / `EXEC` on
//! the same connection. If anything touched the key in between, `EXEC`
//! aborts and the call fails with
//! [`CacheError::AtomicViolation`](kvstash_core::CacheError::AtomicViolation).
//!
//! ```no_run
//! use kvstash_backend::Backend;
//! use kvstash_redis::RedisBackend;
//!
//! let backend = RedisBackend::builder()
//!     .server("redis://127.0.0.1:6379/0")
//!     .label("sessions")
//!     .build()?;
//! backend.set("greeting", "hello".into(), None)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod backend;
pub mod error;

pub use backend::{RedisBackend, RedisBackendBuilder};
pub use error::Error;
