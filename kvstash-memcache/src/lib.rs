#![warn(missing_docs)]
//! Memcache backend for kvstash.
//!
//! The wire protocol is not implemented here. [`MemcacheBackend`] drives any
//! client that implements [`MemcacheClient`], which maps one-to-one onto the
//! text protocol commands (`get`, `gets`, `set`, `add`, `cas`, `delete`,
//! `incr`, `flush_all`).
//!
//! Atomic `create`/`update` use the server's own compare-and-swap: the value
//! is read with `gets`, and written back with `cas` using the unique it
//! returned, or with `add` when the key did not exist.

pub mod backend;
pub mod client;

pub use backend::{MemcacheBackend, MemcacheBackendBuilder};
pub use client::{CasUnique, MemcacheClient, expiration};
