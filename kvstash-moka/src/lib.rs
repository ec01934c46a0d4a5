#![warn(missing_docs)]
//! In-memory kvstash backend on top of [moka](https://docs.rs/moka).
//!
//! Supports every operation of the backend contract, including batch and
//! atomic ones. See [`MokaBackend`].

mod backend;
mod builder;

pub use backend::MokaBackend;
pub use builder::{ByteCapacity, EntryCapacity, MokaBackendBuilder, NoCapacity};
pub use moka::policy::EvictionPolicy;
