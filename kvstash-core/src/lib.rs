#![warn(missing_docs)]
//! # kvstash-core
//!
//! Core types shared by every kvstash crate.
//!
//! The cache abstraction itself (the [`Backend`] trait, the atomic
//! read-modify-write protocol and the decorators) lives in `kvstash-backend`.
//! This crate only holds the vocabulary those pieces speak:
//!
//! - **Keys** - deterministic key construction with [`KeyBuilder`]
//! - **Labels** - backend identity with [`BackendLabel`]
//! - **Errors** - the [`CacheError`] taxonomy and the [`Operation`] names
//! - **Values** - opaque [`Raw`] payloads, TTL helpers and the [`Modifier`] callback
//!
//! [`Backend`]: https://docs.rs/kvstash-backend

pub mod error;
pub mod key;
pub mod label;
pub mod value;

pub use error::{CacheError, FormatError, Operation};
pub use key::{KeyBuilder, KeyConfig, KeyPart, KeyType};
pub use label::BackendLabel;
pub use value::{
    Modifier, Raw, decode_counter, effective_ttl, encode_counter, modifier, ttl_secs,
};
#[doc(hidden)]
pub use smol_str::SmolStr;
