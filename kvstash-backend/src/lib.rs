#![warn(missing_docs)]
//! Backend contract and building blocks for kvstash.
//!
//! If you want to implement your own backend, you are in the right place:
//!
//! - [`Backend`] is the storage contract every store implements.
//! - [`atomic`] holds the create/update protocol. Implement
//!   [`CompareAndSwap`] and forward `create`/`update` to [`atomic::create`]
//!   and [`atomic::update`].
//! - [`decorator`] wraps any backend with a hot read mirror, call
//!   memoization or timing.
//! - [`CacheExt`] adds typed access on top of the raw byte contract.

pub mod atomic;
mod backend;
pub mod decorator;
mod ext;
pub mod format;
pub mod metrics;

pub use atomic::{CompareAndSwap, Snapshot};
pub use backend::{Backend, BackendResult, Capabilities, require};
pub use decorator::{CallDecorator, ExecutionContext, HotCache, HotCacheOptions, Invoke, Timed};
pub use ext::CacheExt;
pub use format::Format;
pub use kvstash_core::{BackendLabel, CacheError, Modifier, Operation, Raw};
