//! Backend decorators.
//!
//! Each decorator wraps a [`Backend`](crate::Backend) and is a `Backend`
//! itself, so they stack: `Timed<HotCache<RedisBackend>>` times every call
//! that reaches the hot mirror, `HotCache<Timed<RedisBackend>>` only the ones
//! that reach redis.

mod call;
mod hot;
mod timed;

pub use call::{CallDecorator, Invoke};
pub use hot::{ExecutionContext, HotCache, HotCacheBuilder, HotCacheOptions};
pub use timed::Timed;
