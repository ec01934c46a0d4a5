//! `use kvstash::prelude::*;` brings the traits into scope.

pub use crate::CacheConfig;
pub use kvstash_backend::{
    Backend, BackendResult, CacheExt, CallDecorator, ExecutionContext, HotCache, Invoke, Timed,
};
pub use kvstash_core::{CacheError, KeyBuilder, KeyPart, KeyType, Raw, modifier};
