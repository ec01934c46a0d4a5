#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

/// Backend contract, atomic protocol and decorators.
///
/// Everything needed to implement a custom backend lives here: the
/// [`Backend`](kvstash_backend::Backend) trait and the
/// [`CompareAndSwap`](kvstash_backend::CompareAndSwap) primitive behind
/// `create`/`update`.
pub mod backend {
    pub use kvstash_backend::*;
}

/// Configuration shared by the pieces of a cache setup.
pub mod config;

/// Commonly used types and traits.
pub mod prelude;

pub use config::CacheConfig;
pub use kvstash_backend::{
    Backend, CacheExt, CallDecorator, ExecutionContext, HotCache, HotCacheOptions, Invoke, Timed,
};
pub use kvstash_core::{
    BackendLabel, CacheError, KeyBuilder, KeyConfig, KeyPart, KeyType, Operation, Raw, key_parts,
    modifier,
};

/// In-memory backend.
#[cfg(feature = "moka")]
#[cfg_attr(docsrs, doc(cfg(feature = "moka")))]
pub mod moka {
    pub use kvstash_moka::*;
}

/// Redis backend.
#[cfg(feature = "redis")]
#[cfg_attr(docsrs, doc(cfg(feature = "redis")))]
pub mod redis {
    pub use kvstash_redis::*;
}

/// Memcache backend.
#[cfg(feature = "memcache")]
#[cfg_attr(docsrs, doc(cfg(feature = "memcache")))]
pub mod memcache {
    pub use kvstash_memcache::*;
}

/// FeOxDB backend.
#[cfg(feature = "feoxdb")]
#[cfg_attr(docsrs, doc(cfg(feature = "feoxdb")))]
pub mod feoxdb {
    pub use kvstash_feoxdb::*;
}
