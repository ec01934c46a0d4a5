use std::time::Duration;

use kvstash_backend::{Backend, CallDecorator, ExecutionContext, HotCache, HotCacheOptions};
use kvstash_core::{CacheError, KeyBuilder, KeyConfig};
use serde::{Deserialize, Serialize};

/// Application-wide cache settings.
///
/// Every field has a default, so any subset can be deserialized:
///
/// ```
/// use kvstash::CacheConfig;
///
/// let config: CacheConfig = serde_json::from_str(r#"{
///     "keys": { "prefix": "shop" },
///     "memoize_ttl": "5m"
/// }"#).unwrap();
///
/// assert_eq!(config.keys.prefix, "shop");
/// assert_eq!(config.keys.delimiter, ":");
/// ```
///
/// Where the settings come from (file, environment) is up to the
/// application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Key prefix and delimiter.
    pub keys: KeyConfig,
    /// Hot cache decorator options.
    pub hot: HotCacheOptions,
    /// TTL for memoized call results. `None` keeps them until evicted.
    #[serde(with = "humantime_serde")]
    pub memoize_ttl: Option<Duration>,
}

impl CacheConfig {
    /// Key builder using the configured prefix and delimiter.
    pub fn key_builder(&self) -> KeyBuilder {
        KeyBuilder::new(self.keys.clone())
    }

    /// Wraps `backend` in a [`HotCache`] with the configured options.
    ///
    /// Fails with [`CacheError::Configuration`] in a shared context unless
    /// `hot.allow_shared_context` is set.
    pub fn hot_cache<B: Backend>(
        &self,
        backend: B,
        context: ExecutionContext,
    ) -> Result<HotCache<B>, CacheError> {
        HotCache::builder(backend)
            .options(self.hot.clone())
            .context(context)
            .build()
    }

    /// Memoizes calls on `target` in `backend` with configured keys and TTL.
    pub fn memoize<T, B: Backend>(&self, target: T, backend: B) -> CallDecorator<T, B> {
        let decorator = CallDecorator::new(target, backend, self.key_builder());
        match self.memoize_ttl {
            Some(ttl) => decorator.ttl(ttl),
            None => decorator,
        }
    }
}
