use std::{collections::HashMap, sync::Arc, time::Duration};

use kvstash_core::{BackendLabel, CacheError, Modifier, Operation, Raw};

use crate::format::Format;

/// Result of every backend operation.
pub type BackendResult<T> = Result<T, CacheError>;

/// Optional capabilities a backend may provide on top of single-key operations.
///
/// Every backend supports `get`, `set`, `add`, `delete`, `increment` and
/// `flush`. Batch and atomic operations are declared here; a backend that does
/// not declare one rejects it with [`CacheError::Unsupported`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Capabilities {
    /// `mget`, `mset` and `mdelete`.
    pub batch: bool,
    /// `create` and `update` with compare-and-swap semantics.
    pub atomic: bool,
}

impl Capabilities {
    /// Every optional capability.
    pub const ALL: Self = Self {
        batch: true,
        atomic: true,
    };

    /// No optional capability.
    pub const SINGLE_KEY: Self = Self {
        batch: false,
        atomic: false,
    };

    /// Whether `operation` is served by a backend with these capabilities.
    pub fn supports(self, operation: Operation) -> bool {
        match operation {
            Operation::Mget | Operation::Mset | Operation::Mdelete => self.batch,
            Operation::Create | Operation::Update => self.atomic,
            _ => true,
        }
    }
}

/// Ensures `backend` serves `operation`, failing the same way the backend would.
///
/// Use it when wiring a component that relies on a capability, so a wrong
/// backend choice is reported at construction instead of on first use.
pub fn require<B>(backend: &B, operation: Operation) -> BackendResult<()>
where
    B: Backend + ?Sized,
{
    if backend.capabilities().supports(operation) {
        Ok(())
    } else {
        Err(CacheError::unsupported(backend.label(), operation))
    }
}

/// Uniform key/value storage contract.
///
/// Keys are opaque strings and values opaque [`Raw`] blobs. A TTL of `None` or
/// zero means the entry does not expire. All calls are synchronous and run to
/// completion on the calling thread.
///
/// Batch and atomic operations have default implementations that reject the
/// call; backends providing them override the methods and report them in
/// [`capabilities`](Backend::capabilities).
pub trait Backend: Send + Sync {
    /// Reads a value. An absent key is `Ok(None)`, never an error.
    fn get(&self, key: &str) -> BackendResult<Option<Raw>>;

    /// Reads several values. The map holds only the keys that were found.
    fn mget(&self, keys: &[String]) -> BackendResult<HashMap<String, Raw>> {
        let _ = keys;
        Err(CacheError::unsupported(self.label(), Operation::Mget))
    }

    /// Stores a value, replacing any existing one.
    fn set(&self, key: &str, value: Raw, ttl: Option<Duration>) -> BackendResult<bool>;

    /// Stores several values, returning how many were written.
    fn mset(&self, entries: &[(String, Raw)], ttl: Option<Duration>) -> BackendResult<usize> {
        let _ = (entries, ttl);
        Err(CacheError::unsupported(self.label(), Operation::Mset))
    }

    /// Stores a value only if the key is absent.
    ///
    /// Returns `false` and leaves the existing value untouched otherwise.
    fn add(&self, key: &str, value: Raw, ttl: Option<Duration>) -> BackendResult<bool>;

    /// Atomically creates or replaces the value through `modifier`.
    ///
    /// Returns the written value, or `None` when the modifier declined to
    /// produce one. Fails with [`CacheError::AtomicViolation`] when the entry
    /// changed between the read and the write.
    fn create(
        &self,
        key: &str,
        modifier: Modifier<'_>,
        ttl: Option<Duration>,
    ) -> BackendResult<Option<Raw>> {
        let _ = (key, modifier, ttl);
        Err(CacheError::unsupported(self.label(), Operation::Create))
    }

    /// Atomically replaces an existing value through `modifier`.
    ///
    /// An absent key is never created: the call returns `None` without
    /// invoking the modifier.
    fn update(
        &self,
        key: &str,
        modifier: Modifier<'_>,
        ttl: Option<Duration>,
    ) -> BackendResult<Option<Raw>> {
        let _ = (key, modifier, ttl);
        Err(CacheError::unsupported(self.label(), Operation::Update))
    }

    /// Removes a key. Returns `false` if it was not there.
    fn delete(&self, key: &str) -> BackendResult<bool>;

    /// Removes several keys, returning how many actually existed.
    fn mdelete(&self, keys: &[String]) -> BackendResult<usize> {
        let _ = keys;
        Err(CacheError::unsupported(self.label(), Operation::Mdelete))
    }

    /// Adds `delta` to the integer stored at `key`, treating an absent key as
    /// zero, and returns the new value.
    ///
    /// Fails with [`CacheError::InvalidArgument`] when `delta < 1`.
    fn increment(&self, key: &str, delta: i64) -> BackendResult<i64>;

    /// Removes every entry this backend is responsible for.
    fn flush(&self) -> BackendResult<bool>;

    /// Returns the label of this backend.
    ///
    /// Decorators prefix it with their own name, e.g. "hot.redis".
    fn label(&self) -> BackendLabel {
        BackendLabel::new_static("backend")
    }

    /// Optional capabilities provided by this backend.
    fn capabilities(&self) -> Capabilities {
        Capabilities::SINGLE_KEY
    }

    /// Format used by the typed layer to encode values for this backend.
    fn value_format(&self) -> Format {
        Format::Json
    }
}

macro_rules! forward_backend {
    ($($ptr:ty),*) => {
        $(
            impl<B: Backend + ?Sized> Backend for $ptr {
                fn get(&self, key: &str) -> BackendResult<Option<Raw>> {
                    (**self).get(key)
                }

                fn mget(&self, keys: &[String]) -> BackendResult<HashMap<String, Raw>> {
                    (**self).mget(keys)
                }

                fn set(&self, key: &str, value: Raw, ttl: Option<Duration>) -> BackendResult<bool> {
                    (**self).set(key, value, ttl)
                }

                fn mset(&self, entries: &[(String, Raw)], ttl: Option<Duration>) -> BackendResult<usize> {
                    (**self).mset(entries, ttl)
                }

                fn add(&self, key: &str, value: Raw, ttl: Option<Duration>) -> BackendResult<bool> {
                    (**self).add(key, value, ttl)
                }

                fn create(
                    &self,
                    key: &str,
                    modifier: Modifier<'_>,
                    ttl: Option<Duration>,
                ) -> BackendResult<Option<Raw>> {
                    (**self).create(key, modifier, ttl)
                }

                fn update(
                    &self,
                    key: &str,
                    modifier: Modifier<'_>,
                    ttl: Option<Duration>,
                ) -> BackendResult<Option<Raw>> {
                    (**self).update(key, modifier, ttl)
                }

                fn delete(&self, key: &str) -> BackendResult<bool> {
                    (**self).delete(key)
                }

                fn mdelete(&self, keys: &[String]) -> BackendResult<usize> {
                    (**self).mdelete(keys)
                }

                fn increment(&self, key: &str, delta: i64) -> BackendResult<i64> {
                    (**self).increment(key, delta)
                }

                fn flush(&self) -> BackendResult<bool> {
                    (**self).flush()
                }

                fn label(&self) -> BackendLabel {
                    (**self).label()
                }

                fn capabilities(&self) -> Capabilities {
                    (**self).capabilities()
                }

                fn value_format(&self) -> Format {
                    (**self).value_format()
                }
            }
        )*
    };
}

forward_backend!(&B, Box<B>, Arc<B>);
