//! Memoization of method calls.

use std::time::Duration;

use kvstash_core::{CacheError, KeyBuilder, KeyPart, KeyType};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, trace};

use crate::{Backend, BackendResult};

/// Dynamic dispatch table of a memoizable target.
///
/// Lets callers reach a method by name, the way [`CallDecorator::invoke`]
/// does. Unknown names return `None`.
pub trait Invoke {
    /// Return type shared by every method in the table.
    type Output: Serialize + DeserializeOwned;

    /// Calls `method` with stringified `args`.
    fn invoke(&self, method: &str, args: &[String]) -> Option<Self::Output>;
}

/// Caches the results of calls made on a wrapped target.
///
/// The key of a call is built from the target's type, the method name and
/// the arguments joined with `:`. A cached result is returned as is, without
/// calling the target. A computed result is stored with `add`, so a result
/// stored concurrently by someone else is never overwritten.
///
/// Every result is memoized, `false`, `0` and `None` included: the backend
/// reports absence separately from stored values.
pub struct CallDecorator<T, B> {
    target: T,
    backend: B,
    keys: KeyBuilder,
    type_part: KeyPart,
    ttl: Option<Duration>,
}

impl<T, B: Backend> CallDecorator<T, B> {
    /// Wraps `target`, caching into `backend` with keys from `keys`.
    ///
    /// The type segment of the keys is the type name of `T` with module paths
    /// stripped, generic arguments kept: `Arc<Users>` for `Arc<app::Users>`.
    pub fn new(target: T, backend: B, keys: KeyBuilder) -> Self {
        Self {
            target,
            backend,
            keys,
            type_part: KeyPart::new(type_label::<T>()),
            ttl: None,
        }
    }

    /// Heads keys with `K`, carrying its version.
    pub fn keyed_by<K: KeyType>(mut self) -> Self {
        self.type_part = KeyPart::of::<K>();
        self
    }

    /// TTL of memoized results.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Wrapped target.
    pub fn target(&self) -> &T {
        &self.target
    }

    /// Backend results are cached in.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Key under which the result of `method(args)` is cached.
    pub fn cache_key(&self, method: &str, args: &[String]) -> BackendResult<String> {
        self.keys.generate(&[
            self.type_part.clone(),
            KeyPart::new(method),
            KeyPart::new(args.join(":")),
        ])
    }

    /// Returns the cached result of `method(args)`, computing it with `f` on a
    /// miss.
    pub fn call<R, F>(&self, method: &str, args: &[String], f: F) -> BackendResult<R>
    where
        R: Serialize + DeserializeOwned,
        F: FnOnce(&T) -> R,
    {
        let key = self.cache_key(method, args)?;
        self.memoize(&key, || Ok(f(&self.target)))
    }

    fn memoize<R, F>(&self, key: &str, compute: F) -> BackendResult<R>
    where
        R: Serialize + DeserializeOwned,
        F: FnOnce() -> BackendResult<R>,
    {
        let format = self.backend.value_format();
        if let Some(raw) = self.backend.get(key)? {
            trace!(key, "memoized result found");
            return Ok(format.deserialize(&raw)?);
        }

        let result = compute()?;
        let raw = format.serialize(&result)?;
        if !self.backend.add(key, raw, self.ttl)? {
            debug!(key, "memoized result already stored by another caller");
        }
        Ok(result)
    }
}

impl<T: Invoke, B: Backend> CallDecorator<T, B> {
    /// Memoized call of `method` through the target's [`Invoke`] table.
    ///
    /// Fails with [`CacheError::Runtime`] when the target has no such method.
    pub fn invoke(&self, method: &str, args: &[String]) -> BackendResult<T::Output> {
        let key = self.cache_key(method, args)?;
        self.memoize(&key, || {
            self.target.invoke(method, args).ok_or_else(|| {
                CacheError::Runtime(format!(
                    "cannot call method `{method}` on `{}`",
                    self.type_part
                ))
            })
        })
    }
}

fn type_label<T>() -> String {
    fn push_segment(label: &mut String, path: &str) {
        label.push_str(path.rsplit("::").next().unwrap_or(path));
    }

    let name = std::any::type_name::<T>();
    let mut label = String::with_capacity(name.len());
    let mut start = 0;
    for (at, ch) in name.char_indices() {
        if matches!(ch, '<' | '>' | ',' | '&' | '*' | '[' | ']' | ';' | '(' | ')' | ' ') {
            push_segment(&mut label, &name[start..at]);
            // Spaces would end up inside the key.
            if ch != ' ' {
                label.push(ch);
            }
            start = at + ch.len_utf8();
        }
    }
    push_segment(&mut label, &name[start..]);
    label
}
