//! Typed access on top of raw backends.

use std::{collections::HashMap, time::Duration};

use kvstash_core::{CacheError, FormatError, Raw, decode_counter};
use serde::{Serialize, de::DeserializeOwned};

use crate::{Backend, BackendResult};

/// Typed helpers available on every [`Backend`].
///
/// Values are encoded with the backend's [`value_format`](Backend::value_format).
pub trait CacheExt: Backend {
    /// Reads and decodes a value.
    fn get_as<T>(&self, key: &str) -> BackendResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let format = self.value_format();
        match self.get(key)? {
            Some(raw) => Ok(Some(format.deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    /// Reads and decodes several values. Absent keys are left out.
    fn mget_as<T>(&self, keys: &[String]) -> BackendResult<HashMap<String, T>>
    where
        T: DeserializeOwned,
    {
        let format = self.value_format();
        self.mget(keys)?
            .into_iter()
            .map(|(key, raw)| Ok((key, format.deserialize(&raw)?)))
            .collect()
    }

    /// Encodes and stores a value.
    fn set_as<T>(&self, key: &str, value: &T, ttl: Option<Duration>) -> BackendResult<bool>
    where
        T: Serialize + ?Sized,
    {
        let raw = self.value_format().serialize(value)?;
        self.set(key, raw, ttl)
    }

    /// Encodes and stores a value if the key is absent.
    fn add_as<T>(&self, key: &str, value: &T, ttl: Option<Duration>) -> BackendResult<bool>
    where
        T: Serialize + ?Sized,
    {
        let raw = self.value_format().serialize(value)?;
        self.add(key, raw, ttl)
    }

    /// Typed [`create`](Backend::create).
    ///
    /// A stored value that cannot be decoded aborts the call before anything
    /// is written.
    fn create_with<T, F>(&self, key: &str, f: F, ttl: Option<Duration>) -> BackendResult<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(Option<T>) -> Option<T>,
    {
        typed_modify(self, key, f, ttl, true)
    }

    /// Typed [`update`](Backend::update).
    fn update_with<T, F>(&self, key: &str, f: F, ttl: Option<Duration>) -> BackendResult<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(T) -> Option<T>,
    {
        typed_modify(
            self,
            key,
            |current: Option<T>| current.and_then(f),
            ttl,
            false,
        )
    }

    /// Reads a counter written by [`increment`](Backend::increment).
    fn get_counter(&self, key: &str) -> BackendResult<Option<i64>> {
        match self.get(key)? {
            Some(raw) => decode_counter(&raw).map(Some).ok_or_else(|| {
                CacheError::Format(FormatError::Deserialize(
                    format!("value of \"{key}\" is not an integer").into(),
                ))
            }),
            None => Ok(None),
        }
    }
}

impl<B: Backend + ?Sized> CacheExt for B {}

fn typed_modify<B, T, F>(
    backend: &B,
    key: &str,
    f: F,
    ttl: Option<Duration>,
    create: bool,
) -> BackendResult<Option<T>>
where
    B: Backend + ?Sized,
    T: Serialize + DeserializeOwned,
    F: FnOnce(Option<T>) -> Option<T>,
{
    let format = backend.value_format();
    let mut failure = None;
    let mut produced = None;

    let modifier = Box::new(|current: Option<Raw>| {
        let current = match current.map(|raw| format.deserialize::<T>(&raw)).transpose() {
            Ok(current) => current,
            Err(err) => {
                failure = Some(err);
                return None;
            }
        };
        let next = f(current)?;
        match format.serialize(&next) {
            Ok(raw) => {
                produced = Some(next);
                Some(raw)
            }
            Err(err) => {
                failure = Some(err);
                None
            }
        }
    });

    let written = if create {
        backend.create(key, modifier, ttl)?
    } else {
        backend.update(key, modifier, ttl)?
    };

    if let Some(err) = failure {
        return Err(err.into());
    }
    Ok(written.and(produced))
}
