//! In-process stand-in for a memcached server.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use kvstash_memcache::{CasUnique, MemcacheClient};
use parking_lot::Mutex;

#[derive(Debug, thiserror::Error)]
#[error("connection reset by peer")]
pub struct FakeError;

struct Item {
    value: Bytes,
    unique: CasUnique,
    expires_at: Option<Instant>,
}

#[derive(Default)]
struct State {
    items: HashMap<String, Item>,
    next_unique: CasUnique,
}

impl State {
    fn live(&mut self, key: &str) -> Option<&mut Item> {
        let expired = self
            .items
            .get(key)
            .and_then(|item| item.expires_at)
            .is_some_and(|deadline| deadline <= Instant::now());
        if expired {
            self.items.remove(key);
        }
        self.items.get_mut(key)
    }

    fn store(&mut self, key: &str, value: &[u8], expiration: u32) {
        self.next_unique += 1;
        let expires_at =
            (expiration > 0).then(|| Instant::now() + Duration::from_secs(expiration.into()));
        self.items.insert(
            key.to_owned(),
            Item {
                value: Bytes::copy_from_slice(value),
                unique: self.next_unique,
                expires_at,
            },
        );
    }
}

/// Implements the protocol semantics the backend relies on.
#[derive(Default)]
pub struct FakeMemcache {
    state: Mutex<State>,
    offline: AtomicBool,
}

impl FakeMemcache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following command fail as if the server went away.
    pub fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    pub fn expiration_of(&self, key: &str) -> Option<Instant> {
        self.state.lock().items.get(key).and_then(|item| item.expires_at)
    }

    fn state(&self) -> Result<parking_lot::MutexGuard<'_, State>, FakeError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(FakeError)
        } else {
            Ok(self.state.lock())
        }
    }
}

impl MemcacheClient for FakeMemcache {
    type Error = FakeError;

    fn get(&self, key: &str) -> Result<Option<Bytes>, FakeError> {
        Ok(self.state()?.live(key).map(|item| item.value.clone()))
    }

    fn get_multi(&self, keys: &[String]) -> Result<HashMap<String, Bytes>, FakeError> {
        let mut state = self.state()?;
        Ok(keys
            .iter()
            .filter_map(|key| state.live(key).map(|item| (key.clone(), item.value.clone())))
            .collect())
    }

    fn gets(&self, key: &str) -> Result<Option<(Bytes, CasUnique)>, FakeError> {
        Ok(self
            .state()?
            .live(key)
            .map(|item| (item.value.clone(), item.unique)))
    }

    fn set(&self, key: &str, value: &[u8], expiration: u32) -> Result<bool, FakeError> {
        self.state()?.store(key, value, expiration);
        Ok(true)
    }

    fn add(&self, key: &str, value: &[u8], expiration: u32) -> Result<bool, FakeError> {
        let mut state = self.state()?;
        if state.live(key).is_some() {
            return Ok(false);
        }
        state.store(key, value, expiration);
        Ok(true)
    }

    fn cas(
        &self,
        key: &str,
        value: &[u8],
        expiration: u32,
        unique: CasUnique,
    ) -> Result<bool, FakeError> {
        let mut state = self.state()?;
        let unchanged = state.live(key).is_some_and(|item| item.unique == unique);
        if unchanged {
            state.store(key, value, expiration);
        }
        Ok(unchanged)
    }

    fn delete(&self, key: &str) -> Result<bool, FakeError> {
        let mut state = self.state()?;
        let found = state.live(key).is_some();
        state.items.remove(key);
        Ok(found)
    }

    fn incr(&self, key: &str, delta: u64) -> Result<Option<u64>, FakeError> {
        let mut state = self.state()?;
        let Some(item) = state.live(key) else {
            return Ok(None);
        };
        let current: u64 = std::str::from_utf8(&item.value)
            .ok()
            .and_then(|text| text.parse().ok())
            .unwrap_or_default();
        let next = current.wrapping_add(delta);
        item.value = Bytes::from(next.to_string());
        Ok(Some(next))
    }

    fn flush(&self) -> Result<bool, FakeError> {
        self.state()?.items.clear();
        Ok(true)
    }
}

pub fn raw(value: &'static str) -> Bytes {
    Bytes::from_static(value.as_bytes())
}
