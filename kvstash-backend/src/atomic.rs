//! Atomic read-modify-write protocol.
//!
//! `create` and `update` are written once, here, against the
//! [`CompareAndSwap`] primitive. Each backend that can detect concurrent
//! changes implements the primitive with whatever its store offers:
//!
//! | Backend | Token | Conditional write |
//! |---------|-------|-------------------|
//! | moka | entry revision | compare revision inside `and_compute_with` |
//! | memcache | `gets` CAS unique | `cas`, or `add` when the key was absent |
//! | redis | connection holding a `WATCH` | `MULTI` / `SET` / `EXEC` |
//!
//! Backends without such a primitive do not implement the trait and reject
//! `create`/`update` with [`CacheError::Unsupported`].
//!
//! A conditional write that fails means the entry changed after it was read,
//! either because another client wrote it or because the modifier itself
//! wrote the key as a side effect. Both surface as
//! [`CacheError::AtomicViolation`]. Nothing here retries.

use std::time::Duration;

use kvstash_core::{CacheError, Modifier, Operation, Raw};
use tracing::{debug, trace};

use crate::{Backend, BackendResult};

/// Result of a read that prepares a conditional write.
#[derive(Debug)]
pub struct Snapshot<T> {
    /// Value at the moment of the read, `None` when the key is absent.
    pub value: Option<Raw>,
    /// Backend specific token bound to that state.
    pub token: T,
}

/// Optimistic concurrency primitive of a backend.
pub trait CompareAndSwap: Backend {
    /// Opaque state captured by the read. Only the backend that produced it
    /// knows how to use it.
    type Token;

    /// Reads `key` and captures a token for the current state, including the
    /// "absent" state.
    fn read_for_update(&self, key: &str) -> BackendResult<Snapshot<Self::Token>>;

    /// Writes `value` only if the entry is still in the state `token` was
    /// captured from. Returns `false` when it is not.
    fn write_if_unchanged(
        &self,
        key: &str,
        token: Self::Token,
        value: Raw,
        ttl: Option<Duration>,
    ) -> BackendResult<bool>;

    /// Gives back a token without writing.
    fn release(&self, token: Self::Token) -> BackendResult<()> {
        drop(token);
        Ok(())
    }
}

/// Creates or replaces `key` with the value produced by `modifier`.
///
/// The modifier receives the current value (`None` when absent) and is
/// invoked exactly once. Returns the written value, or `None` when the
/// modifier produced none, in which case nothing is written.
pub fn create<C>(
    backend: &C,
    key: &str,
    modifier: Modifier<'_>,
    ttl: Option<Duration>,
) -> BackendResult<Option<Raw>>
where
    C: CompareAndSwap + ?Sized,
{
    modify(backend, key, modifier, ttl, Operation::Create)
}

/// Replaces an existing `key` with the value produced by `modifier`.
///
/// An absent key short-circuits: the token is released, the modifier is not
/// invoked and `None` is returned.
pub fn update<C>(
    backend: &C,
    key: &str,
    modifier: Modifier<'_>,
    ttl: Option<Duration>,
) -> BackendResult<Option<Raw>>
where
    C: CompareAndSwap + ?Sized,
{
    modify(backend, key, modifier, ttl, Operation::Update)
}

fn modify<C>(
    backend: &C,
    key: &str,
    modifier: Modifier<'_>,
    ttl: Option<Duration>,
    operation: Operation,
) -> BackendResult<Option<Raw>>
where
    C: CompareAndSwap + ?Sized,
{
    let Snapshot { value, token } = backend.read_for_update(key)?;

    if value.is_none() && operation == Operation::Update {
        trace!(key, backend = %backend.label(), "update skipped, key is absent");
        backend.release(token)?;
        return Ok(None);
    }

    let Some(next) = modifier(value) else {
        trace!(key, %operation, "modifier produced no value");
        backend.release(token)?;
        return Ok(None);
    };

    if backend.write_if_unchanged(key, token, next.clone(), ttl)? {
        Ok(Some(next))
    } else {
        debug!(key, %operation, backend = %backend.label(), "conditional write lost its race");
        Err(CacheError::atomic_violation(key, operation))
    }
}

/// Rejects increments below one.
#[inline]
pub fn validate_delta(delta: i64) -> BackendResult<()> {
    if delta < 1 {
        Err(CacheError::InvalidArgument(format!(
            "increment delta must be at least 1, got {delta}"
        )))
    } else {
        Ok(())
    }
}

/// Increment for stores whose native increment does not create absent keys.
///
/// `incr` returns `None` when the key is absent. The key is then seeded with
/// `delta` through `seed`, an add-if-absent, so the result is as if the key
/// had started at zero. A failed seed means another writer created the key in
/// between and is reported as [`CacheError::AtomicViolation`].
pub fn increment_or_seed<I, S>(key: &str, delta: i64, incr: I, seed: S) -> BackendResult<i64>
where
    I: FnOnce() -> BackendResult<Option<i64>>,
    S: FnOnce() -> BackendResult<bool>,
{
    validate_delta(delta)?;
    if let Some(value) = incr()? {
        return Ok(value);
    }
    if seed()? {
        Ok(delta)
    } else {
        debug!(key, "seeding absent counter lost its race");
        Err(CacheError::atomic_violation(key, Operation::Increment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_delta() {
        assert!(validate_delta(1).is_ok());
        assert!(matches!(
            validate_delta(0),
            Err(CacheError::InvalidArgument(_))
        ));
        assert!(validate_delta(-5).is_err());
    }

    #[test]
    fn test_increment_existing_counter() {
        let value = increment_or_seed("hits", 2, || Ok(Some(7)), || unreachable!()).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn test_increment_seeds_absent_counter() {
        let value = increment_or_seed("hits", 3, || Ok(None), || Ok(true)).unwrap();
        assert_eq!(value, 3);
    }

    #[test]
    fn test_increment_seed_conflict() {
        let err = increment_or_seed("hits", 3, || Ok(None), || Ok(false)).unwrap_err();
        assert!(err.is_atomic_violation());
    }

    #[test]
    fn test_increment_rejects_delta_before_touching_store() {
        let err = increment_or_seed("hits", 0, || unreachable!(), || unreachable!()).unwrap_err();
        assert!(matches!(err, CacheError::InvalidArgument(_)));
    }
}
