//! Value-side vocabulary: raw payloads, TTLs and modifiers.

use std::time::Duration;

/// Raw byte data stored by backends.
///
/// Backends treat values as opaque blobs. Using `Bytes` keeps clones cheap,
/// which matters for decorators that keep a copy of what they pass through.
pub type Raw = bytes::Bytes;

/// Caller-supplied transformation used by atomic `create` and `update`.
///
/// The modifier receives the current value (`None` when the key is absent)
/// and returns the value to write, or `None` to signal that there is no new
/// value and the write must be skipped. It is invoked exactly once per call.
pub type Modifier<'a> = Box<dyn FnOnce(Option<Raw>) -> Option<Raw> + 'a>;

/// Boxes a closure into a [`Modifier`].
///
/// ```
/// use kvstash_core::{Raw, modifier};
///
/// let append = modifier(|current: Option<Raw>| {
///     let mut next = current.map(|v| v.to_vec()).unwrap_or_default();
///     next.push(b'!');
///     Some(Raw::from(next))
/// });
/// assert_eq!(append(Some(Raw::from_static(b"hi"))), Some(Raw::from_static(b"hi!")));
/// ```
pub fn modifier<'a, F>(f: F) -> Modifier<'a>
where
    F: FnOnce(Option<Raw>) -> Option<Raw> + 'a,
{
    Box::new(f)
}

/// Normalizes a TTL: zero means "no expiration".
#[inline]
pub fn effective_ttl(ttl: Option<Duration>) -> Option<Duration> {
    ttl.filter(|ttl| !ttl.is_zero())
}

/// TTL in whole seconds, rounded up so that sub-second TTLs do not become
/// "no expiration" on stores with second granularity.
#[inline]
pub fn ttl_secs(ttl: Option<Duration>) -> Option<u64> {
    effective_ttl(ttl).map(|ttl| {
        let secs = ttl.as_secs();
        if ttl.subsec_nanos() > 0 { secs + 1 } else { secs }
    })
}

/// Encodes a counter the way `increment` stores it: ASCII decimal.
#[inline]
pub fn encode_counter(value: i64) -> Raw {
    Raw::from(value.to_string())
}

/// Decodes a counter stored by `increment`.
///
/// Returns `None` when the bytes are not an ASCII decimal integer.
pub fn decode_counter(data: &[u8]) -> Option<i64> {
    std::str::from_utf8(data).ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_ttl_is_unbounded() {
        assert_eq!(effective_ttl(Some(Duration::ZERO)), None);
        assert_eq!(effective_ttl(None), None);
        assert_eq!(
            effective_ttl(Some(Duration::from_secs(5))),
            Some(Duration::from_secs(5))
        );
    }

    #[test]
    fn test_ttl_secs_rounds_up() {
        assert_eq!(ttl_secs(Some(Duration::from_millis(1500))), Some(2));
        assert_eq!(ttl_secs(Some(Duration::from_millis(200))), Some(1));
        assert_eq!(ttl_secs(Some(Duration::from_secs(3))), Some(3));
        assert_eq!(ttl_secs(Some(Duration::ZERO)), None);
    }

    #[test]
    fn test_counter_encoding() {
        assert_eq!(encode_counter(42).as_ref(), b"42");
        assert_eq!(decode_counter(b"42"), Some(42));
        assert_eq!(decode_counter(b"-7"), Some(-7));
        assert_eq!(decode_counter(b"\"text\""), None);
    }
}
