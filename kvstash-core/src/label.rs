//! Backend labels.
//!
//! A decorated backend is named after its chain, outermost first, joined
//! with `.`: a timing decorator over a hot cache over Redis is
//! `timed.hot.redis`. The last segment names the storage the chain ends in.

use smol_str::{SmolStr, format_smolstr};
use std::fmt;

const SEPARATOR: char = '.';

/// A label identifying a cache backend or a decorator chain.
///
/// Shows up in `Backend::label()`, in the `backend` field of
/// [`CacheError::Unsupported`](crate::CacheError::Unsupported), in log
/// fields and in metric labels.
///
/// ```
/// use kvstash_core::BackendLabel;
///
/// let label = BackendLabel::new("redis").decorated_by("hot").decorated_by("timed");
/// assert_eq!(label.as_str(), "timed.hot.redis");
/// assert_eq!(label.storage(), "redis");
/// assert_eq!(label.decorators().collect::<Vec<_>>(), ["timed", "hot"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BackendLabel(SmolStr);

impl BackendLabel {
    /// Creates a new backend label.
    #[inline]
    pub fn new(s: impl Into<SmolStr>) -> Self {
        Self(s.into())
    }

    /// Creates a backend label from a static string without allocating.
    #[inline]
    pub const fn new_static(s: &'static str) -> Self {
        Self(SmolStr::new_static(s))
    }

    /// Returns the label as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Label of this backend once wrapped by `decorator`.
    pub fn decorated_by(&self, decorator: &str) -> Self {
        Self(format_smolstr!("{decorator}{SEPARATOR}{}", self.0))
    }

    /// Name of the storage at the bottom of the chain.
    pub fn storage(&self) -> &str {
        self.0.rsplit(SEPARATOR).next().unwrap_or(&self.0)
    }

    /// Decorator names, outermost first. Empty for an undecorated backend.
    pub fn decorators(&self) -> impl Iterator<Item = &str> {
        let chain = self
            .0
            .rsplit_once(SEPARATOR)
            .map_or("", |(decorators, _)| decorators);
        chain.split(SEPARATOR).filter(|name| !name.is_empty())
    }

    /// Whether `decorator` wraps this backend anywhere in the chain.
    pub fn is_decorated_by(&self, decorator: &str) -> bool {
        self.decorators().any(|name| name == decorator)
    }
}

impl fmt::Display for BackendLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for BackendLabel {
    #[inline]
    fn from(s: &str) -> Self {
        Self(SmolStr::new(s))
    }
}

impl From<String> for BackendLabel {
    #[inline]
    fn from(s: String) -> Self {
        Self(SmolStr::from(s))
    }
}

impl AsRef<str> for BackendLabel {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}
