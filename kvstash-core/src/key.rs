//! Cache key construction.
//!
//! Keys are plain strings built from a prefix, a delimiter and a list of
//! [`KeyPart`]s:
//!
//! `{prefix}{delimiter}{part1}{delimiter}{part2}...[{delimiter}{version}]`
//!
//! When the first part names a type implementing [`KeyType`] with a
//! `VERSION`, the version is appended as the last segment. Bumping the
//! version of a type therefore orphans every entry built for its previous
//! shape without touching the store.
//!
//! ```
//! use kvstash_core::{KeyBuilder, KeyConfig, KeyPart, KeyType, key_parts};
//!
//! struct Foo;
//!
//! impl KeyType for Foo {
//!     const NAME: &'static str = "Foo";
//!     const VERSION: Option<u32> = Some(10);
//! }
//!
//! let keys = KeyBuilder::new(KeyConfig::new("cache", "-"));
//! let key = keys.generate(&key_parts![KeyPart::of::<Foo>(), "bar"]).unwrap();
//! assert_eq!(key, "cache-Foo-bar-10");
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::CacheError;

const DEFAULT_PREFIX: &str = "cache";
const DEFAULT_DELIMITER: &str = ":";

/// A type that can head a cache key.
///
/// `NAME` becomes the first key segment. A `VERSION` is appended to the end
/// of every key the type heads.
pub trait KeyType {
    /// Segment used for the type in keys.
    const NAME: &'static str;

    /// Version mixed into keys headed by this type.
    const VERSION: Option<u32> = None;
}

/// One segment of a cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPart {
    value: SmolStr,
    version: Option<u32>,
}

impl KeyPart {
    /// Plain segment.
    pub fn new(value: impl Into<SmolStr>) -> Self {
        Self {
            value: value.into(),
            version: None,
        }
    }

    /// Segment naming the type `T`, carrying its version if it has one.
    pub fn of<T: KeyType>() -> Self {
        Self {
            value: SmolStr::new_static(T::NAME),
            version: T::VERSION,
        }
    }

    /// Segment text.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Version carried by a type segment.
    pub fn version(&self) -> Option<u32> {
        self.version
    }
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl From<&str> for KeyPart {
    fn from(value: &str) -> Self {
        KeyPart::new(value)
    }
}

impl From<String> for KeyPart {
    fn from(value: String) -> Self {
        KeyPart::new(value)
    }
}

impl From<&String> for KeyPart {
    fn from(value: &String) -> Self {
        KeyPart::new(value.as_str())
    }
}

impl From<SmolStr> for KeyPart {
    fn from(value: SmolStr) -> Self {
        KeyPart::new(value)
    }
}

macro_rules! impl_key_part_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for KeyPart {
                fn from(value: $ty) -> Self {
                    KeyPart::new(SmolStr::from(value.to_string()))
                }
            }
        )*
    };
}

impl_key_part_from_int!(i32, i64, u32, u64, usize);

/// Builds an array of [`KeyPart`]s from heterogeneous values.
///
/// ```
/// use kvstash_core::{KeyPart, key_parts};
///
/// let parts = key_parts!["user", 42_u64];
/// assert_eq!(parts, [KeyPart::new("user"), KeyPart::new("42")]);
/// ```
#[macro_export]
macro_rules! key_parts {
    ($($part:expr),* $(,)?) => {
        [$($crate::KeyPart::from($part)),*]
    };
}

/// Key prefix and delimiter.
///
/// Set once when the application starts and handed to every [`KeyBuilder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    /// First segment of every key.
    pub prefix: String,
    /// Separator placed between segments.
    pub delimiter: String,
}

impl KeyConfig {
    /// Creates a configuration from a prefix and a delimiter.
    pub fn new(prefix: impl Into<String>, delimiter: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            delimiter: delimiter.into(),
        }
    }
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX, DEFAULT_DELIMITER)
    }
}

/// Deterministic cache key construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyBuilder {
    config: KeyConfig,
}

impl KeyBuilder {
    /// Creates a builder from a key configuration.
    pub fn new(config: KeyConfig) -> Self {
        Self { config }
    }

    /// Configuration the builder was created with.
    pub fn config(&self) -> &KeyConfig {
        &self.config
    }

    /// Delimiter placed between key segments.
    pub fn delimiter(&self) -> &str {
        &self.config.delimiter
    }

    /// Joins the prefix and all parts with the delimiter, appending the
    /// version of the first part when it has one.
    ///
    /// Fails with [`CacheError::InvalidArgument`] when `parts` is empty.
    pub fn generate(&self, parts: &[KeyPart]) -> Result<String, CacheError> {
        let first = parts.first().ok_or_else(|| {
            CacheError::InvalidArgument(
                "at least one part must be passed to generate a cache key".to_owned(),
            )
        })?;

        let delimiter = self.config.delimiter.as_str();
        let mut key = String::with_capacity(
            self.config.prefix.len()
                + parts
                    .iter()
                    .map(|part| part.value.len() + delimiter.len())
                    .sum::<usize>(),
        );
        key.push_str(&self.config.prefix);
        for part in parts {
            key.push_str(delimiter);
            key.push_str(&part.value);
        }
        if let Some(version) = first.version {
            key.push_str(delimiter);
            key.push_str(&version.to_string());
        }
        Ok(key)
    }

    /// Generates the common key for `parts` and suffixes it with each id,
    /// producing one key per id in the order given.
    pub fn generate_many<I>(
        &self,
        parts: &[KeyPart],
        ids: impl IntoIterator<Item = I>,
    ) -> Result<Vec<String>, CacheError>
    where
        I: fmt::Display,
    {
        let common = self.generate(parts)?;
        let delimiter = self.config.delimiter.as_str();
        Ok(ids
            .into_iter()
            .map(|id| format!("{common}{delimiter}{id}"))
            .collect())
    }
}
