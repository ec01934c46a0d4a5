//! Value serialization formats.
//!
//! Backends store opaque [`Raw`] bytes. The typed layer ([`CacheExt`](crate::CacheExt))
//! turns values into bytes with the [`Format`] reported by the backend.
//!
//! | Format | Size | Human-readable | Counters readable as `i64` |
//! |--------|------|----------------|----------------------------|
//! | [`Json`](Format::Json) | Larger | Yes | Yes |
//! | [`Bincode`](Format::Bincode) | Compact | No | No, use `get_counter` |

use bytes::Bytes;
use kvstash_core::{FormatError, Raw};
use serde::{Serialize, de::DeserializeOwned};

/// Value serialization format.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Format {
    /// JSON via `serde_json`.
    ///
    /// Integers are encoded as ASCII decimal, the same representation
    /// `increment` uses, so counters can be read back as numbers.
    #[default]
    Json,

    /// Compact binary format using bincode's standard configuration.
    Bincode,
}

impl Format {
    /// Serialize a value to bytes.
    pub fn serialize<T>(&self, value: &T) -> Result<Raw, FormatError>
    where
        T: Serialize + ?Sized,
    {
        match self {
            Format::Json => serde_json::to_vec(value)
                .map(Bytes::from)
                .map_err(|err| FormatError::Serialize(Box::new(err))),
            Format::Bincode => bincode::serde::encode_to_vec(value, bincode::config::standard())
                .map(Bytes::from)
                .map_err(|err| FormatError::Serialize(Box::new(err))),
        }
    }

    /// Deserialize bytes back to a value.
    pub fn deserialize<T>(&self, data: &[u8]) -> Result<T, FormatError>
    where
        T: DeserializeOwned,
    {
        match self {
            Format::Json => {
                serde_json::from_slice(data).map_err(|err| FormatError::Deserialize(Box::new(err)))
            }
            Format::Bincode => {
                bincode::serde::decode_from_slice(data, bincode::config::standard())
                    .map(|(value, _)| value)
                    .map_err(|err| FormatError::Deserialize(Box::new(err)))
            }
        }
    }
}
