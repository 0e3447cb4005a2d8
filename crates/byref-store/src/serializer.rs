use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Payload codec for values crossing the store boundary.
///
/// Round-trip invariant: `from_bytes(to_bytes(v)) == v` for every
/// supported value. A value the codec cannot represent fails at
/// serialization time with [`StoreError::UnsupportedType`], so a bad put
/// is reported at the call site rather than at some later resolution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Serializer {
    /// Compact binary encoding (default).
    #[default]
    Bincode,
    /// JSON encoding; larger but human-readable, useful when payloads are
    /// inspected in the backing medium.
    Json,
}

impl Serializer {
    /// Encode a value to bytes.
    pub fn to_bytes<T: Serialize + ?Sized>(&self, value: &T) -> StoreResult<Vec<u8>> {
        match self {
            Self::Bincode => {
                bincode::serialize(value).map_err(|e| StoreError::UnsupportedType(e.to_string()))
            }
            Self::Json => {
                serde_json::to_vec(value).map_err(|e| StoreError::UnsupportedType(e.to_string()))
            }
        }
    }

    /// Decode a value from bytes.
    pub fn from_bytes<T: DeserializeOwned>(&self, bytes: &[u8]) -> StoreResult<T> {
        match self {
            Self::Bincode => {
                bincode::deserialize(bytes).map_err(|e| StoreError::Deserialize(e.to_string()))
            }
            Self::Json => {
                serde_json::from_slice(bytes).map_err(|e| StoreError::Deserialize(e.to_string()))
            }
        }
    }

    /// Short tag for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bincode => "bincode",
            Self::Json => "json",
        }
    }
}
