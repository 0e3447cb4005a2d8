use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::object::ObjectId;

/// Identity of a stored payload: the name of the store that minted it plus
/// the payload's [`ObjectId`].
///
/// A `Key` carries no data. It is cheap to clone, serializable, and
/// reconstructable in any process; a process holding a `Key` can read the
/// payload once it has a store registered under `key.store()` with an
/// equivalent connector configuration.
///
/// Uniqueness: `(store, object)` is unique for the lifetime of the store
/// that minted the key.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key {
    store: String,
    object: ObjectId,
}

impl Key {
    /// Create a key for an object stored under the given store name.
    pub fn new(store: impl Into<String>, object: ObjectId) -> Self {
        Self {
            store: store.into(),
            object,
        }
    }

    /// Name of the store that minted this key.
    pub fn store(&self) -> &str {
        &self.store
    }

    /// Identifier of the payload within the store's backing medium.
    pub fn object(&self) -> &ObjectId {
        &self.object
    }

    /// Short form for logs: `store:8-hex-chars`.
    pub fn short(&self) -> String {
        format!("{}:{}", self.store, self.object.short_hex())
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.short())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.store, self.object)
    }
}

impl FromStr for Key {
    type Err = TypeError;

    /// Parse the `store:objecthex` form produced by `Display`.
    ///
    /// The object id is the fixed-width suffix, so store names may contain
    /// colons.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (store, object) = s
            .rsplit_once(':')
            .ok_or_else(|| TypeError::InvalidKey(s.to_string()))?;
        if store.is_empty() {
            return Err(TypeError::InvalidKey(s.to_string()));
        }
        let object = ObjectId::from_hex(object)?;
        Ok(Self::new(store, object))
    }
}
