use serde::{Deserialize, Serialize};

use crate::object::ObjectId;

/// Policy for minting [`ObjectId`]s at put time.
///
/// `Random` needs no coordination between processes and treats every put
/// as a distinct object. `ContentHash` derives the id from the payload
/// bytes, so identical payloads collapse onto one id; the store layer
/// reference-counts such ids and only releases the backing bytes when the
/// last reference is evicted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyPolicy {
    /// Fresh random token per put (default).
    #[default]
    Random,
    /// BLAKE3 hash of the payload; identical payloads deduplicate.
    ContentHash,
}

impl KeyPolicy {
    /// Mint the object id for a payload under this policy.
    pub fn object_id(&self, payload: &[u8]) -> ObjectId {
        match self {
            Self::Random => ObjectId::random(),
            Self::ContentHash => ObjectId::of_content(payload),
        }
    }

    /// Returns `true` if ids minted by this policy deduplicate payloads.
    pub fn deduplicates(&self) -> bool {
        matches!(self, Self::ContentHash)
    }
}
