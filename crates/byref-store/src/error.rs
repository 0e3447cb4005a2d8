use byref_connector::ConnectorError;
use byref_types::Key;

/// Snapshot of a failed resolution, cached on the proxy that attempted it.
///
/// Once a proxy fails, repeated access re-raises this same error instead
/// of silently re-fetching; an explicit `reset` is required to try again.
/// `not_found` distinguishes the benign eviction race (the backing key is
/// gone) from transport or codec failures.
#[derive(Clone, Debug, thiserror::Error)]
#[error("resolution of {key} failed: {reason}")]
pub struct ResolutionFailed {
    /// The key whose resolution failed.
    pub key: Key,
    /// Human-readable failure cause (the last error after retries).
    pub reason: String,
    /// `true` if the failure was a missing key rather than an I/O or
    /// codec problem.
    pub not_found: bool,
}

impl ResolutionFailed {
    /// Capture a store error as a cacheable resolution failure.
    pub fn from_store_error(key: Key, err: &StoreError) -> Self {
        Self {
            key,
            reason: err.to_string(),
            not_found: err.is_not_found(),
        }
    }

    /// Returns `true` for the benign missing-key outcome.
    pub fn is_not_found(&self) -> bool {
        self.not_found
    }
}

/// Errors from store, registry, and proxy operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The key is absent from the backing medium (possibly evicted by
    /// another process). Recoverable; the caller decides.
    #[error("key not found: {0}")]
    KeyNotFound(Key),

    /// The key was minted by a different store. Programming error; never
    /// retried.
    #[error("key {key} does not belong to store {store:?}")]
    ForeignKey { key: Key, store: String },

    /// The value cannot be represented by the configured serializer.
    /// Surfaced at put time, never at resolution time.
    #[error("unsupported value type: {0}")]
    UnsupportedType(String),

    /// Stored bytes could not be decoded into the requested type.
    #[error("deserialization failed: {0}")]
    Deserialize(String),

    /// The store has been closed.
    #[error("store {0:?} is closed")]
    Closed(String),

    /// Strict close refused: proxies minted by this store are still live.
    #[error("store {name:?} is still referenced by {proxies} live proxies")]
    InUse { name: String, proxies: usize },

    /// A store with this name is already registered.
    #[error("store {0:?} is already registered")]
    DuplicateStore(String),

    /// No store is registered under this name.
    #[error("no store registered under {0:?}")]
    UnknownStore(String),

    /// Failure from the underlying connector after its retry budget.
    #[error(transparent)]
    Connector(#[from] ConnectorError),

    /// Cached failure from an earlier resolution attempt.
    #[error(transparent)]
    Resolution(#[from] ResolutionFailed),
}

impl StoreError {
    /// Returns `true` if the error is the benign missing-key case, at
    /// whichever layer it surfaced.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::KeyNotFound(_) => true,
            Self::Connector(e) => e.is_not_found(),
            Self::Resolution(e) => e.not_found,
            _ => false,
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use byref_types::ObjectId;

    fn key() -> Key {
        Key::new("s", ObjectId::of_content(b"k"))
    }

    #[test]
    fn not_found_classification() {
        assert!(StoreError::KeyNotFound(key()).is_not_found());
        assert!(StoreError::Connector(ConnectorError::NotFound(ObjectId::random())).is_not_found());
        assert!(!StoreError::Closed("s".into()).is_not_found());
        assert!(!StoreError::Deserialize("bad".into()).is_not_found());
    }

    #[test]
    fn resolution_failed_captures_not_found() {
        let failed = ResolutionFailed::from_store_error(key(), &StoreError::KeyNotFound(key()));
        assert!(failed.is_not_found());
        assert!(StoreError::from(failed).is_not_found());
    }

    #[test]
    fn resolution_failed_captures_other_causes() {
        let failed = ResolutionFailed::from_store_error(
            key(),
            &StoreError::Deserialize("truncated".into()),
        );
        assert!(!failed.is_not_found());
        assert!(failed.reason.contains("truncated"));
    }
}
