use byref_types::ObjectId;

/// Errors from connector operations.
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    /// The requested object is absent from the backing medium.
    ///
    /// Recoverable: an eviction racing a get surfaces this to the loser.
    #[error("object not found: {0}")]
    NotFound(ObjectId),

    /// The operation did not complete within the configured timeout.
    #[error("operation timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// The backing service could not be reached or dropped the connection.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// I/O error from the underlying storage medium.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backend returned a malformed payload or response.
    #[error("corrupt object {id}: {reason}")]
    Corrupt { id: ObjectId, reason: String },
}

impl ConnectorError {
    /// Returns `true` if retrying the operation may succeed.
    ///
    /// Only timeouts and unreachable-backend failures qualify; a missing
    /// object or a corrupt response will not heal on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Unavailable(_))
    }

    /// Returns `true` if this is the benign missing-object case.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result alias for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(ConnectorError::Timeout { seconds: 5 }.is_transient());
        assert!(ConnectorError::Unavailable("refused".into()).is_transient());
        assert!(!ConnectorError::NotFound(ObjectId::random()).is_transient());
        assert!(!ConnectorError::Corrupt {
            id: ObjectId::random(),
            reason: "bad frame".into(),
        }
        .is_transient());
    }

    #[test]
    fn not_found_classification() {
        assert!(ConnectorError::NotFound(ObjectId::random()).is_not_found());
        assert!(!ConnectorError::Unavailable("down".into()).is_not_found());
    }
}
