use byref_types::ObjectId;

use crate::config::ConnectorConfig;
use crate::error::ConnectorResult;

/// Uniform contract over a byte storage medium.
///
/// All implementations must satisfy these invariants:
/// - `put` with the same `(id, data)` pair is idempotent; the connector
///   never interprets the bytes.
/// - `get` of an absent id fails with [`ConnectorError::NotFound`],
///   never with a silent empty payload.
/// - `evict` of an absent id succeeds (double-evict is a no-op).
/// - Concurrent use from multiple threads is safe.
/// - Transient I/O failures are retried inside the connector, bounded by
///   its retry policy; everything else propagates to the caller.
///
/// Id generation is deliberately not part of this contract: the store's
/// key policy mints ids so that content-addressed policies can
/// deduplicate before the write ever reaches the medium.
///
/// [`ConnectorError::NotFound`]: crate::error::ConnectorError::NotFound
pub trait Connector: Send + Sync {
    /// Store a payload under the given id.
    fn put(&self, id: &ObjectId, data: &[u8]) -> ConnectorResult<()>;

    /// Read the payload stored under the given id.
    fn get(&self, id: &ObjectId) -> ConnectorResult<Vec<u8>>;

    /// Remove the payload stored under the given id, if any.
    fn evict(&self, id: &ObjectId) -> ConnectorResult<()>;

    /// Check whether a payload is stored under the given id.
    fn exists(&self, id: &ObjectId) -> ConnectorResult<bool>;

    /// Configuration from which a remote process can reconstruct an
    /// equivalent connector.
    fn config(&self) -> ConnectorConfig;

    /// Release the backing medium.
    ///
    /// Further operations on a closed connector are undefined at this
    /// level; the store layer guards them with its own closed flag.
    fn close(&self) -> ConnectorResult<()>;
}
