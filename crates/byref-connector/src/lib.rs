//! Storage connectors for byref.
//!
//! A [`Connector`] is a uniform put/get/evict/exists contract over a byte
//! storage medium. The store layer composes a connector with a serializer
//! and a key policy; connectors never interpret payload contents.
//!
//! # Backends
//!
//! - [`LocalConnector`] — `HashMap`-based, same-process/testing only
//! - [`FileConnector`] — one file per object on a shared or node-local
//!   filesystem, atomic writes
//! - [`RedisConnector`] — networked key-value service, transient failures
//!   retried with bounded exponential backoff
//!
//! # Design Rules
//!
//! 1. Object ids are minted by the store's key policy; a connector only
//!    stores bytes under the id it is given.
//! 2. Mutating operations are idempotent: double-evict and repeated
//!    put-with-same-id never corrupt state.
//! 3. Only transient errors (timeout, unavailable) are retried; a missing
//!    id is reported as [`ConnectorError::NotFound`] and left to the
//!    caller.
//! 4. A [`ConnectorConfig`] carries everything a remote process needs to
//!    open an equivalent connector.

pub mod config;
pub mod error;
pub mod file;
pub mod local;
pub mod redis;
pub mod retry;
pub mod traits;

pub use config::ConnectorConfig;
pub use error::{ConnectorError, ConnectorResult};
pub use file::FileConnector;
pub use local::LocalConnector;
pub use self::redis::RedisConnector;
pub use retry::{with_retry, RetryPolicy};
pub use traits::Connector;
