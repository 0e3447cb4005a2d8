use std::io;
use std::sync::Mutex;
use std::time::Duration;

use redis::{Client, Commands, Connection};
use tracing::debug;

use byref_types::ObjectId;

use crate::config::ConnectorConfig;
use crate::error::{ConnectorError, ConnectorResult};
use crate::retry::{with_retry, RetryPolicy};
use crate::traits::Connector;

/// Namespace prefix for byref payloads inside the Redis keyspace.
const KEY_PREFIX: &str = "byref:";

/// Default per-operation timeout.
const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(5);

/// Networked key-value connector over a Redis-compatible service.
///
/// Payloads are stored under `byref:<hex-id>`. A single connection is
/// held behind a mutex and re-established on the next attempt after any
/// failure; every command runs under the configured [`RetryPolicy`], so
/// transient connection drops and timeouts are absorbed up to the attempt
/// budget and then surfaced.
pub struct RedisConnector {
    url: String,
    client: Client,
    conn: Mutex<Option<Connection>>,
    op_timeout: Duration,
    retry: RetryPolicy,
}

impl RedisConnector {
    /// Open a connector against the given URL (e.g. `redis://host:6379`)
    /// with default timeout and retry settings.
    ///
    /// The connection itself is established lazily on first use.
    pub fn open(url: impl Into<String>) -> ConnectorResult<Self> {
        Self::open_with(url, DEFAULT_OP_TIMEOUT, RetryPolicy::default())
    }

    /// Open a connector with explicit timeout and retry settings.
    pub fn open_with(
        url: impl Into<String>,
        op_timeout: Duration,
        retry: RetryPolicy,
    ) -> ConnectorResult<Self> {
        let url = url.into();
        let client = Client::open(url.as_str())
            .map_err(|e| ConnectorError::Unavailable(format!("invalid redis url: {e}")))?;
        Ok(Self {
            url,
            client,
            conn: Mutex::new(None),
            op_timeout,
            retry,
        })
    }

    /// Redis key for an object id.
    fn redis_key(id: &ObjectId) -> String {
        format!("{KEY_PREFIX}{}", id.to_hex())
    }

    /// Run a command on the cached connection, establishing it if needed.
    ///
    /// On failure the connection is dropped so the next attempt (from the
    /// retry loop) reconnects from scratch.
    fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> redis::RedisResult<T>,
    ) -> ConnectorResult<T> {
        let mut guard = self.conn.lock().expect("lock poisoned");
        if guard.is_none() {
            let conn = self
                .client
                .get_connection_with_timeout(self.op_timeout)
                .map_err(|e| self.map_err(e))?;
            conn.set_read_timeout(Some(self.op_timeout))
                .map_err(|e| self.map_err(e))?;
            conn.set_write_timeout(Some(self.op_timeout))
                .map_err(|e| self.map_err(e))?;
            *guard = Some(conn);
        }
        let Some(conn) = guard.as_mut() else {
            return Err(ConnectorError::Unavailable(
                "connection unexpectedly absent".into(),
            ));
        };
        match f(conn) {
            Ok(value) => Ok(value),
            Err(e) => {
                *guard = None;
                Err(self.map_err(e))
            }
        }
    }

    fn map_err(&self, err: redis::RedisError) -> ConnectorError {
        if err.is_timeout() {
            ConnectorError::Timeout {
                seconds: self.op_timeout.as_secs(),
            }
        } else if err.is_io_error()
            || err.is_connection_refusal()
            || err.is_connection_dropped()
            || err.is_cluster_error()
        {
            ConnectorError::Unavailable(err.to_string())
        } else {
            // Protocol or response-shape errors will not heal on retry.
            ConnectorError::Io(io::Error::other(err.to_string()))
        }
    }
}

impl Connector for RedisConnector {
    fn put(&self, id: &ObjectId, data: &[u8]) -> ConnectorResult<()> {
        let key = Self::redis_key(id);
        let _: () = with_retry(&self.retry, "redis put", || {
            self.with_conn(|conn| conn.set(&key, data))
        })?;
        debug!(id = %id.short_hex(), len = data.len(), "redis put");
        Ok(())
    }

    fn get(&self, id: &ObjectId) -> ConnectorResult<Vec<u8>> {
        let key = Self::redis_key(id);
        let value: Option<Vec<u8>> = with_retry(&self.retry, "redis get", || {
            self.with_conn(|conn| conn.get(&key))
        })?;
        value.ok_or(ConnectorError::NotFound(*id))
    }

    fn evict(&self, id: &ObjectId) -> ConnectorResult<()> {
        let key = Self::redis_key(id);
        // DEL of a missing key deletes zero entries, which is still success.
        let _: u64 = with_retry(&self.retry, "redis evict", || {
            self.with_conn(|conn| conn.del(&key))
        })?;
        Ok(())
    }

    fn exists(&self, id: &ObjectId) -> ConnectorResult<bool> {
        let key = Self::redis_key(id);
        with_retry(&self.retry, "redis exists", || {
            self.with_conn(|conn| conn.exists(&key))
        })
    }

    fn config(&self) -> ConnectorConfig {
        ConnectorConfig::Redis {
            url: self.url.clone(),
            op_timeout: self.op_timeout,
            retry: self.retry.clone(),
        }
    }

    fn close(&self) -> ConnectorResult<()> {
        // Dropping the connection is all the sync client needs; stored
        // payloads stay in the service for other processes.
        *self.conn.lock().expect("lock poisoned") = None;
        Ok(())
    }
}

impl std::fmt::Debug for RedisConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisConnector")
            .field("url", &self.url)
            .field("op_timeout", &self.op_timeout)
            .finish()
    }
}
