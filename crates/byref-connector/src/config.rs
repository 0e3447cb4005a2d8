use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConnectorResult;
use crate::file::FileConnector;
use crate::local::LocalConnector;
use crate::redis::RedisConnector;
use crate::retry::RetryPolicy;
use crate::traits::Connector;

/// Everything a process needs to open a connector equivalent to one
/// running elsewhere.
///
/// This mapping is the only connector state that crosses process
/// boundaries: a store's config embeds it, and a worker process calls
/// [`ConnectorConfig::connect`] to reach the same backing medium.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ConnectorConfig {
    /// In-process map. Carries no state: a connector rebuilt from this in
    /// another process starts empty, so it only makes sense for
    /// same-process and test scenarios.
    Local,
    /// One file per object inside `dir`, reachable by any process that
    /// shares the filesystem.
    File { dir: PathBuf },
    /// Redis-compatible service.
    Redis {
        url: String,
        op_timeout: Duration,
        retry: RetryPolicy,
    },
}

impl ConnectorConfig {
    /// Open a connector described by this configuration.
    pub fn connect(&self) -> ConnectorResult<Box<dyn Connector>> {
        match self {
            Self::Local => Ok(Box::new(LocalConnector::new())),
            Self::File { dir } => Ok(Box::new(FileConnector::open(dir.clone())?)),
            Self::Redis {
                url,
                op_timeout,
                retry,
            } => Ok(Box::new(RedisConnector::open_with(
                url.clone(),
                *op_timeout,
                retry.clone(),
            )?)),
        }
    }

    /// Short tag for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::File { .. } => "file",
            Self::Redis { .. } => "redis",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_roundtrip_all_variants() {
        let configs = [
            ConnectorConfig::Local,
            ConnectorConfig::File {
                dir: PathBuf::from("/tmp/byref-objects"),
            },
            ConnectorConfig::Redis {
                url: "redis://localhost:6379".into(),
                op_timeout: Duration::from_secs(5),
                retry: RetryPolicy::default(),
            },
        ];
        for config in configs {
            let json = serde_json::to_string(&config).unwrap();
            let parsed: ConnectorConfig = serde_json::from_str(&json).unwrap();
            assert_eq!(config, parsed);
        }
    }

    #[test]
    fn local_connect_starts_empty() {
        use byref_types::ObjectId;

        let first = ConnectorConfig::Local.connect().unwrap();
        let id = ObjectId::random();
        first.put(&id, b"not shared").unwrap();

        // Rebuilding from the same config does not see prior contents.
        let second = ConnectorConfig::Local.connect().unwrap();
        assert!(!second.exists(&id).unwrap());
    }

    #[test]
    fn file_connect_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConnectorConfig::File {
            dir: dir.path().join("objects"),
        };
        let conn = config.connect().unwrap();
        assert_eq!(conn.config(), config);
    }

    #[test]
    fn kinds() {
        assert_eq!(ConnectorConfig::Local.kind(), "local");
        assert_eq!(
            ConnectorConfig::File {
                dir: PathBuf::new()
            }
            .kind(),
            "file"
        );
    }
}
