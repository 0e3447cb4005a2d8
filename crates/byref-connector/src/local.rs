use std::collections::HashMap;
use std::sync::RwLock;

use byref_types::ObjectId;

use crate::config::ConnectorConfig;
use crate::error::{ConnectorError, ConnectorResult};
use crate::traits::Connector;

/// In-process, `HashMap`-based connector.
///
/// Intended for tests and same-process pipelines. Payloads live in memory
/// behind a `RwLock`; nothing survives the process, and
/// [`ConnectorConfig::Local`] deliberately carries no state — a connector
/// rebuilt from it in another process starts empty.
pub struct LocalConnector {
    objects: RwLock<HashMap<ObjectId, Vec<u8>>>,
}

impl LocalConnector {
    /// Create a new empty connector.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
        }
    }

    /// Number of payloads currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
    }

    /// Total bytes across all stored payloads.
    pub fn total_bytes(&self) -> u64 {
        self.objects
            .read()
            .expect("lock poisoned")
            .values()
            .map(|data| data.len() as u64)
            .sum()
    }

    /// Remove all payloads.
    pub fn clear(&self) {
        self.objects.write().expect("lock poisoned").clear();
    }
}

impl Default for LocalConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for LocalConnector {
    fn put(&self, id: &ObjectId, data: &[u8]) -> ConnectorResult<()> {
        let mut map = self.objects.write().expect("lock poisoned");
        map.insert(*id, data.to_vec());
        Ok(())
    }

    fn get(&self, id: &ObjectId) -> ConnectorResult<Vec<u8>> {
        let map = self.objects.read().expect("lock poisoned");
        map.get(id).cloned().ok_or(ConnectorError::NotFound(*id))
    }

    fn evict(&self, id: &ObjectId) -> ConnectorResult<()> {
        let mut map = self.objects.write().expect("lock poisoned");
        map.remove(id);
        Ok(())
    }

    fn exists(&self, id: &ObjectId) -> ConnectorResult<bool> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.contains_key(id))
    }

    fn config(&self) -> ConnectorConfig {
        ConnectorConfig::Local
    }

    fn close(&self) -> ConnectorResult<()> {
        self.clear();
        Ok(())
    }
}

impl std::fmt::Debug for LocalConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalConnector")
            .field("object_count", &self.len())
            .finish()
    }
}
