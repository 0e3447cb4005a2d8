use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use byref_connector::{Connector, ConnectorConfig, ConnectorError};
use byref_types::{Key, KeyPolicy, ObjectId};

use crate::cache::LruCache;
use crate::error::{StoreError, StoreResult};
use crate::proxy::Proxy;
use crate::serializer::Serializer;
use crate::stats::{StatsSnapshot, StoreStats};

/// Default local byte cache capacity, in entries.
pub const DEFAULT_CACHE_CAPACITY: usize = 16;

/// Everything a process needs to build a store equivalent to one running
/// elsewhere: the name, the connector configuration, and the codec/key
/// settings that must agree across processes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub name: String,
    pub connector: ConnectorConfig,
    pub serializer: Serializer,
    pub key_policy: KeyPolicy,
    pub cache_capacity: usize,
}

/// A named object store binding a connector, a serializer, and a key
/// policy.
///
/// The store owns the bytes it has written until they are evicted; keys
/// it mints are tagged with its name, and operations on keys minted by a
/// different store fail with [`StoreError::ForeignKey`]. All operations
/// are safe for concurrent use; cross-process coordination happens
/// entirely through the connector's backing medium.
pub struct Store {
    name: String,
    connector: Box<dyn Connector>,
    serializer: Serializer,
    key_policy: KeyPolicy,
    cache: LruCache,
    stats: StoreStats,
    closed: AtomicBool,
    live_proxies: Arc<AtomicUsize>,
    /// Reference counts per object id, used only under
    /// [`KeyPolicy::ContentHash`] where identical payloads share an id.
    refcounts: Mutex<HashMap<ObjectId, usize>>,
}

impl Store {
    /// Create a store with default serializer, key policy, and cache.
    pub fn new(name: impl Into<String>, connector: Box<dyn Connector>) -> Self {
        Self::with_options(
            name,
            connector,
            Serializer::default(),
            KeyPolicy::default(),
            DEFAULT_CACHE_CAPACITY,
        )
    }

    /// Create a store with explicit codec and key settings.
    pub fn with_options(
        name: impl Into<String>,
        connector: Box<dyn Connector>,
        serializer: Serializer,
        key_policy: KeyPolicy,
        cache_capacity: usize,
    ) -> Self {
        let name = name.into();
        info!(
            store = %name,
            connector = connector.config().kind(),
            serializer = serializer.name(),
            "store created"
        );
        Self {
            name,
            connector,
            serializer,
            key_policy,
            cache: LruCache::new(cache_capacity),
            stats: StoreStats::default(),
            closed: AtomicBool::new(false),
            live_proxies: Arc::new(AtomicUsize::new(0)),
            refcounts: Mutex::new(HashMap::new()),
        }
    }

    /// Rebuild a store from a configuration produced by [`Store::config`]
    /// in another process.
    pub fn from_config(config: StoreConfig) -> StoreResult<Self> {
        let connector = config.connector.connect()?;
        Ok(Self::with_options(
            config.name,
            connector,
            config.serializer,
            config.key_policy,
            config.cache_capacity,
        ))
    }

    /// Configuration sufficient to rebuild an equivalent store elsewhere.
    pub fn config(&self) -> StoreConfig {
        StoreConfig {
            name: self.name.clone(),
            connector: self.connector.config(),
            serializer: self.serializer,
            key_policy: self.key_policy,
            cache_capacity: self.cache.capacity(),
        }
    }

    /// Name under which this store registers.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The payload codec this store writes with.
    pub fn serializer(&self) -> Serializer {
        self.serializer
    }

    /// Point-in-time operation counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Number of proxies minted by this store that are still alive in
    /// this process. Proxies deserialized from elsewhere are not tracked.
    pub fn live_proxies(&self) -> usize {
        self.live_proxies.load(Ordering::SeqCst)
    }

    /// Returns `true` once the store has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.is_closed() {
            return Err(StoreError::Closed(self.name.clone()));
        }
        Ok(())
    }

    fn check_ownership(&self, key: &Key) -> StoreResult<()> {
        if key.store() != self.name {
            return Err(StoreError::ForeignKey {
                key: key.clone(),
                store: self.name.clone(),
            });
        }
        Ok(())
    }

    /// Serialize a value and store it, returning the key that names it.
    pub fn put<T: Serialize + ?Sized>(&self, value: &T) -> StoreResult<Key> {
        let bytes = self.serializer.to_bytes(value)?;
        self.put_bytes(bytes)
    }

    /// Store an already-serialized payload.
    ///
    /// The submission boundary uses this to avoid encoding a payload
    /// twice after measuring it against a proxying policy.
    pub fn put_bytes(&self, bytes: Vec<u8>) -> StoreResult<Key> {
        self.ensure_open()?;
        let id = self.key_policy.object_id(&bytes);

        if self.key_policy.deduplicates() {
            let mut counts = self.refcounts.lock().expect("lock poisoned");
            if let Some(count) = counts.get_mut(&id) {
                *count += 1;
                self.stats.record_dedup_hit();
                self.stats.record_put();
                debug!(store = %self.name, id = %id.short_hex(), refs = *count, "dedup put");
                return Ok(Key::new(&self.name, id));
            }
        }

        // The refcount lock is not held across connector I/O. Two threads
        // racing the same content both write (idempotent: same id, same
        // bytes) and both count their reference below.
        self.connector.put(&id, &bytes)?;
        if self.key_policy.deduplicates() {
            let mut counts = self.refcounts.lock().expect("lock poisoned");
            *counts.entry(id).or_insert(0) += 1;
        }
        self.cache.insert(id, bytes);
        self.stats.record_put();
        debug!(store = %self.name, id = %id.short_hex(), "put");
        Ok(Key::new(&self.name, id))
    }

    /// Read the raw payload behind a key: local cache first, then the
    /// connector.
    pub fn get_bytes(&self, key: &Key) -> StoreResult<Vec<u8>> {
        self.ensure_open()?;
        self.check_ownership(key)?;
        self.stats.record_get();

        if let Some(bytes) = self.cache.get(key.object()) {
            self.stats.record_cache_hit();
            debug!(store = %self.name, key = %key.short(), "get served from cache");
            return Ok(bytes);
        }
        self.stats.record_cache_miss();

        match self.connector.get(key.object()) {
            Ok(bytes) => {
                self.cache.insert(*key.object(), bytes.clone());
                Ok(bytes)
            }
            Err(ConnectorError::NotFound(_)) => Err(StoreError::KeyNotFound(key.clone())),
            Err(e) => Err(e.into()),
        }
    }

    /// Read and decode the value behind a key.
    pub fn get<T: DeserializeOwned>(&self, key: &Key) -> StoreResult<T> {
        let bytes = self.get_bytes(key)?;
        self.serializer.from_bytes(&bytes)
    }

    /// Check whether a key's payload is still present.
    pub fn exists(&self, key: &Key) -> StoreResult<bool> {
        self.ensure_open()?;
        self.check_ownership(key)?;
        if self.cache.contains(key.object()) {
            return Ok(true);
        }
        Ok(self.connector.exists(key.object())?)
    }

    /// Release the payload behind a key.
    ///
    /// Evicting an absent key is a no-op. Under the content-hash policy
    /// the backing bytes are released only when the last reference to the
    /// id is evicted.
    pub fn evict(&self, key: &Key) -> StoreResult<()> {
        self.ensure_open()?;
        self.check_ownership(key)?;

        if self.key_policy.deduplicates() {
            let mut counts = self.refcounts.lock().expect("lock poisoned");
            match counts.get(key.object()).copied() {
                Some(count) if count > 1 => {
                    counts.insert(*key.object(), count - 1);
                    debug!(store = %self.name, key = %key.short(), refs = count - 1, "evict deferred");
                    return Ok(());
                }
                Some(_) => {
                    counts.remove(key.object());
                }
                None => {}
            }
        }

        self.cache.remove(key.object());
        self.connector.evict(key.object())?;
        self.stats.record_eviction();
        debug!(store = %self.name, key = %key.short(), "evicted");
        Ok(())
    }

    /// Store a value and wrap the resulting key in an unresolved proxy.
    pub fn proxy<T: Serialize>(&self, value: &T) -> StoreResult<Proxy<T>> {
        let key = self.put(value)?;
        Ok(Proxy::with_tally(key, Arc::clone(&self.live_proxies)))
    }

    /// Store an already-serialized payload and wrap its key in an
    /// unresolved proxy.
    ///
    /// `T` declares the type the payload decodes to; the submission
    /// boundary uses this after measuring a payload against its proxying
    /// policy.
    pub fn proxy_bytes<T>(&self, bytes: Vec<u8>) -> StoreResult<Proxy<T>> {
        let key = self.put_bytes(bytes)?;
        Ok(Proxy::with_tally(key, Arc::clone(&self.live_proxies)))
    }

    /// Store a value and return a proxy whose resolved cache is already
    /// populated with it.
    ///
    /// Useful when the creating process will also read through the proxy:
    /// its own accesses never touch the connector.
    pub fn proxy_populated<T: Serialize>(&self, value: T) -> StoreResult<Proxy<T>> {
        let key = self.put(&value)?;
        Ok(Proxy::resolved_with_tally(
            key,
            value,
            Arc::clone(&self.live_proxies),
        ))
    }

    /// Close the store: further operations fail with
    /// [`StoreError::Closed`], and the connector releases its medium.
    ///
    /// Live proxies minted by this store are logged and tolerated; their
    /// next resolution will fail at the closed store. Closing twice is a
    /// no-op.
    pub fn close(&self) -> StoreResult<()> {
        let live = self.live_proxies();
        if live > 0 {
            warn!(store = %self.name, live_proxies = live, "closing store with live proxies");
        }
        self.force_close()
    }

    /// Close the store, failing with [`StoreError::InUse`] if proxies
    /// minted by it are still alive in this process.
    pub fn close_strict(&self) -> StoreResult<()> {
        let live = self.live_proxies();
        if live > 0 {
            return Err(StoreError::InUse {
                name: self.name.clone(),
                proxies: live,
            });
        }
        self.force_close()
    }

    fn force_close(&self) -> StoreResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.cache.clear();
        self.connector.close()?;
        info!(store = %self.name, "store closed");
        Ok(())
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("name", &self.name)
            .field("connector", &self.connector.config().kind())
            .field("serializer", &self.serializer.name())
            .field("closed", &self.is_closed())
            .finish()
    }
}
