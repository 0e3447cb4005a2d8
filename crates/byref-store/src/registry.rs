use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::resolver::Resolver;
use crate::store::{Store, StoreConfig};

/// Explicit, lifecycle-scoped mapping from store name to store instance.
///
/// One registry typically lives for the duration of a process (or a test
/// case — tests construct isolated registries instead of sharing global
/// state). A proxy deserialized anywhere in the process resolves by
/// looking its store up here by name; worker processes seed the registry
/// from a [`StoreConfig`] received with their first task.
///
/// The internal mutex guards only table operations and is never held
/// across connector I/O.
pub struct StoreRegistry {
    stores: Mutex<HashMap<String, Arc<Store>>>,
    resolver: Resolver,
}

impl StoreRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            stores: Mutex::new(HashMap::new()),
            resolver: Resolver::new(),
        }
    }

    /// Register a store under its name.
    ///
    /// With `exist_ok`, a name collision returns the already-registered
    /// instance (the caller's store is left untouched); without it, the
    /// collision is [`StoreError::DuplicateStore`].
    pub fn register(&self, store: Arc<Store>, exist_ok: bool) -> StoreResult<Arc<Store>> {
        let mut stores = self.stores.lock().expect("lock poisoned");
        if let Some(existing) = stores.get(store.name()) {
            if exist_ok {
                debug!(store = store.name(), "register reused existing store");
                return Ok(Arc::clone(existing));
            }
            return Err(StoreError::DuplicateStore(store.name().to_string()));
        }
        info!(store = store.name(), "store registered");
        stores.insert(store.name().to_string(), Arc::clone(&store));
        Ok(store)
    }

    /// Look up a store by name.
    pub fn get(&self, name: &str) -> Option<Arc<Store>> {
        self.stores.lock().expect("lock poisoned").get(name).cloned()
    }

    /// Look up a store by name, lazily building and registering it from
    /// the given configuration on a miss.
    ///
    /// This is the worker-side bootstrap: the first task carries the
    /// store config, and every proxy resolved afterwards finds the store
    /// already in place.
    pub fn get_or_create(&self, config: StoreConfig) -> StoreResult<Arc<Store>> {
        if let Some(store) = self.get(&config.name) {
            return Ok(store);
        }
        // Built outside the lock: opening a connector may perform I/O.
        let built = Arc::new(Store::from_config(config)?);
        let registered = self.register(Arc::clone(&built), true)?;
        if !Arc::ptr_eq(&built, &registered) {
            // Lost a race with another thread; release our duplicate.
            debug!(store = built.name(), "discarding duplicate store from racing construction");
            if let Err(e) = built.close() {
                warn!(store = built.name(), error = %e, "failed to close duplicate store");
            }
        }
        Ok(registered)
    }

    /// Remove a store from the registry without closing it.
    pub fn unregister(&self, name: &str) -> Option<Arc<Store>> {
        let removed = self.stores.lock().expect("lock poisoned").remove(name);
        if removed.is_some() {
            info!(store = name, "store unregistered");
        }
        removed
    }

    /// Close a store and clear its registry entry.
    ///
    /// `strict` refuses to close while proxies minted by the store are
    /// still alive in this process; the default mode logs and proceeds.
    pub fn close_store(&self, name: &str, strict: bool) -> StoreResult<()> {
        let store = self
            .get(name)
            .ok_or_else(|| StoreError::UnknownStore(name.to_string()))?;
        if strict {
            store.close_strict()?;
        } else {
            store.close()?;
        }
        self.unregister(name);
        Ok(())
    }

    /// Close every registered store and clear the registry.
    ///
    /// Failures are logged and do not stop the teardown.
    pub fn close_all(&self) {
        let drained: Vec<Arc<Store>> = {
            let mut stores = self.stores.lock().expect("lock poisoned");
            stores.drain().map(|(_, store)| store).collect()
        };
        for store in drained {
            if let Err(e) = store.close() {
                warn!(store = store.name(), error = %e, "failed to close store during teardown");
            }
        }
    }

    /// Names of all registered stores, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .stores
            .lock()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Number of registered stores.
    pub fn len(&self) -> usize {
        self.stores.lock().expect("lock poisoned").len()
    }

    /// Returns `true` if no store is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The registry-scoped single-flight fetch table.
    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }
}

impl Default for StoreRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StoreRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreRegistry")
            .field("stores", &self.names())
            .finish()
    }
}
