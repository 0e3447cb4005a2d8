use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use byref_types::Key;

use crate::error::{ResolutionFailed, StoreResult};
use crate::registry::StoreRegistry;

/// Observable resolution state of a proxy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProxyState {
    Unresolved,
    Resolving,
    Resolved,
    Failed,
}

enum ResolutionState<T> {
    Unresolved,
    Resolving,
    Resolved(Arc<T>),
    Failed(ResolutionFailed),
}

struct ProxyInner<T> {
    key: Key,
    state: Mutex<ResolutionState<T>>,
    cond: Condvar,
    /// Live-proxy counter of the minting store, when known. Proxies
    /// deserialized from another process carry no tally.
    tally: Option<Arc<AtomicUsize>>,
}

impl<T> Drop for ProxyInner<T> {
    fn drop(&mut self) {
        if let Some(tally) = &self.tally {
            tally.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// Transferable, lazily-resolving reference to a stored value.
///
/// A proxy carries only a [`Key`]; serializing it transmits the key and
/// nothing else, and a deserialized proxy starts `Unresolved`. The first
/// access fetches the payload through the registry (single-flighted per
/// key), decodes it, and caches the result — after that every access is a
/// cache read, and a failure is equally sticky until [`Proxy::reset`].
///
/// Clones share resolution state within a process, so resolving one clone
/// resolves them all. The resolved value is shared as `Arc<T>`; mutating
/// a resolved copy never writes back through the connector.
///
/// Resolution requires the minting store to be reachable in the resolving
/// process: registered under `key().store()` in the registry passed to
/// [`Proxy::resolve`] (workers typically seed it with
/// [`StoreRegistry::get_or_create`] from a transmitted config).
pub struct Proxy<T> {
    inner: Arc<ProxyInner<T>>,
}

impl<T> Clone for Proxy<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Proxy<T> {
    /// Wrap a key in an unresolved proxy.
    ///
    /// This is how a proxy received from another process (as a bare key)
    /// re-enters the type system.
    pub fn from_key(key: Key) -> Self {
        Self::build(key, ResolutionState::Unresolved, None)
    }

    pub(crate) fn with_tally(key: Key, tally: Arc<AtomicUsize>) -> Self {
        Self::build(key, ResolutionState::Unresolved, Some(tally))
    }

    pub(crate) fn resolved_with_tally(key: Key, value: T, tally: Arc<AtomicUsize>) -> Self {
        Self::build(key, ResolutionState::Resolved(Arc::new(value)), Some(tally))
    }

    fn build(key: Key, state: ResolutionState<T>, tally: Option<Arc<AtomicUsize>>) -> Self {
        if let Some(tally) = &tally {
            tally.fetch_add(1, Ordering::SeqCst);
        }
        Self {
            inner: Arc::new(ProxyInner {
                key,
                state: Mutex::new(state),
                cond: Condvar::new(),
                tally,
            }),
        }
    }

    /// The key this proxy stands in for.
    pub fn key(&self) -> &Key {
        &self.inner.key
    }

    /// Current state of the resolution machine.
    pub fn state(&self) -> ProxyState {
        match &*self.inner.state.lock().expect("lock poisoned") {
            ResolutionState::Unresolved => ProxyState::Unresolved,
            ResolutionState::Resolving => ProxyState::Resolving,
            ResolutionState::Resolved(_) => ProxyState::Resolved,
            ResolutionState::Failed(_) => ProxyState::Failed,
        }
    }

    /// Returns `true` if the value is cached locally.
    pub fn is_resolved(&self) -> bool {
        self.state() == ProxyState::Resolved
    }

    /// The cached value, if resolution already completed. Never blocks
    /// and never triggers a fetch.
    pub fn try_resolved(&self) -> Option<Arc<T>> {
        match &*self.inner.state.lock().expect("lock poisoned") {
            ResolutionState::Resolved(value) => Some(Arc::clone(value)),
            _ => None,
        }
    }

    /// Forget a resolved value, forcing the next access to re-fetch.
    ///
    /// For callers that know the backing object changed. A proxy that is
    /// unresolved, failed, or mid-fetch is left untouched.
    pub fn invalidate(&self) {
        let mut state = self.inner.state.lock().expect("lock poisoned");
        if matches!(*state, ResolutionState::Resolved(_)) {
            *state = ResolutionState::Unresolved;
            debug!(key = %self.inner.key.short(), "proxy invalidated");
        }
    }

    /// Clear a cached failure, permitting another resolution attempt.
    pub fn reset(&self) {
        let mut state = self.inner.state.lock().expect("lock poisoned");
        if matches!(*state, ResolutionState::Failed(_)) {
            *state = ResolutionState::Unresolved;
            debug!(key = %self.inner.key.short(), "proxy failure reset");
        }
    }
}

impl<T: DeserializeOwned> Proxy<T> {
    /// Resolve the proxy, blocking until the value is available.
    ///
    /// Exactly one thread performs the fetch regardless of how many block
    /// here; the rest attach and receive the shared result. A cached
    /// failure is re-raised without touching the connector.
    pub fn resolve(&self, registry: &StoreRegistry) -> StoreResult<Arc<T>> {
        {
            let mut state = self.inner.state.lock().expect("lock poisoned");
            loop {
                match &*state {
                    ResolutionState::Resolved(value) => return Ok(Arc::clone(value)),
                    ResolutionState::Failed(failed) => return Err(failed.clone().into()),
                    ResolutionState::Resolving => {
                        state = self.inner.cond.wait(state).expect("lock poisoned");
                    }
                    ResolutionState::Unresolved => {
                        *state = ResolutionState::Resolving;
                        break;
                    }
                }
            }
        }
        // This thread owns the fetch; the lock is not held across it.
        let outcome = self.fetch(registry);
        self.publish(outcome)
    }

    fn fetch(&self, registry: &StoreRegistry) -> Result<T, ResolutionFailed> {
        let key = &self.inner.key;
        let store = registry.get(key.store()).ok_or_else(|| ResolutionFailed {
            key: key.clone(),
            reason: format!("no store registered under {:?}", key.store()),
            not_found: false,
        })?;
        let bytes = registry.resolver().fetch(&store, key)?;
        store
            .serializer()
            .from_bytes::<T>(&bytes)
            .map_err(|e| ResolutionFailed::from_store_error(key.clone(), &e))
    }

    fn publish(&self, outcome: Result<T, ResolutionFailed>) -> StoreResult<Arc<T>> {
        let mut state = self.inner.state.lock().expect("lock poisoned");
        let result = match outcome {
            Ok(value) => {
                let value = Arc::new(value);
                *state = ResolutionState::Resolved(Arc::clone(&value));
                debug!(key = %self.inner.key.short(), "proxy resolved");
                Ok(value)
            }
            Err(failed) => {
                *state = ResolutionState::Failed(failed.clone());
                debug!(key = %self.inner.key.short(), reason = %failed.reason, "proxy resolution failed");
                Err(failed.into())
            }
        };
        drop(state);
        self.inner.cond.notify_all();
        result
    }
}

impl<T: DeserializeOwned + Send + Sync + 'static> Proxy<T> {
    /// Begin resolving in the background and return immediately.
    ///
    /// Overlaps transfer latency with other work: issue the prefetch as
    /// soon as the proxy arrives, keep computing, and the later
    /// [`Proxy::resolve`] (or [`ResolveHandle::wait`]) finds the value
    /// already cached or the fetch already in flight. If the proxy is
    /// settled or a fetch is already running, nothing new is started.
    ///
    /// The handle may be dropped freely — the fetch itself is not tied to
    /// it.
    pub fn resolve_async(&self, registry: &Arc<StoreRegistry>) -> ResolveHandle<T> {
        let start_fetch = {
            let mut state = self.inner.state.lock().expect("lock poisoned");
            if matches!(*state, ResolutionState::Unresolved) {
                *state = ResolutionState::Resolving;
                true
            } else {
                false
            }
        };

        if start_fetch {
            let proxy = self.clone();
            let registry = Arc::clone(registry);
            std::thread::spawn(move || {
                let outcome = proxy.fetch(&registry);
                // The result is published whether or not anyone is
                // waiting; an unclaimed success also warmed the store's
                // byte cache.
                let _ = proxy.publish(outcome);
            });
            debug!(key = %self.inner.key.short(), "background resolution started");
        }

        ResolveHandle {
            proxy: self.clone(),
            registry: Arc::clone(registry),
        }
    }
}

impl<T> std::fmt::Debug for Proxy<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Proxy")
            .field("key", &self.inner.key)
            .field("state", &self.state())
            .finish()
    }
}

/// A proxy serializes as its key alone; payloads never ride along.
impl<T> Serialize for Proxy<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.inner.key.serialize(serializer)
    }
}

/// A deserialized proxy is always `Unresolved` in its new process.
impl<'de, T> Deserialize<'de> for Proxy<T> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self::from_key(Key::deserialize(deserializer)?))
    }
}

/// Handle returned by [`Proxy::resolve_async`].
///
/// Waiting is optional; the background fetch completes either way.
pub struct ResolveHandle<T> {
    proxy: Proxy<T>,
    registry: Arc<StoreRegistry>,
}

impl<T: DeserializeOwned> ResolveHandle<T> {
    /// Block until the background resolution settles and return its
    /// outcome.
    pub fn wait(self) -> StoreResult<Arc<T>> {
        self.proxy.resolve(&self.registry)
    }

    /// Returns `true` once the proxy has settled (resolved or failed).
    pub fn is_done(&self) -> bool {
        matches!(
            self.proxy.state(),
            ProxyState::Resolved | ProxyState::Failed
        )
    }
}

/// Either a plain value or a proxy standing in for one.
///
/// Task bodies declare this when they accept both forms: small arguments
/// arrive inline as `Value`, large ones as `Proxy` (the submission
/// boundary decides). Serialization is as cheap as whichever side is
/// present.
#[derive(Serialize, Deserialize)]
pub enum MaybeProxy<T> {
    Value(T),
    Proxy(Proxy<T>),
}

impl<T> MaybeProxy<T> {
    /// Returns `true` if a proxy is being carried.
    pub fn is_proxy(&self) -> bool {
        matches!(self, Self::Proxy(_))
    }

    /// The carried proxy, if any.
    pub fn as_proxy(&self) -> Option<&Proxy<T>> {
        match self {
            Self::Proxy(proxy) => Some(proxy),
            Self::Value(_) => None,
        }
    }
}

impl<T: DeserializeOwned + Clone> MaybeProxy<T> {
    /// Produce the underlying value, resolving through the registry when
    /// a proxy is carried.
    pub fn into_value(self, registry: &StoreRegistry) -> StoreResult<T> {
        match self {
            Self::Value(value) => Ok(value),
            Self::Proxy(proxy) => proxy.resolve(registry).map(|arc| (*arc).clone()),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for MaybeProxy<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Proxy(proxy) => f.debug_tuple("Proxy").field(&proxy.key()).finish(),
        }
    }
}
