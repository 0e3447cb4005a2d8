//! Store orchestration for byref.
//!
//! A [`Store`] binds a connector, a serializer, and a key policy under a
//! name; the [`StoreRegistry`] maps names to stores for the lifetime of a
//! process (or a test). A [`Proxy`] is a transferable reference to a
//! stored value that resolves itself on first access — consumers hand
//! proxies around like values and pay the transfer cost only where the
//! value is actually read.
//!
//! # Data Flow
//!
//! 1. `store.put(&value)` serializes the value and writes it through the
//!    connector, returning a [`Key`](byref_types::Key).
//! 2. `store.proxy(&value)` wraps that key in an `Unresolved` [`Proxy`],
//!    which travels to another process as nothing but the key.
//! 3. The receiving process looks the store up in its [`StoreRegistry`]
//!    (seeding it from a [`StoreConfig`] if needed) and resolves; the
//!    registry's [`Resolver`] single-flights concurrent fetches per key.
//! 4. `store.evict(&key)` releases the backing bytes when the pipeline is
//!    done with them.
//!
//! # Design Rules
//!
//! 1. A proxy carries identity, never data; resolved values are cached
//!    per process and never written back.
//! 2. Registry state is explicit and lifecycle-scoped — no globals.
//! 3. The registry lock is never held across connector I/O.
//! 4. Resolution failures are cached on the proxy and re-raised verbatim;
//!    retrying transient transport failures is the connector's job.

pub mod cache;
pub mod error;
pub mod proxy;
pub mod registry;
pub mod resolver;
pub mod serializer;
pub mod stats;
pub mod store;

pub use cache::LruCache;
pub use error::{ResolutionFailed, StoreError, StoreResult};
pub use proxy::{MaybeProxy, Proxy, ProxyState, ResolveHandle};
pub use registry::StoreRegistry;
pub use resolver::Resolver;
pub use serializer::Serializer;
pub use stats::{StatsSnapshot, StoreStats};
pub use store::{Store, StoreConfig, DEFAULT_CACHE_CAPACITY};
