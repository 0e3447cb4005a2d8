//! Task submission boundary for byref.
//!
//! [`StoreExecutor`] wraps any [`TaskExecutor`] and intercepts call
//! arguments on their way in: arguments matching a [`ShouldProxy`] policy
//! are written to a store and replaced by lightweight proxies, so the
//! task message stays small no matter how large the data is. On the
//! worker side the task body either accepts a
//! [`MaybeProxy`](byref_store::MaybeProxy) and decides for itself, or
//! declares the plain parameter and lets the adapter resolve eagerly.
//!
//! [`LocalExecutor`] is a thread-pool implementation of the executor
//! contract for same-process pipelines and tests; distributed executors
//! satisfy the same trait by shipping the serialized argument (value or
//! proxy — both are plain serde data) to their workers.

pub mod adapter;
pub mod error;
pub mod future;
pub mod policy;
pub mod pool;

pub use adapter::StoreExecutor;
pub use error::{ExecutorError, ExecutorResult, TaskError};
pub use future::{as_completed, AsCompleted, TaskFuture};
pub use policy::{ArgInfo, ProxyAlways, ProxyMinSize, ProxyNever, ProxyTypeName, ShouldProxy};
pub use pool::{Job, LocalExecutor, TaskExecutor};
