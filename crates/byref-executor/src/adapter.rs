use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use byref_store::{MaybeProxy, Store, StoreRegistry, StoreResult};

use crate::error::{ExecutorResult, TaskError};
use crate::future::TaskFuture;
use crate::policy::{ArgInfo, ShouldProxy};
use crate::pool::TaskExecutor;

/// Submission boundary that substitutes eligible task arguments with
/// proxies before handing work to an executor.
///
/// Every submitted argument is serialized once and measured against the
/// configured [`ShouldProxy`] policy: eligible arguments are written to
/// the store and replaced by a [`MaybeProxy::Proxy`]; the rest pass
/// through inline as [`MaybeProxy::Value`]. Task bodies that accept
/// [`MaybeProxy`] receive whichever form was transmitted; bodies that
/// want the plain value use [`StoreExecutor::submit_resolved`] and the
/// adapter resolves eagerly on the worker.
///
/// Proxies inside task *results* are left untouched: the caller resolves
/// them lazily, or eagerly via [`MaybeProxy::into_value`].
pub struct StoreExecutor<E: TaskExecutor> {
    executor: E,
    store: Arc<Store>,
    registry: Arc<StoreRegistry>,
    policy: Box<dyn ShouldProxy>,
}

impl<E: TaskExecutor> StoreExecutor<E> {
    /// Wrap an executor, registering the store so that workers in this
    /// process can resolve the proxies it mints.
    pub fn new(
        executor: E,
        store: Arc<Store>,
        registry: Arc<StoreRegistry>,
        policy: Box<dyn ShouldProxy>,
    ) -> StoreResult<Self> {
        let store = registry.register(store, true)?;
        info!(store = store.name(), "store executor created");
        Ok(Self {
            executor,
            store,
            registry,
            policy,
        })
    }

    /// The store backing proxied arguments.
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// The registry workers resolve through.
    pub fn registry(&self) -> &Arc<StoreRegistry> {
        &self.registry
    }

    /// Submit a task whose body accepts either form of its argument.
    pub fn submit<A, R, F>(&self, func: F, arg: A) -> ExecutorResult<TaskFuture<R>>
    where
        A: Serialize + DeserializeOwned + Send + Sync + 'static,
        R: Send + 'static,
        F: FnOnce(MaybeProxy<A>) -> R + Send + 'static,
    {
        let arg = self.prepare(arg)?;
        self.spawn_job(move || Ok(func(arg)))
    }

    /// Submit a task whose body takes the plain value; a proxied
    /// argument is resolved on the worker before the body runs.
    pub fn submit_resolved<A, R, F>(&self, func: F, arg: A) -> ExecutorResult<TaskFuture<R>>
    where
        A: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
        R: Send + 'static,
        F: FnOnce(A) -> R + Send + 'static,
    {
        let arg = self.prepare(arg)?;
        let registry = Arc::clone(&self.registry);
        self.spawn_job(move || {
            let value = arg.into_value(&registry)?;
            Ok(func(value))
        })
    }

    /// Shut the executor down and close the store through the registry
    /// (non-strict: live proxies are logged, not fatal).
    pub fn close(&self) -> StoreResult<()> {
        self.executor.shutdown();
        self.registry.close_store(self.store.name(), false)
    }

    /// Serialize and measure an argument, proxying it if the policy says
    /// so.
    fn prepare<A>(&self, arg: A) -> ExecutorResult<MaybeProxy<A>>
    where
        A: Serialize + DeserializeOwned,
    {
        let bytes = self.store.serializer().to_bytes(&arg)?;
        let info = ArgInfo {
            type_name: std::any::type_name::<A>(),
            serialized_len: bytes.len(),
        };
        if self.policy.should_proxy(&info) {
            let proxy = self.store.proxy_bytes(bytes)?;
            debug!(
                store = self.store.name(),
                arg_type = info.type_name,
                serialized_len = info.serialized_len,
                "argument proxied"
            );
            Ok(MaybeProxy::Proxy(proxy))
        } else {
            Ok(MaybeProxy::Value(arg))
        }
    }

    fn spawn_job<R, F>(&self, job: F) -> ExecutorResult<TaskFuture<R>>
    where
        R: Send + 'static,
        F: FnOnce() -> Result<R, TaskError> + Send + 'static,
    {
        let (future, slot) = TaskFuture::channel();
        self.executor.spawn(Box::new(move || {
            let outcome = match catch_unwind(AssertUnwindSafe(job)) {
                Ok(result) => result,
                Err(panic) => Err(TaskError::Panicked(panic_message(&panic))),
            };
            slot.complete(outcome);
        }))?;
        Ok(future)
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::future::as_completed;
    use crate::policy::{ProxyMinSize, ProxyNever};
    use crate::pool::LocalExecutor;
    use byref_connector::LocalConnector;
    use byref_store::StoreError;

    fn setup(policy: Box<dyn ShouldProxy>) -> StoreExecutor<LocalExecutor> {
        let registry = Arc::new(StoreRegistry::new());
        let store = Arc::new(Store::new("exec", Box::new(LocalConnector::new())));
        StoreExecutor::new(LocalExecutor::new(2), store, registry, policy).unwrap()
    }

    #[test]
    fn small_argument_passes_inline() {
        let executor = setup(Box::new(ProxyMinSize(1024)));
        let payload = vec![1u8; 10];

        let future = executor
            .submit(|arg: MaybeProxy<Vec<u8>>| arg.is_proxy(), payload)
            .unwrap();
        assert!(!future.result().unwrap());
    }

    #[test]
    fn large_argument_arrives_as_proxy() {
        let executor = setup(Box::new(ProxyMinSize(1024)));
        let registry = Arc::clone(executor.registry());
        let payload = vec![7u8; 10_000];

        let future = executor
            .submit(
                move |arg: MaybeProxy<Vec<u8>>| {
                    // The task observes the transmitted form, then reads
                    // through it.
                    let was_proxy = arg.is_proxy();
                    let value = arg.into_value(&registry).unwrap();
                    (was_proxy, value.len())
                },
                payload,
            )
            .unwrap();

        let (was_proxy, len) = future.result().unwrap();
        assert!(was_proxy);
        assert_eq!(len, 10_000);
    }

    #[test]
    fn submit_resolved_hands_the_plain_value_over() {
        let executor = setup(Box::new(ProxyMinSize(64)));
        let payload: Vec<u64> = (0..256).collect();

        let future = executor
            .submit_resolved(|data: Vec<u64>| data.iter().sum::<u64>(), payload.clone())
            .unwrap();
        assert_eq!(future.result().unwrap(), payload.iter().sum::<u64>());
    }

    #[test]
    fn task_panic_surfaces_in_result() {
        let executor = setup(Box::new(ProxyNever));
        let future = executor
            .submit(
                |_arg: MaybeProxy<u8>| -> u8 { panic!("task exploded") },
                1u8,
            )
            .unwrap();
        match future.result() {
            Err(TaskError::Panicked(message)) => assert!(message.contains("task exploded")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn evicted_argument_fails_eager_resolution() {
        use byref_store::Serializer;
        use byref_types::{Key, KeyPolicy, ObjectId};

        // Content-hash keys make the argument's key predictable, so the
        // test can evict it out from under the worker.
        let registry = Arc::new(StoreRegistry::new());
        let store = Arc::new(Store::with_options(
            "exec",
            Box::new(LocalConnector::new()),
            Serializer::default(),
            KeyPolicy::ContentHash,
            0,
        ));
        let executor = StoreExecutor::new(
            LocalExecutor::new(1),
            Arc::clone(&store),
            registry,
            Box::new(ProxyMinSize(0)),
        )
        .unwrap();

        // Occupy the single worker so the eviction wins the race.
        let blocker = executor
            .submit(
                |_arg: MaybeProxy<u8>| std::thread::sleep(std::time::Duration::from_millis(100)),
                0u8,
            )
            .unwrap();

        let payload = vec![1u8; 32];
        let bytes = store.serializer().to_bytes(&payload).unwrap();
        let future = executor
            .submit_resolved(|data: Vec<u8>| data.len(), payload)
            .unwrap();

        // The payload was put exactly once, so one evict releases it.
        let key = Key::new("exec", ObjectId::of_content(&bytes));
        store.evict(&key).unwrap();

        blocker.result().unwrap();
        match future.result() {
            Err(TaskError::ArgumentResolution(err)) => assert!(err.is_not_found()),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn result_proxies_stay_lazy_for_the_caller() {
        let executor = setup(Box::new(ProxyNever));
        let registry = Arc::clone(executor.registry());
        let store = Arc::clone(executor.store());

        let future = executor
            .submit(
                move |_arg: MaybeProxy<u8>| {
                    // Task produces a large output and returns a proxy to
                    // it instead of the bytes.
                    let output = vec![9u8; 4096];
                    MaybeProxy::Proxy(store.proxy(&output).unwrap())
                },
                0u8,
            )
            .unwrap();

        let result: MaybeProxy<Vec<u8>> = future.result().unwrap();
        assert!(result.is_proxy());
        let value = result.into_value(&registry).unwrap();
        assert_eq!(value, vec![9u8; 4096]);
    }

    #[test]
    fn bag_of_tasks_completes_out_of_order() {
        let executor = setup(Box::new(ProxyNever));
        let futures: Vec<_> = (0..4u64)
            .map(|i| {
                executor
                    .submit(
                        move |_arg: MaybeProxy<u8>| {
                            // Later submissions sleep less, finishing first.
                            std::thread::sleep(std::time::Duration::from_millis(40 - i * 10));
                            i
                        },
                        0u8,
                    )
                    .unwrap()
            })
            .collect();

        let done: Vec<u64> = as_completed(futures)
            .map(|f| f.result().unwrap())
            .collect();
        assert_eq!(done.len(), 4);
        // With two workers the earliest submissions start first but the
        // shortest tasks finish first within each worker.
        assert!(done.contains(&0) && done.contains(&3));
    }

    #[test]
    fn close_shuts_executor_and_store() {
        let executor = setup(Box::new(ProxyNever));
        let store = Arc::clone(executor.store());
        executor.close().unwrap();
        assert!(store.is_closed());
        assert!(executor.registry().get("exec").is_none());

        let err = executor.submit(|_arg: MaybeProxy<u8>| 0u8, 1u8).unwrap_err();
        assert!(matches!(
            err,
            crate::error::ExecutorError::Shutdown | crate::error::ExecutorError::Store(_)
        ));
    }

    #[test]
    fn submit_after_close_reports_closed_store_or_shutdown() {
        let executor = setup(Box::new(ProxyMinSize(0)));
        executor.close().unwrap();
        // With an always-proxy policy the store is touched first and is
        // already closed.
        match executor.submit(|_arg: MaybeProxy<Vec<u8>>| 0u8, vec![1u8; 8]) {
            Err(crate::error::ExecutorError::Store(StoreError::Closed(_)))
            | Err(crate::error::ExecutorError::Shutdown) => {}
            other => panic!("unexpected outcome: {:?}", other.map(|_| ())),
        }
    }
}
