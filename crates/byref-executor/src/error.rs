use byref_store::StoreError;

/// Errors from submitting work to an executor.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// The executor has been shut down and accepts no more work.
    #[error("executor is shut down")]
    Shutdown,

    /// Store failure while preparing a submission (serializing or
    /// proxying an argument).
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result alias for executor operations.
pub type ExecutorResult<T> = Result<T, ExecutorError>;

/// Failure of a submitted task, observed through its future.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// The task body panicked; the payload's message is preserved.
    #[error("task panicked: {0}")]
    Panicked(String),

    /// The adapter could not resolve a proxied argument before invoking
    /// the task body.
    #[error("failed to resolve task argument: {0}")]
    ArgumentResolution(#[from] StoreError),
}
