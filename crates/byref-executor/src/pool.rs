use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tracing::{debug, info};

use crate::error::{ExecutorError, ExecutorResult};

/// A queued unit of work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Contract the submission boundary expects from a task executor.
///
/// Scheduling policy and transport are the executor's business; byref
/// only needs somewhere to run closures and a way to stop accepting
/// them. Implementations must be safe to share across threads.
pub trait TaskExecutor: Send + Sync {
    /// Queue a job for execution.
    fn spawn(&self, job: Job) -> ExecutorResult<()>;

    /// Stop accepting work and wait for queued jobs to finish.
    fn shutdown(&self);
}

/// Thread-pool executor for same-process pipelines and tests.
///
/// Workers pull jobs off a shared channel; `shutdown` closes the channel,
/// lets the workers drain what is already queued, and joins them.
pub struct LocalExecutor {
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl LocalExecutor {
    /// Start a pool with the given number of worker threads (minimum 1).
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));

        let handles: Vec<JoinHandle<()>> = (0..workers)
            .map(|worker_id| {
                let receiver = Arc::clone(&receiver);
                std::thread::spawn(move || loop {
                    // Hold the receiver lock only while dequeuing, never
                    // while running the job.
                    let job = receiver.lock().expect("lock poisoned").recv();
                    match job {
                        Ok(job) => job(),
                        Err(_) => {
                            debug!(worker_id, "worker exiting: queue closed");
                            break;
                        }
                    }
                })
            })
            .collect();

        info!(workers, "local executor started");
        Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(handles),
        }
    }

    /// Returns `true` once [`TaskExecutor::shutdown`] has run.
    pub fn is_shut_down(&self) -> bool {
        self.sender.lock().expect("lock poisoned").is_none()
    }
}

impl TaskExecutor for LocalExecutor {
    fn spawn(&self, job: Job) -> ExecutorResult<()> {
        let guard = self.sender.lock().expect("lock poisoned");
        match guard.as_ref() {
            Some(sender) => sender.send(job).map_err(|_| ExecutorError::Shutdown),
            None => Err(ExecutorError::Shutdown),
        }
    }

    fn shutdown(&self) {
        // Dropping the sender closes the queue; workers finish what is
        // already queued and exit.
        *self.sender.lock().expect("lock poisoned") = None;
        let handles: Vec<JoinHandle<()>> =
            self.workers.lock().expect("lock poisoned").drain(..).collect();
        for handle in handles {
            let _ = handle.join();
        }
    }
}

impl Drop for LocalExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}
