use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};

use crate::error::TaskError;

/// Outcome slot shared between a [`TaskFuture`] and the worker that
/// completes it.
pub(crate) struct Slot<R> {
    state: Mutex<SlotState<R>>,
    cond: Condvar,
}

struct SlotState<R> {
    outcome: Option<Result<R, TaskError>>,
    watcher: Option<Watcher>,
}

/// Registration from [`as_completed`]: when the slot completes, its index
/// is pushed onto the shared queue.
struct Watcher {
    queue: Arc<CompletionQueue>,
    index: usize,
}

struct CompletionQueue {
    ready: Mutex<VecDeque<usize>>,
    cond: Condvar,
}

impl CompletionQueue {
    fn new() -> Self {
        Self {
            ready: Mutex::new(VecDeque::new()),
            cond: Condvar::new(),
        }
    }

    fn push(&self, index: usize) {
        self.ready.lock().expect("lock poisoned").push_back(index);
        self.cond.notify_one();
    }

    fn pop_blocking(&self) -> usize {
        let mut ready = self.ready.lock().expect("lock poisoned");
        loop {
            if let Some(index) = ready.pop_front() {
                return index;
            }
            ready = self.cond.wait(ready).expect("lock poisoned");
        }
    }
}

impl<R> Slot<R> {
    /// Complete the slot exactly once and wake everyone interested.
    pub(crate) fn complete(&self, outcome: Result<R, TaskError>) {
        let watcher = {
            let mut state = self.state.lock().expect("lock poisoned");
            debug_assert!(state.outcome.is_none(), "slot completed twice");
            state.outcome = Some(outcome);
            state.watcher.take()
        };
        self.cond.notify_all();
        if let Some(watcher) = watcher {
            watcher.queue.push(watcher.index);
        }
    }

    fn attach_watcher(&self, queue: Arc<CompletionQueue>, index: usize) {
        let already_done = {
            let mut state = self.state.lock().expect("lock poisoned");
            if state.outcome.is_some() {
                true
            } else {
                state.watcher = Some(Watcher {
                    queue: Arc::clone(&queue),
                    index,
                });
                false
            }
        };
        if already_done {
            queue.push(index);
        }
    }
}

/// Blocking handle to the result of a submitted task.
///
/// The worker completes the shared slot exactly once; `result` blocks
/// until then. A panicking task surfaces as [`TaskError::Panicked`] here,
/// in whichever thread ultimately asks for the result.
pub struct TaskFuture<R> {
    slot: Arc<Slot<R>>,
}

impl<R> TaskFuture<R> {
    /// Create a future and the slot its worker will complete.
    pub(crate) fn channel() -> (Self, Arc<Slot<R>>) {
        let slot = Arc::new(Slot {
            state: Mutex::new(SlotState {
                outcome: None,
                watcher: None,
            }),
            cond: Condvar::new(),
        });
        (
            Self {
                slot: Arc::clone(&slot),
            },
            slot,
        )
    }

    /// Returns `true` once the task has completed.
    pub fn is_done(&self) -> bool {
        self.slot
            .state
            .lock()
            .expect("lock poisoned")
            .outcome
            .is_some()
    }

    /// Block until the task completes and return its outcome.
    pub fn result(self) -> Result<R, TaskError> {
        let mut state = self.slot.state.lock().expect("lock poisoned");
        loop {
            if let Some(outcome) = state.outcome.take() {
                return outcome;
            }
            state = self.slot.cond.wait(state).expect("lock poisoned");
        }
    }
}

impl<R> std::fmt::Debug for TaskFuture<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskFuture")
            .field("done", &self.is_done())
            .finish()
    }
}

/// Iterate over futures in the order they complete, not the order they
/// were submitted.
///
/// Blocks in `next` until some remaining future completes; yields each
/// future exactly once.
pub fn as_completed<R>(futures: Vec<TaskFuture<R>>) -> AsCompleted<R> {
    let queue = Arc::new(CompletionQueue::new());
    for (index, future) in futures.iter().enumerate() {
        future.slot.attach_watcher(Arc::clone(&queue), index);
    }
    let remaining = futures.len();
    AsCompleted {
        futures: futures.into_iter().map(Some).collect(),
        queue,
        remaining,
    }
}

/// Iterator returned by [`as_completed`].
pub struct AsCompleted<R> {
    futures: Vec<Option<TaskFuture<R>>>,
    queue: Arc<CompletionQueue>,
    remaining: usize,
}

impl<R> Iterator for AsCompleted<R> {
    type Item = TaskFuture<R>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.remaining > 0 {
            let index = self.queue.pop_blocking();
            self.remaining -= 1;
            if let Some(future) = self.futures[index].take() {
                return Some(future);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn result_blocks_until_completion() {
        let (future, slot) = TaskFuture::channel();
        assert!(!future.is_done());

        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            slot.complete(Ok(99));
        });

        assert_eq!(future.result().unwrap(), 99);
    }

    #[test]
    fn completed_before_wait() {
        let (future, slot) = TaskFuture::channel();
        slot.complete(Ok("done"));
        assert!(future.is_done());
        assert_eq!(future.result().unwrap(), "done");
    }

    #[test]
    fn error_outcome_propagates() {
        let (future, slot) = TaskFuture::<()>::channel();
        slot.complete(Err(TaskError::Panicked("boom".into())));
        assert!(matches!(future.result(), Err(TaskError::Panicked(_))));
    }

    #[test]
    fn as_completed_yields_in_completion_order() {
        let mut futures = Vec::new();
        let mut slots = Vec::new();
        for _ in 0..3 {
            let (future, slot) = TaskFuture::channel();
            futures.push(future);
            slots.push(slot);
        }

        // Attach the completion watchers before anything finishes, then
        // complete in reverse submission order.
        let iter = as_completed(futures);
        let completer = thread::spawn(move || {
            for (i, slot) in slots.into_iter().enumerate().rev() {
                slot.complete(Ok(i));
                thread::sleep(Duration::from_millis(5));
            }
        });

        let order: Vec<usize> = iter.map(|f| f.result().unwrap()).collect();
        completer.join().unwrap();
        assert_eq!(order, vec![2, 1, 0]);
    }

    #[test]
    fn as_completed_with_already_done_futures() {
        let (f1, s1) = TaskFuture::channel();
        let (f2, s2) = TaskFuture::channel();
        s1.complete(Ok(1));
        s2.complete(Ok(2));

        let collected: Vec<i32> = as_completed(vec![f1, f2])
            .map(|f| f.result().unwrap())
            .collect();
        assert_eq!(collected.len(), 2);
        assert!(collected.contains(&1) && collected.contains(&2));
    }

    #[test]
    fn as_completed_empty() {
        let mut iter = as_completed(Vec::<TaskFuture<()>>::new());
        assert!(iter.next().is_none());
    }
}
