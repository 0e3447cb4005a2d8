use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use tracing::debug;

use byref_types::Key;

use crate::error::ResolutionFailed;
use crate::store::Store;

/// Single-flight byte-fetch table.
///
/// Concurrent fetches of the same key collapse onto one connector get:
/// the first requester becomes the leader and performs the store read on
/// its own thread; everyone else attaches to the in-flight entry and
/// blocks until the leader publishes. Entries are removed on completion,
/// success or failure. Unrelated keys never contend — each flight has its
/// own lock.
///
/// The underlying get is never cancelled mid-flight (there are no partial
/// reads); a requester that stops waiting abandons only its wait, and a
/// leaderless result still lands in the store's byte cache where the next
/// resolution finds it.
pub struct Resolver {
    flights: Mutex<HashMap<Key, Arc<Flight>>>,
}

enum FlightState {
    Pending,
    Done(Result<Arc<Vec<u8>>, ResolutionFailed>),
}

struct Flight {
    state: Mutex<FlightState>,
    cond: Condvar,
    waiters: AtomicUsize,
}

impl Flight {
    fn new() -> Self {
        Self {
            state: Mutex::new(FlightState::Pending),
            cond: Condvar::new(),
            waiters: AtomicUsize::new(0),
        }
    }

    fn publish(&self, result: Result<Arc<Vec<u8>>, ResolutionFailed>) {
        let mut state = self.state.lock().expect("lock poisoned");
        *state = FlightState::Done(result);
        drop(state);
        self.cond.notify_all();
    }

    fn wait(&self) -> Result<Arc<Vec<u8>>, ResolutionFailed> {
        self.waiters.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().expect("lock poisoned");
        loop {
            match &*state {
                FlightState::Done(result) => {
                    self.waiters.fetch_sub(1, Ordering::SeqCst);
                    return result.clone();
                }
                FlightState::Pending => {
                    state = self.cond.wait(state).expect("lock poisoned");
                }
            }
        }
    }
}

impl Resolver {
    pub fn new() -> Self {
        Self {
            flights: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch the payload behind `key` through `store`, coalescing with
    /// any in-flight fetch for the same key.
    pub fn fetch(&self, store: &Store, key: &Key) -> Result<Arc<Vec<u8>>, ResolutionFailed> {
        let (flight, leader) = {
            let mut flights = self.flights.lock().expect("lock poisoned");
            match flights.get(key) {
                Some(flight) => (Arc::clone(flight), false),
                None => {
                    let flight = Arc::new(Flight::new());
                    flights.insert(key.clone(), Arc::clone(&flight));
                    (flight, true)
                }
            }
        };

        if !leader {
            debug!(key = %key.short(), "attached to in-flight fetch");
            return flight.wait();
        }

        let result = store
            .get_bytes(key)
            .map(Arc::new)
            .map_err(|e| ResolutionFailed::from_store_error(key.clone(), &e));
        flight.publish(result.clone());
        self.flights.lock().expect("lock poisoned").remove(key);
        result
    }

    /// Number of fetches currently in flight.
    pub fn pending_count(&self) -> usize {
        self.flights.lock().expect("lock poisoned").len()
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}
