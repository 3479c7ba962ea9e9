//! Single-flight request coalescing
//!
//! Collapses concurrent work for the same key into one in-flight future
//! whose result is broadcast to every waiter. For any key at any moment, at
//! most one fetch runs. Semantics are first-caller-drives: the leader's
//! future performs the work, and if the leader is dropped mid-fetch (its
//! request was cancelled) the waiters observe `Cancelled`.

use lyrad_common::Error;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use tokio::sync::broadcast;

/// How a caller's result was obtained
#[derive(Debug)]
pub enum Flight<T> {
    /// This caller led the fetch
    Led(T),
    /// This caller joined an in-flight fetch and received the broadcast
    Joined(T),
}

impl<T> Flight<T> {
    pub fn into_inner(self) -> T {
        match self {
            Flight::Led(v) | Flight::Joined(v) => v,
        }
    }
}

/// Keyed single-flight group.
///
/// The in-flight map is guarded by a plain mutex held only for map edits,
/// never across the fetch itself.
pub struct SingleFlight<T: Clone + Send + 'static> {
    inflight: Mutex<HashMap<String, broadcast::Sender<T>>>,
}

impl<T: Clone + Send + 'static> Default for SingleFlight<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> SingleFlight<T> {
    pub fn new() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Run `fetch` for `key`, coalescing with any in-flight call.
    ///
    /// The leader runs `fetch` to completion, publishes the value to all
    /// waiters, and removes the in-flight entry. A waiter whose leader was
    /// dropped before publishing gets `Err(Cancelled)`; the waiter's own
    /// cancellation simply drops its receiver without touching the fetch.
    pub async fn run<F, Fut>(&self, key: &str, fetch: F) -> Result<Flight<T>, Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let waiter = {
            let mut map = self.inflight.lock().expect("singleflight mutex poisoned");
            match map.get(key) {
                Some(tx) => Some(tx.subscribe()),
                None => {
                    let (tx, _) = broadcast::channel(1);
                    map.insert(key.to_string(), tx);
                    None
                }
            }
        };

        if let Some(mut rx) = waiter {
            return match rx.recv().await {
                Ok(value) => Ok(Flight::Joined(value)),
                // sender dropped without publishing: the leader was cancelled
                Err(_) => Err(Error::Cancelled),
            };
        }

        let guard = LeaderGuard { flights: self, key };
        let value = fetch().await;
        if let Some(tx) = guard.complete() {
            // no receivers is fine; nobody joined this flight
            let _ = tx.send(value.clone());
        }
        Ok(Flight::Led(value))
    }

    /// Number of keys currently in flight
    pub fn in_flight(&self) -> usize {
        self.inflight.lock().expect("singleflight mutex poisoned").len()
    }
}

/// Removes the in-flight entry if the leader never completed, which closes
/// the broadcast channel and wakes waiters with `Cancelled`.
struct LeaderGuard<'a, T: Clone + Send + 'static> {
    flights: &'a SingleFlight<T>,
    key: &'a str,
}

impl<'a, T: Clone + Send + 'static> LeaderGuard<'a, T> {
    fn complete(self) -> Option<broadcast::Sender<T>> {
        let tx = self
            .flights
            .inflight
            .lock()
            .expect("singleflight mutex poisoned")
            .remove(self.key);
        std::mem::forget(self);
        tx
    }
}

impl<'a, T: Clone + Send + 'static> Drop for LeaderGuard<'a, T> {
    fn drop(&mut self) {
        self.flights
            .inflight
            .lock()
            .expect("singleflight mutex poisoned")
            .remove(self.key);
    }
}
