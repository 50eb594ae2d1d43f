//! Request deduplication.
//!
//! For any cache key there is at most one in-flight network call. The first
//! caller becomes the leader and runs the executor; concurrent callers for
//! the same key attach to the leader's settlement instead of issuing a
//! second call. The in-flight record is removed before the outcome is
//! published, so a caller arriving after settlement starts a fresh call.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;

use crate::api::ApiError;

/// Settled result of one network call, shared by every caller in the dedup
/// window. The error is Arc'd so a single failure can be cloned into the
/// cache entry and every waiting caller.
pub type FetchOutcome = Result<Value, Arc<ApiError>>;

#[derive(Default)]
pub struct Deduplicator {
    in_flight: Mutex<HashMap<String, broadcast::Sender<FetchOutcome>>>,
}

/// Removes the in-flight record when the leader settles, and also when the
/// leader's future is dropped mid-call - otherwise followers of an abandoned
/// call would wait forever on a sender that never fires.
struct InFlightGuard<'a> {
    dedup: &'a Deduplicator,
    key: &'a str,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.dedup
            .in_flight
            .lock()
            .expect("in-flight lock poisoned")
            .remove(self.key);
    }
}

enum DispatchRole {
    Leader(broadcast::Sender<FetchOutcome>),
    Follower(broadcast::Receiver<FetchOutcome>),
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `executor` for `key`, unless a call for that key is already in
    /// flight - then await its settlement instead. Exactly one executor
    /// invocation happens per dedup window; every caller receives the same
    /// outcome.
    pub async fn dispatch<F, Fut>(&self, key: &str, executor: F) -> FetchOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FetchOutcome>,
    {
        let role = {
            let mut in_flight = self.in_flight.lock().expect("in-flight lock poisoned");
            match in_flight.get(key) {
                Some(sender) => DispatchRole::Follower(sender.subscribe()),
                None => {
                    let (sender, _) = broadcast::channel(1);
                    in_flight.insert(key.to_string(), sender.clone());
                    DispatchRole::Leader(sender)
                }
            }
        };

        match role {
            DispatchRole::Follower(mut receiver) => {
                debug!(key = %key, "Joining in-flight request");
                match receiver.recv().await {
                    Ok(outcome) => outcome,
                    // Leader dropped without settling
                    Err(_) => Err(Arc::new(ApiError::Interrupted)),
                }
            }
            DispatchRole::Leader(sender) => {
                let guard = InFlightGuard { dedup: self, key };
                let outcome = executor().await;
                // Settlement: clear the in-flight record, then publish
                drop(guard);
                let _ = sender.send(outcome.clone());
                outcome
            }
        }
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        self.in_flight
            .lock()
            .expect("in-flight lock poisoned")
            .contains_key(key)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight
            .lock()
            .expect("in-flight lock poisoned")
            .len()
    }
}
