//! Cache store: one entry per (endpoint, argument) pair.
//!
//! The store is dumb storage - payloads are held as raw `serde_json::Value`
//! and never validated here. All operations complete synchronously inside a
//! single lock acquisition; the tag graph lives under the same lock so a
//! write and its tag bookkeeping are one atomic step. Entry changes are
//! published through a per-entry watch channel for reactive consumers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::watch;
use tracing::debug;

use crate::api::ApiError;
use crate::cache::tags::{Tag, TagGraph};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Uninitialized,
    Pending,
    Fulfilled,
    Rejected,
}

/// Immutable view of one cache entry, published on every change.
#[derive(Debug, Clone)]
pub struct QuerySnapshot {
    pub status: QueryStatus,
    pub data: Option<Value>,
    pub error: Option<Arc<ApiError>>,
    pub stale: bool,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl QuerySnapshot {
    pub fn is_loading(&self) -> bool {
        matches!(self.status, QueryStatus::Pending)
    }

    /// Human-readable age of the cached data, for "last updated" displays.
    pub fn age_display(&self) -> String {
        let Some(fetched_at) = self.fetched_at else {
            return "never".to_string();
        };
        let minutes = (Utc::now() - fetched_at).num_minutes();
        if minutes < 1 {
            // Covers clock skew as well
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            format!("{}h ago", minutes / 60)
        } else {
            format!("{}d ago", minutes / 1440)
        }
    }
}

struct EntryState {
    /// Originating endpoint and arguments, kept so invalidation-driven
    /// refetch can rebuild the request without the original caller.
    endpoint: &'static str,
    args: Value,
    status: QueryStatus,
    data: Option<Value>,
    error: Option<Arc<ApiError>>,
    fetched_at: Option<DateTime<Utc>>,
    stale: bool,
    subscriber_count: usize,
    /// Incremented each time the subscriber count returns to zero. A
    /// scheduled eviction only fires if the epoch it captured is still
    /// current, so a resubscribe-then-unsubscribe cycle restarts the grace
    /// window instead of inheriting the old timer.
    orphan_epoch: u64,
    notify: watch::Sender<QuerySnapshot>,
}

impl EntryState {
    fn new(endpoint: &'static str, args: Value) -> Self {
        let initial = QuerySnapshot {
            status: QueryStatus::Uninitialized,
            data: None,
            error: None,
            stale: false,
            fetched_at: None,
        };
        let (notify, _) = watch::channel(initial);
        Self {
            endpoint,
            args,
            status: QueryStatus::Uninitialized,
            data: None,
            error: None,
            fetched_at: None,
            stale: false,
            subscriber_count: 0,
            orphan_epoch: 0,
            notify,
        }
    }

    fn snapshot(&self) -> QuerySnapshot {
        QuerySnapshot {
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            stale: self.stale,
            fetched_at: self.fetched_at,
        }
    }

    fn publish(&self) {
        // send_replace: the channel value must track the entry even while
        // nobody subscribes, so a later subscriber starts from current state
        self.notify.send_replace(self.snapshot());
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub subscribed: usize,
    pub stale: usize,
    pub in_flight: usize,
}

struct CacheState {
    entries: HashMap<String, EntryState>,
    tags: TagGraph,
}

pub struct CacheStore {
    state: Mutex<CacheState>,
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                tags: TagGraph::new(),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState> {
        self.state.lock().expect("cache lock poisoned")
    }

    /// Create the entry in `Uninitialized` state if it does not exist yet.
    pub fn ensure_entry(&self, key: &str, endpoint: &'static str, args: &Value) {
        let mut state = self.lock();
        state
            .entries
            .entry(key.to_string())
            .or_insert_with(|| EntryState::new(endpoint, args.clone()));
    }

    pub fn snapshot(&self, key: &str) -> Option<QuerySnapshot> {
        self.lock().entries.get(key).map(|e| e.snapshot())
    }

    /// The (endpoint, args) pair the entry was created for.
    pub fn entry_origin(&self, key: &str) -> Option<(&'static str, Value)> {
        self.lock()
            .entries
            .get(key)
            .map(|e| (e.endpoint, e.args.clone()))
    }

    /// Cached success value, only when fulfilled and not stale. Rejected or
    /// stale entries return None so the caller refetches.
    pub fn fresh_value(&self, key: &str) -> Option<Value> {
        let state = self.lock();
        let entry = state.entries.get(key)?;
        if entry.status == QueryStatus::Fulfilled && !entry.stale {
            entry.data.clone()
        } else {
            None
        }
    }

    /// True when a subscriber mounting this entry should trigger a fetch:
    /// never fetched, marked stale, or previously rejected (a new consumer
    /// is a new read, not an automatic retry).
    pub fn needs_fetch(&self, key: &str) -> bool {
        let state = self.lock();
        match state.entries.get(key) {
            Some(entry) => {
                entry.stale
                    || matches!(
                        entry.status,
                        QueryStatus::Uninitialized | QueryStatus::Rejected
                    )
            }
            None => true,
        }
    }

    pub fn begin_fetch(&self, key: &str) {
        let mut state = self.lock();
        if let Some(entry) = state.entries.get_mut(key) {
            entry.status = QueryStatus::Pending;
            entry.publish();
        }
    }

    /// Store a successful result and record its provided tags, atomically.
    pub fn write_success(&self, key: &str, data: Value, provides: &[Tag]) {
        let mut state = self.lock();
        state.tags.record_provides(key, provides);
        if let Some(entry) = state.entries.get_mut(key) {
            entry.status = QueryStatus::Fulfilled;
            entry.data = Some(data);
            entry.error = None;
            entry.fetched_at = Some(Utc::now());
            entry.stale = false;
            entry.publish();
        }
    }

    /// Store a failure. The entry's tag associations are dropped - a
    /// rejected result no longer represents the resource.
    pub fn write_failure(&self, key: &str, error: Arc<ApiError>) {
        let mut state = self.lock();
        state.tags.remove_key(key);
        if let Some(entry) = state.entries.get_mut(key) {
            entry.status = QueryStatus::Rejected;
            entry.error = Some(error);
            entry.publish();
        }
    }

    /// Create-if-absent and register a subscriber in one lock turn, so a
    /// concurrently firing eviction cannot slip between the two steps.
    pub fn subscribe_entry(
        &self,
        key: &str,
        endpoint: &'static str,
        args: &Value,
    ) -> watch::Receiver<QuerySnapshot> {
        let mut state = self.lock();
        let entry = state
            .entries
            .entry(key.to_string())
            .or_insert_with(|| EntryState::new(endpoint, args.clone()));
        entry.subscriber_count += 1;
        entry.notify.subscribe()
    }

    /// Register a subscriber and return the entry's change feed.
    pub fn subscribe(&self, key: &str) -> Option<watch::Receiver<QuerySnapshot>> {
        let mut state = self.lock();
        let entry = state.entries.get_mut(key)?;
        entry.subscriber_count += 1;
        Some(entry.notify.subscribe())
    }

    /// Drop one subscriber. Returns the orphan epoch when the count reached
    /// zero - the caller schedules `evict_if_orphaned` with it after the
    /// grace window.
    pub fn unsubscribe(&self, key: &str) -> Option<u64> {
        let mut state = self.lock();
        let entry = state.entries.get_mut(key)?;
        entry.subscriber_count = entry.subscriber_count.saturating_sub(1);
        if entry.subscriber_count == 0 {
            entry.orphan_epoch += 1;
            Some(entry.orphan_epoch)
        } else {
            None
        }
    }

    /// Remove the entry if it is still orphaned from the same epoch. Pending
    /// entries survive - the in-flight call completes and populates the
    /// cache for the next reader.
    pub fn evict_if_orphaned(&self, key: &str, epoch: u64) -> bool {
        let mut state = self.lock();
        let evict = match state.entries.get(key) {
            Some(entry) => {
                entry.subscriber_count == 0
                    && entry.orphan_epoch == epoch
                    && entry.status != QueryStatus::Pending
            }
            None => false,
        };
        if evict {
            debug!(key = %key, "Evicting orphaned cache entry");
            state.entries.remove(key);
            state.tags.remove_key(key);
        }
        evict
    }

    /// Mark every entry affected by `tags` stale. Entries with live
    /// subscribers flip to `Pending` in the same turn and are returned for
    /// background refetch; orphaned entries stay stale and refetch lazily on
    /// their next read. Safe to apply twice - an already stale or pending
    /// entry is left as is.
    pub fn mark_stale(&self, tags: &[Tag]) -> Vec<String> {
        let mut state = self.lock();
        let affected = state.tags.affected_by(tags);
        let mut refetch = Vec::new();
        for key in affected {
            if let Some(entry) = state.entries.get_mut(&key) {
                entry.stale = true;
                if entry.subscriber_count > 0 {
                    entry.status = QueryStatus::Pending;
                    refetch.push(key.clone());
                }
                entry.publish();
            }
        }
        debug!(
            invalidated = refetch.len(),
            tags = tags.len(),
            "Applied tag invalidation"
        );
        refetch
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        CacheStats {
            entries: state.entries.len(),
            subscribed: state
                .entries
                .values()
                .filter(|e| e.subscriber_count > 0)
                .count(),
            stale: state.entries.values().filter(|e| e.stale).count(),
            in_flight: 0,
        }
    }

    pub fn subscriber_count(&self, key: &str) -> usize {
        self.lock()
            .entries
            .get(key)
            .map(|e| e.subscriber_count)
            .unwrap_or(0)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().entries.contains_key(key)
    }
}
