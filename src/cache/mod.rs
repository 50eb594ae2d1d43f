//! Request cache with tag-based invalidation and deduplication.
//!
//! This module provides the three leaf components of the sync layer:
//! - `CacheStore`: per-(endpoint, argument) entries with status, data,
//!   error, subscriber count, and change notification
//! - `Deduplicator`: at most one network call per in-flight cache key
//! - `TagGraph`: resolves a mutation's invalidated tags to affected entries
//!
//! Entries are marked stale rather than deleted on invalidation, and only
//! evicted once orphaned past a grace window.

pub mod dedup;
pub mod store;
pub mod tags;

pub use dedup::{Deduplicator, FetchOutcome};
pub use store::{CacheStats, CacheStore, QuerySnapshot, QueryStatus};
pub use tags::{Resource, Tag, TagGraph};
