//! rentcache - client-side data synchronization for the rental booking API.
//!
//! The crate is the data layer under a vehicle-rental booking frontend:
//! a per-endpoint request cache with tag-based invalidation, request
//! deduplication, and a token session lifecycle with durable persistence
//! and expiry enforcement. UI rendering, form validation, and checkout
//! redirection live with the embedding application; this layer owns the
//! read/write contract they consume.
//!
//! # Overview
//!
//! ```ignore
//! use rentcache::{Client, Config};
//!
//! let client = Client::new(&Config::load()?)?;
//! client.init(); // restore session, start the expiry watcher
//!
//! // Reactive read: refetches automatically when a mutation invalidates it
//! let mut bookings = client.subscribe("listBookings", serde_json::Value::Null)?;
//! let snapshot = bookings.settled().await;
//!
//! // Write: every open booking view refetches, no manual refresh anywhere
//! client.mutate("createBooking", serde_json::json!({
//!     "vehicleId": 7, "startDate": "2026-08-10", "endDate": "2026-08-12"
//! })).await?;
//! ```
//!
//! Concurrent reads of the same endpoint and arguments collapse to a single
//! network call; a mutation's invalidation is applied before its future
//! resolves, so code that awaits a write and then reads the cache never
//! observes pre-mutation state.

pub mod api;
pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod models;
pub mod registry;

pub use api::{ApiError, ApiRequest, HttpTransport, Transport};
pub use auth::{
    AccessGuard, FileSessionStore, GuardDecision, MemorySessionStore, Session, SessionManager,
    SessionState, SessionStore, SessionWatcher,
};
pub use cache::{CacheStats, FetchOutcome, QuerySnapshot, QueryStatus, Resource, Tag};
pub use client::{Client, Subscription};
pub use config::Config;
pub use models::{Credentials, Role, UserProfile};
pub use registry::{Endpoint, EndpointKind, Registry, RegistryError};
