//! Authentication module for session lifecycle and access gating.
//!
//! This module provides:
//! - `SessionManager`: login/logout/restore, durable persistence of the
//!   whitelisted session subset, and the periodic expiry watcher
//! - `SessionStore`: the durable storage seam (file-backed or in-memory)
//! - `AccessGuard`: the presence predicate routed views consult
//!
//! Tokens are opaque bearer credentials; the expiry claim lives in a
//! separate durable snapshot the watcher re-reads on every tick.

pub mod guard;
pub mod session;
pub mod storage;

pub use guard::{AccessGuard, GuardDecision};
pub use session::{Session, SessionManager, SessionState, SessionWatcher};
pub use storage::{
    ExpirySnapshot, FileSessionStore, MemorySessionStore, PersistedSession, SessionStore,
};
