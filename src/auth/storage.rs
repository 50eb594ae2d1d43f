//! Durable session storage.
//!
//! Two independent slots, consulted by different components:
//! - the whitelisted session record `{user, token, isAuthenticated, role}`,
//!   read once at startup to rebuild the session
//! - the expiry snapshot with its embedded `exp` claim (Unix seconds), read
//!   on every watcher tick as a cross-check against stale or tampered
//!   in-memory state
//!
//! Absence of the session record is equivalent to anonymous.

use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::{Role, UserProfile};

/// Session record file name in the storage directory
const SESSION_FILE: &str = "session.json";

/// Expiry snapshot file name in the storage directory
const SNAPSHOT_FILE: &str = "snapshot.json";

/// The whitelisted subset of session state that survives a restart.
/// Everything else is process-memory only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    pub user: UserProfile,
    pub token: String,
    pub is_authenticated: bool,
    pub role: Role,
}

/// User snapshot with the expiry claim the watcher enforces.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpirySnapshot {
    pub user_id: i64,
    pub email: String,
    /// Unix seconds
    pub exp: i64,
}

pub trait SessionStore: Send + Sync {
    fn load_session(&self) -> Result<Option<PersistedSession>>;
    fn save_session(&self, session: &PersistedSession) -> Result<()>;
    fn clear_session(&self) -> Result<()>;

    fn load_snapshot(&self) -> Result<Option<ExpirySnapshot>>;
    fn save_snapshot(&self, snapshot: &ExpirySnapshot) -> Result<()>;
    fn clear_snapshot(&self) -> Result<()>;
}

/// JSON-file store in the platform data directory.
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create storage directory: {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn load_file<T: serde::de::DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        let path = self.dir.join(name);
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", name))?;
        let value = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", name))?;
        Ok(Some(value))
    }

    fn save_file<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let contents = serde_json::to_string_pretty(value)?;
        std::fs::write(self.dir.join(name), contents)
            .with_context(|| format!("Failed to write {}", name))?;
        Ok(())
    }

    fn clear_file(&self, name: &str) -> Result<()> {
        let path = self.dir.join(name);
        if path.exists() {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove {}", name))?;
        }
        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    fn load_session(&self) -> Result<Option<PersistedSession>> {
        self.load_file(SESSION_FILE)
    }

    fn save_session(&self, session: &PersistedSession) -> Result<()> {
        self.save_file(SESSION_FILE, session)
    }

    fn clear_session(&self) -> Result<()> {
        self.clear_file(SESSION_FILE)
    }

    fn load_snapshot(&self) -> Result<Option<ExpirySnapshot>> {
        self.load_file(SNAPSHOT_FILE)
    }

    fn save_snapshot(&self, snapshot: &ExpirySnapshot) -> Result<()> {
        self.save_file(SNAPSHOT_FILE, snapshot)
    }

    fn clear_snapshot(&self) -> Result<()> {
        self.clear_file(SNAPSHOT_FILE)
    }
}

/// In-memory store for tests and ephemeral clients.
#[derive(Default)]
pub struct MemorySessionStore {
    session: Mutex<Option<PersistedSession>>,
    snapshot: Mutex<Option<ExpirySnapshot>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn load_session(&self) -> Result<Option<PersistedSession>> {
        Ok(self.session.lock().expect("session slot lock poisoned").clone())
    }

    fn save_session(&self, session: &PersistedSession) -> Result<()> {
        *self.session.lock().expect("session slot lock poisoned") = Some(session.clone());
        Ok(())
    }

    fn clear_session(&self) -> Result<()> {
        *self.session.lock().expect("session slot lock poisoned") = None;
        Ok(())
    }

    fn load_snapshot(&self) -> Result<Option<ExpirySnapshot>> {
        Ok(self.snapshot.lock().expect("snapshot slot lock poisoned").clone())
    }

    fn save_snapshot(&self, snapshot: &ExpirySnapshot) -> Result<()> {
        *self.snapshot.lock().expect("snapshot slot lock poisoned") = Some(snapshot.clone());
        Ok(())
    }

    fn clear_snapshot(&self) -> Result<()> {
        *self.snapshot.lock().expect("snapshot slot lock poisoned") = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_session() -> PersistedSession {
        PersistedSession {
            user: UserProfile {
                id: 9,
                email: "kara@example.com".into(),
                first_name: "Kara".into(),
                last_name: "Holt".into(),
                phone: None,
                avatar_url: None,
            },
            token: "tok-123".into(),
            is_authenticated: true,
            role: Role::User,
        }
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().to_path_buf()).unwrap();

        assert!(store.load_session().unwrap().is_none());

        store.save_session(&sample_session()).unwrap();
        let loaded = store.load_session().unwrap().unwrap();
        assert_eq!(loaded.token, "tok-123");
        assert!(loaded.is_authenticated);
        assert_eq!(loaded.role, Role::User);

        store.clear_session().unwrap();
        assert!(store.load_session().unwrap().is_none());
        // Clearing a missing record is fine
        store.clear_session().unwrap();
    }

    #[test]
    fn test_snapshot_slot_is_independent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().to_path_buf()).unwrap();

        store
            .save_snapshot(&ExpirySnapshot {
                user_id: 9,
                email: "kara@example.com".into(),
                exp: 1754600000,
            })
            .unwrap();

        // The session record slot stays empty
        assert!(store.load_session().unwrap().is_none());
        assert_eq!(store.load_snapshot().unwrap().unwrap().exp, 1754600000);
    }

    #[test]
    fn test_persisted_record_uses_whitelisted_field_names() {
        let json = serde_json::to_value(sample_session()).unwrap();
        assert!(json.get("isAuthenticated").is_some());
        assert!(json.get("token").is_some());
        assert!(json.get("user").is_some());
        assert!(json.get("role").is_some());
        assert_eq!(json.as_object().unwrap().len(), 4);
    }
}
