//! Client configuration.
//!
//! Holds the API base URL, the session storage location, and the two timing
//! knobs of the sync layer (expiry watcher interval, cache eviction grace).
//!
//! Configuration is stored at `~/.config/rentcache/config.json`; session
//! state lives under the platform cache directory.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for config/storage directory paths
const APP_NAME: &str = "rentcache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Expiry watcher cadence. One minute keeps a dead credential alive for at
/// most one interval after its claim passes.
const DEFAULT_WATCHER_INTERVAL_SECS: u64 = 60;

/// How long an orphaned cache entry survives after its last subscriber
/// leaves. Tolerates rapid unmount/remount cycles during navigation.
const DEFAULT_EVICTION_GRACE_SECS: u64 = 60;

const DEFAULT_BASE_URL: &str = "http://localhost:4000/api";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub storage_dir: Option<PathBuf>,
    #[serde(default = "default_watcher_interval")]
    pub watcher_interval_secs: u64,
    #[serde(default = "default_eviction_grace")]
    pub eviction_grace_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_watcher_interval() -> u64 {
    DEFAULT_WATCHER_INTERVAL_SECS
}

fn default_eviction_grace() -> u64 {
    DEFAULT_EVICTION_GRACE_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            storage_dir: None,
            watcher_interval_secs: default_watcher_interval(),
            eviction_grace_secs: default_eviction_grace(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory for the durable session record and expiry snapshot.
    pub fn storage_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.storage_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn watcher_interval(&self) -> Duration {
        Duration::from_secs(self.watcher_interval_secs)
    }

    pub fn eviction_grace(&self) -> Duration {
        Duration::from_secs(self.eviction_grace_secs)
    }
}
