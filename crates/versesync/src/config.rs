//! # Configuration
//!
//! Configuration is managed by [`clapfig`], which layers TOML files,
//! environment variables and compiled defaults.
//!
//! ## Storage Hierarchy
//!
//! 1. **Environment variables**: `VERSESYNC__DRIVE__CLIENT_ID`, etc.
//! 2. **Config file**: `versesync.toml` in the data directory.
//! 3. **Compiled defaults**: `#[config(default = ...)]`.
//!
//! ## Available Settings
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | `default_adapter` | none | Backend selected when no session exists |
//! | `local_dir.file_name` | `bible-sync-data.json` | Data file inside the granted folder |
//! | `drive.client_id` | none | OAuth client id of the Google Cloud project |
//! | `drive.client_secret` | none | OAuth client secret |
//! | `drive.file_name` | `bible-sync-data.json` | Data file in `appDataFolder` |
//! | `drive.timeout_secs` | `30` | HTTP timeout for Drive requests |
//! | `drive.consent_timeout_secs` | `300` | How long to wait for the browser redirect |

use crate::adapters::DEFAULT_DATA_FILE;
use confique::Config;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const CONFIG_FILE: &str = "versesync.toml";

/// Configuration for versesync, stored in `versesync.toml`.
#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(default)]
pub struct SyncConfig {
    /// Backend to select when no session has picked one yet.
    pub default_adapter: Option<String>,

    #[config(nested)]
    pub local_dir: LocalDirConfig,

    #[config(nested)]
    pub drive: DriveConfig,
}

#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LocalDirConfig {
    #[config(default = "bible-sync-data.json")]
    pub file_name: String,
}

impl Default for LocalDirConfig {
    fn default() -> Self {
        Self {
            file_name: DEFAULT_DATA_FILE.to_string(),
        }
    }
}

#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct DriveConfig {
    pub client_id: Option<String>,

    pub client_secret: Option<String>,

    #[config(default = "bible-sync-data.json")]
    pub file_name: String,

    #[config(default = 30)]
    pub timeout_secs: u64,

    #[config(default = 300)]
    pub consent_timeout_secs: u64,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            file_name: DEFAULT_DATA_FILE.to_string(),
            timeout_secs: 30,
            consent_timeout_secs: 300,
        }
    }
}

impl DriveConfig {
    pub fn client_id(&self) -> &str {
        self.client_id.as_deref().unwrap_or_default()
    }

    pub fn client_secret(&self) -> &str {
        self.client_secret.as_deref().unwrap_or_default()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn consent_timeout(&self) -> Duration {
        Duration::from_secs(self.consent_timeout_secs.max(1))
    }
}
