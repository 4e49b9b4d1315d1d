//! Per-user sync session: which backend is active and when it last synced.
//!
//! The engine itself is rebuilt on every run; this small JSON file is what
//! carries the selection from one invocation to the next.

use crate::error::{Result, SyncError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;
use uuid::Uuid;

pub const SESSION_FILE: &str = "session.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default)]
    pub active_adapter: Option<String>,
    /// `lastSynced` of the most recent successful sync from this device.
    #[serde(default)]
    pub last_synced: Option<DateTime<Utc>>,
}

pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or unreadable session files yield an empty session.
    pub fn load(&self) -> Session {
        let Ok(content) = fs::read_to_string(&self.path) else {
            return Session::default();
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!(file = %self.path.display(), error = %e, "discarding unreadable session");
            Session::default()
        })
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        let dir = self
            .path
            .parent()
            .ok_or_else(|| SyncError::Store(format!("{} has no parent", self.path.display())))?;
        fs::create_dir_all(dir)?;
        let tmp = dir.join(format!(".session-{}.tmp", Uuid::new_v4()));
        fs::write(&tmp, serde_json::to_string_pretty(session)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    pub fn update(&self, f: impl FnOnce(&mut Session)) -> Result<Session> {
        let mut session = self.load();
        f(&mut session);
        self.save(&session)?;
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn round_trips_selection() {
        let dir = TempDir::new().unwrap();
        let file = SessionFile::new(dir.path().join(SESSION_FILE));
        assert_eq!(file.load(), Session::default());

        file.update(|s| s.active_adapter = Some("local-folder".into()))
            .unwrap();
        assert_eq!(file.load().active_adapter.as_deref(), Some("local-folder"));
    }

    #[test]
    fn corrupt_session_is_reset() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SESSION_FILE);
        fs::write(&path, "[]").unwrap();
        assert_eq!(SessionFile::new(path).load(), Session::default());
    }
}
