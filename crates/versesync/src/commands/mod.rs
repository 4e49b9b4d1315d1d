//! # Command Layer
//!
//! Each user-facing operation lives in its own submodule as a plain function
//! over the engine, the local library and the session file.
//!
//! Commands:
//! - Gather local data and hand it to the engine
//! - Write merged or restored data back into the local stores
//! - Persist the backend selection
//! - Return a structured [`CmdResult`]
//!
//! They never print, prompt or exit. Prompts belong to the adapters'
//! [`DirectoryPicker`](crate::adapters::local_dir::DirectoryPicker) and
//! [`ConsentPresenter`](crate::adapters::drive_http::ConsentPresenter)
//! implementations supplied by the UI; rendering belongs to the UI.
//!
//! ## Testing Strategy
//!
//! Command tests run against [`MemAdapter`](crate::adapters::memory::MemAdapter),
//! [`LocalLibrary::in_memory`](crate::store::LocalLibrary::in_memory) and a
//! session file in a temp dir.

use crate::adapters::SyncAdapter;
use crate::engine::SyncState;
use crate::merge::Conflict;
use crate::model::BlobStats;
use chrono::{DateTime, Utc};
use serde::Serialize;

pub mod adapters;
pub mod connect;
pub mod disconnect;
pub mod restore;
pub mod select;
pub mod status;
pub mod sync;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct CmdMessage {
    pub level: MessageLevel,
    pub content: String,
}

impl CmdMessage {
    pub fn info(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Info,
            content: content.into(),
        }
    }

    pub fn success(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Success,
            content: content.into(),
        }
    }

    pub fn warning(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Warning,
            content: content.into(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Error,
            content: content.into(),
        }
    }
}

/// One registered backend, as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdapterInfo {
    pub name: String,
    pub display_name: String,
    pub location: Option<String>,
    pub active: bool,
    pub authenticated: bool,
}

impl AdapterInfo {
    pub fn describe(adapter: &dyn SyncAdapter, active: bool) -> Self {
        let meta = adapter.display_metadata();
        Self {
            name: adapter.name().to_string(),
            display_name: meta
                .map(|m| m.display_name())
                .unwrap_or_else(|| adapter.name().to_string()),
            location: meta.and_then(|m| m.location()),
            active,
            authenticated: adapter.is_authenticated(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub adapter: Option<AdapterInfo>,
    pub state: SyncState,
    pub last_synced: Option<DateTime<Utc>>,
    /// Whether `last_synced` was read from the remote rather than the session.
    pub remote_checked: bool,
    pub local: BlobStats,
}

#[derive(Debug, Default, Serialize)]
pub struct CmdResult {
    pub messages: Vec<CmdMessage>,
    pub adapters: Vec<AdapterInfo>,
    pub status: Option<StatusReport>,
    pub conflicts: Vec<Conflict>,
    pub stats: Option<BlobStats>,
}

impl CmdResult {
    pub fn add_message(&mut self, message: CmdMessage) {
        self.messages.push(message);
    }

    pub fn with_adapters(mut self, adapters: Vec<AdapterInfo>) -> Self {
        self.adapters = adapters;
        self
    }

    pub fn with_status(mut self, status: StatusReport) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_conflicts(mut self, conflicts: Vec<Conflict>) -> Self {
        self.conflicts = conflicts;
        self
    }

    pub fn with_stats(mut self, stats: BlobStats) -> Self {
        self.stats = Some(stats);
        self
    }
}

/// Human-facing name of the active adapter.
pub(crate) fn display_name(adapter: Option<&dyn SyncAdapter>) -> String {
    match adapter {
        Some(a) => a
            .display_metadata()
            .map(|m| m.display_name())
            .unwrap_or_else(|| a.name().to_string()),
        None => "no backend".to_string(),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::adapters::memory::{MemAdapter, MemRemoteHandle};
    use crate::engine::SyncEngine;
    use crate::session::{SessionFile, SESSION_FILE};
    use crate::store::LocalLibrary;
    use tempfile::TempDir;

    pub struct CmdFixture {
        pub engine: SyncEngine,
        pub library: LocalLibrary,
        pub session: SessionFile,
        pub remote: MemRemoteHandle,
        pub _dir: TempDir,
    }

    impl CmdFixture {
        /// Engine with `mem` and `other` registered, nothing selected.
        pub fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let mut engine = SyncEngine::new();
            let mem = MemAdapter::new("mem");
            let remote = mem.handle();
            engine.register_adapter(Box::new(mem)).unwrap();
            engine
                .register_adapter(Box::new(MemAdapter::new("other")))
                .unwrap();
            Self {
                engine,
                library: LocalLibrary::in_memory(),
                session: SessionFile::new(dir.path().join(SESSION_FILE)),
                remote,
                _dir: dir,
            }
        }

        /// Same as `new`, with `mem` selected and authenticated.
        pub fn connected() -> Self {
            let mut fx = Self::new();
            fx.engine.set_adapter("mem").unwrap();
            fx.engine.authenticate().unwrap();
            fx
        }
    }
}
