//! # Initialization
//!
//! [`initialize`] wires a [`SyncContext`]: data directory, configuration,
//! adapters, local library and the restored session. There is no global
//! engine; every caller builds its own context.
//!
//! ## Data Directory
//!
//! Resolved in order:
//! 1. The explicit `data_override` argument (CLI `--data`).
//! 2. The `VERSESYNC_DATA` environment variable (used by tests to isolate state).
//! 3. The OS data directory from the `directories` crate.
//!
//! ```text
//! <data dir>/
//! ├── versesync.toml         # Configuration
//! ├── session.json           # Active backend, last sync
//! ├── local-folder.json      # Granted folder handle
//! ├── drive-token.json       # Google Drive OAuth token
//! └── library/               # Local entity stores
//! ```
//!
//! ## Session Restore
//!
//! The backend recorded in `session.json` (or `default_adapter` from the config)
//! is selected and asked to [`resume`](crate::adapters::SyncAdapter::resume)
//! silently. A stale selection or a failed resume is logged, never fatal.

use crate::adapters::drive::DriveAdapter;
use crate::adapters::drive_http::{ConsentPresenter, LoopbackGrant, ReqwestDriveApi};
use crate::adapters::local_dir::{DirectoryPicker, FixedDirectory, LocalDirAdapter};
use crate::api::SyncApi;
use crate::config::{SyncConfig, CONFIG_FILE};
use crate::engine::SyncEngine;
use crate::error::{Result, SyncError};
use crate::session::{SessionFile, SESSION_FILE};
use crate::store::LocalLibrary;
use clapfig::{Clapfig, SearchMode, SearchPath};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const DATA_DIR_ENV: &str = "VERSESYNC_DATA";

pub struct SyncContext {
    pub api: SyncApi,
    pub config: SyncConfig,
    pub data_dir: PathBuf,
}

/// The UI's side of interactive authentication.
pub struct Interaction {
    pub directory_picker: Box<dyn DirectoryPicker>,
    pub consent: Box<dyn ConsentPresenter>,
}

impl Interaction {
    /// Cancels folder prompts and only logs consent URLs.
    pub fn non_interactive() -> Self {
        Self {
            directory_picker: Box::new(FixedDirectory(None)),
            consent: Box::new(|url: &str| info!(%url, "authorization required")),
        }
    }
}

pub fn resolve_data_dir(data_override: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = data_override {
        return Ok(path);
    }
    if let Some(path) = std::env::var_os(DATA_DIR_ENV) {
        return Ok(PathBuf::from(path));
    }
    ProjectDirs::from("org", "versesync", "versesync")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| SyncError::Config("could not determine a data directory".to_string()))
}

pub fn load_config(data_dir: &Path) -> SyncConfig {
    Clapfig::builder()
        .app_name("versesync")
        .file_name(CONFIG_FILE)
        .search_paths(vec![SearchPath::Path(data_dir.to_path_buf())])
        .search_mode(SearchMode::Merge)
        .load()
        .unwrap_or_default()
}

/// Builds the registry with every production backend.
pub fn build_engine(
    data_dir: &Path,
    config: &SyncConfig,
    interaction: Interaction,
) -> Result<SyncEngine> {
    let mut engine = SyncEngine::new();

    let local = LocalDirAdapter::new(
        data_dir.join("local-folder.json"),
        interaction.directory_picker,
    )
    .with_file_name(&config.local_dir.file_name);
    engine.register_unique(Box::new(local))?;

    let api = ReqwestDriveApi::new(
        config.drive.client_id(),
        config.drive.client_secret(),
        config.drive.timeout(),
    )?;
    let grant = LoopbackGrant::new(interaction.consent, config.drive.consent_timeout());
    let drive = DriveAdapter::new(
        data_dir.join("drive-token.json"),
        Box::new(api),
        Box::new(grant),
    )
    .with_file_name(&config.drive.file_name);
    engine.register_unique(Box::new(drive))?;

    Ok(engine)
}

/// Reselects the remembered backend and resumes its grant without prompting.
fn restore_session(engine: &mut SyncEngine, session: &SessionFile, config: &SyncConfig) {
    let Some(name) = session
        .load()
        .active_adapter
        .or_else(|| config.default_adapter.clone())
    else {
        return;
    };

    if let Err(e) = engine.set_adapter(&name) {
        warn!(adapter = %name, error = %e, "ignoring stale backend selection");
        return;
    }
    match engine.resume() {
        Ok(true) => debug!(adapter = %name, "resumed session"),
        Ok(false) => debug!(adapter = %name, "session needs connect"),
        Err(e) => warn!(adapter = %name, error = %e, "could not resume session"),
    }
}

pub fn initialize(data_override: Option<PathBuf>, interaction: Interaction) -> Result<SyncContext> {
    let data_dir = resolve_data_dir(data_override)?;
    let config = load_config(&data_dir);
    debug!(data_dir = %data_dir.display(), "initializing");

    let mut engine = build_engine(&data_dir, &config, interaction)?;
    let session = SessionFile::new(data_dir.join(SESSION_FILE));
    restore_session(&mut engine, &session, &config);

    let library = LocalLibrary::open(&data_dir.join("library"));
    let api = SyncApi::new(engine, library, session, config.clone());

    Ok(SyncContext {
        api,
        config,
        data_dir,
    })
}
