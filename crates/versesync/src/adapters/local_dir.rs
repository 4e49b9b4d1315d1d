//! Local folder backend.
//!
//! The user grants a directory once; the choice is remembered in a small JSON
//! "handle" file so later sessions can silently reuse it.
//!
//! Write access is checked when the grant is made or resumed. After that the
//! grant stays live while the directory exists; a permission error on a later
//! read or write drops it.
//!
//! ```text
//! <chosen folder>/
//! └── bible-sync-data.json
//! ```

use super::{SupportsDisplayMetadata, SyncAdapter, DEFAULT_DATA_FILE};
use crate::error::{Result, SyncError};
use crate::model::SyncBlob;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, warn};
use uuid::Uuid;

pub const LOCAL_DIR_ADAPTER: &str = "local-folder";

/// Source of a directory choice. The CLI asks on the terminal, tests hand out
/// a fixed path.
pub trait DirectoryPicker {
    /// Returns `None` when the user cancels.
    fn pick_directory(&mut self) -> Result<Option<PathBuf>>;
}

/// Picker that always answers with the same directory (or cancels).
pub struct FixedDirectory(pub Option<PathBuf>);

impl DirectoryPicker for FixedDirectory {
    fn pick_directory(&mut self) -> Result<Option<PathBuf>> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DirectoryHandle {
    directory: PathBuf,
    granted_at: DateTime<Utc>,
}

pub struct LocalDirAdapter {
    name: String,
    file_name: String,
    handle_file: PathBuf,
    directory: Option<PathBuf>,
    picker: Box<dyn DirectoryPicker>,
}

impl LocalDirAdapter {
    /// `handle_file` is where the granted directory is remembered between sessions.
    pub fn new(handle_file: PathBuf, picker: Box<dyn DirectoryPicker>) -> Self {
        Self {
            name: LOCAL_DIR_ADAPTER.to_string(),
            file_name: DEFAULT_DATA_FILE.to_string(),
            handle_file,
            directory: None,
            picker,
        }
    }

    pub fn with_file_name(mut self, file_name: &str) -> Self {
        self.file_name = file_name.to_string();
        self
    }

    pub fn set_picker(&mut self, picker: Box<dyn DirectoryPicker>) {
        self.picker = picker;
    }

    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    pub fn data_path(&self) -> Option<PathBuf> {
        self.directory.as_ref().map(|dir| dir.join(&self.file_name))
    }

    /// Reuses the remembered directory if it is still readable and writable.
    pub fn try_restore_permission(&mut self) -> bool {
        let Some(handle) = self.read_handle() else {
            return false;
        };
        if has_read_write(&handle.directory) {
            debug!(dir = %handle.directory.display(), "restored local folder grant");
            self.directory = Some(handle.directory);
            true
        } else {
            warn!(
                dir = %handle.directory.display(),
                "remembered sync folder is no longer accessible"
            );
            false
        }
    }

    fn read_handle(&self) -> Option<DirectoryHandle> {
        let content = fs::read_to_string(&self.handle_file).ok()?;
        match serde_json::from_str(&content) {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(file = %self.handle_file.display(), error = %e, "ignoring unreadable folder handle");
                None
            }
        }
    }

    fn write_handle(&self, directory: &Path) -> Result<()> {
        let handle = DirectoryHandle {
            directory: directory.to_path_buf(),
            granted_at: Utc::now(),
        };
        let content = serde_json::to_string_pretty(&handle)?;
        write_atomic(&self.handle_file, &content)?;
        Ok(())
    }

    /// Turns an I/O failure into `NotAuthenticated` when the folder stopped
    /// accepting us, and into a backend error otherwise.
    fn io_failure(&mut self, action: String, err: std::io::Error) -> SyncError {
        if err.kind() == std::io::ErrorKind::PermissionDenied {
            warn!(adapter = %self.name, error = %err, "lost access to sync folder");
            self.directory = None;
            return SyncError::NotAuthenticated;
        }
        SyncError::backend_with(&self.name, action, err)
    }

    /// The live data file path, or `NotAuthenticated` if the grant was lost.
    fn live_data_path(&mut self) -> Result<PathBuf> {
        match self.data_path() {
            Some(path) if self.is_authenticated() => Ok(path),
            Some(_) => {
                warn!(adapter = %self.name, "lost access to sync folder");
                self.directory = None;
                Err(SyncError::NotAuthenticated)
            }
            None => Err(SyncError::NotAuthenticated),
        }
    }
}

impl SyncAdapter for LocalDirAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_authenticated(&self) -> bool {
        self.directory.as_deref().is_some_and(Path::is_dir)
    }

    fn authenticate(&mut self) -> Result<bool> {
        if self.is_authenticated() || self.try_restore_permission() {
            return Ok(true);
        }

        let Some(directory) = self.picker.pick_directory()? else {
            debug!("folder selection cancelled");
            return Ok(false);
        };

        if !has_read_write(&directory) {
            warn!(dir = %directory.display(), "no read/write access to chosen folder");
            return Ok(false);
        }

        self.write_handle(&directory)?;
        self.directory = Some(directory);
        Ok(true)
    }

    fn resume(&mut self) -> Result<bool> {
        Ok(self.is_authenticated() || self.try_restore_permission())
    }

    fn load_data(&mut self) -> Result<Option<SyncBlob>> {
        let path = self.live_data_path()?;
        if !path.exists() {
            return Ok(None);
        }

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => return Err(self.io_failure(format!("cannot read {}", path.display()), e)),
        };
        let blob = SyncBlob::from_json(&content).map_err(|e| {
            SyncError::backend_with(&self.name, format!("{} is not valid sync data", path.display()), e)
        })?;
        debug!(path = %path.display(), "loaded sync blob");
        Ok(Some(blob))
    }

    fn save_data(&mut self, blob: &SyncBlob) -> Result<()> {
        let path = self.live_data_path()?;
        let content = blob.to_json()?;
        if let Err(e) = write_atomic(&path, &content) {
            return Err(self.io_failure(format!("cannot write {}", path.display()), e));
        }
        debug!(path = %path.display(), "saved sync blob");
        Ok(())
    }

    fn revision(&mut self) -> Result<Option<String>> {
        let path = self.live_data_path()?;
        let meta = match fs::metadata(&path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_failure("cannot stat data file".to_string(), e)),
        };
        let modified_ms = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis())
            .unwrap_or_default();
        Ok(Some(format!("{}-{}", modified_ms, meta.len())))
    }

    fn forget(&mut self) {
        self.directory = None;
    }

    fn sign_out(&mut self) -> Result<()> {
        self.forget();
        if self.handle_file.exists() {
            fs::remove_file(&self.handle_file)?;
        }
        Ok(())
    }

    fn display_metadata(&self) -> Option<&dyn SupportsDisplayMetadata> {
        Some(self)
    }
}

impl SupportsDisplayMetadata for LocalDirAdapter {
    fn display_name(&self) -> String {
        "Local folder".to_string()
    }

    fn location(&self) -> Option<String> {
        self.directory
            .clone()
            .or_else(|| self.read_handle().map(|h| h.directory))
            .map(|dir| dir.display().to_string())
    }
}

/// A directory counts as granted when it exists and a file can be created in it.
fn has_read_write(dir: &Path) -> bool {
    if !dir.is_dir() || fs::read_dir(dir).is_err() {
        return false;
    }
    let marker = dir.join(format!(".versesync-access-{}", Uuid::new_v4()));
    match fs::write(&marker, b"") {
        Ok(()) => {
            let _ = fs::remove_file(&marker);
            true
        }
        Err(_) => false,
    }
}

fn write_atomic(target: &Path, content: &str) -> std::io::Result<()> {
    let parent = target.parent().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} has no parent", target.display()),
        )
    })?;
    if !parent.exists() {
        fs::create_dir_all(parent)?;
    }
    let tmp = parent.join(format!(".sync-{}.tmp", Uuid::new_v4()));
    fs::write(&tmp, content)?;
    fs::rename(&tmp, target)?;
    Ok(())
}
