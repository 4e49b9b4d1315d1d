//! # Storage Backend Adapters
//!
//! An adapter moves one [`SyncBlob`] to and from one storage provider. The
//! engine only ever talks to the [`SyncAdapter`] trait; which provider sits
//! behind it is a runtime choice made by name.
//!
//! ## Contract
//!
//! - `authenticate` may be interactive (folder picker, OAuth consent). When the
//!   adapter is already authenticated it returns `true` without prompting.
//! - `resume` is the silent half of `authenticate`: restore a stored grant or
//!   refresh a token, never prompt.
//! - `load_data` returns `Ok(None)` when no blob exists yet. Read failures are
//!   [`SyncError::Backend`](crate::error::SyncError::Backend); a lost grant is
//!   [`SyncError::NotAuthenticated`](crate::error::SyncError::NotAuthenticated)
//!   and flips `is_authenticated` to false.
//! - `save_data` replaces the whole blob. Writing the same blob twice has the
//!   same effect as writing it once.
//! - `forget` drops in-memory credentials only; stored grants survive so the
//!   next session can `resume`. `sign_out` removes those too.
//!
//! ## Capabilities
//!
//! Backend-specific details (folder path, storage space) are exposed through
//! the optional [`SupportsDisplayMetadata`] capability, queried with
//! [`SyncAdapter::display_metadata`] instead of downcasting.
//!
//! ## Implementations
//!
//! - [`local_dir::LocalDirAdapter`]: a user-granted folder on disk.
//! - [`drive::DriveAdapter`]: the hidden app-data space of Google Drive.
//! - [`memory::MemAdapter`]: in-process, for tests.

use crate::error::Result;
use crate::model::SyncBlob;

pub mod drive;
pub mod drive_http;
pub mod local_dir;
pub mod memory;

/// File name used by both backends unless configured otherwise.
pub const DEFAULT_DATA_FILE: &str = "bible-sync-data.json";

pub trait SyncAdapter {
    /// Stable identifier, used as the registry key.
    fn name(&self) -> &str;

    fn is_authenticated(&self) -> bool;

    /// Reaches a state where load/save succeed, prompting the user if needed.
    /// `Ok(false)` means the user declined or the grant was refused.
    fn authenticate(&mut self) -> Result<bool>;

    /// Non-interactive authentication from stored grants.
    fn resume(&mut self) -> Result<bool> {
        Ok(self.is_authenticated())
    }

    fn load_data(&mut self) -> Result<Option<SyncBlob>>;

    fn save_data(&mut self, blob: &SyncBlob) -> Result<()>;

    /// Opaque token that changes whenever the remote blob changes.
    /// `None` when the blob does not exist or the backend cannot tell.
    fn revision(&mut self) -> Result<Option<String>> {
        Ok(None)
    }

    /// Drops in-memory authentication state.
    fn forget(&mut self);

    /// Drops in-memory state and deletes stored credentials.
    fn sign_out(&mut self) -> Result<()> {
        self.forget();
        Ok(())
    }

    fn display_metadata(&self) -> Option<&dyn SupportsDisplayMetadata> {
        None
    }
}

/// Optional capability: human-facing details about where data is stored.
pub trait SupportsDisplayMetadata {
    fn display_name(&self) -> String;

    /// Folder path, account or storage space, when known.
    fn location(&self) -> Option<String>;
}
