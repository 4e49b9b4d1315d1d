//! Google Drive backend.
//!
//! The blob is stored in Drive's `appDataFolder` space: a per-application area
//! that never shows up in the user's file listing, so the data file cannot
//! collide with anything the user keeps in Drive.
//!
//! ## Token Lifecycle
//!
//! 1. **Grant**: a [`GrantProvider`] runs the consent step and returns an
//!    authorization code, which is exchanged for an access + refresh token.
//! 2. **Persist**: the token is written to `token_file` and reloaded by the next
//!    session.
//! 3. **Refresh**: an expired access token is refreshed silently with the
//!    refresh token. Only if that fails is the user prompted again.
//! 4. **Revocation**: a `401` from Drive drops the in-memory token, so the
//!    adapter reports itself unauthenticated.
//!
//! ## Duplicate Files
//!
//! Two clients syncing for the first time at the same moment can both create
//! the data file. Reads then pick the most recently modified copy and log a
//! warning; writes go to that same copy.
//!
//! HTTP lives behind the [`DriveApi`] trait; [`super::drive_http`] provides
//! the production implementation.

use super::{SupportsDisplayMetadata, SyncAdapter, DEFAULT_DATA_FILE};
use crate::error::{Result, SyncError};
use crate::model::SyncBlob;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const DRIVE_ADAPTER: &str = "google-drive";

/// Tokens this close to expiry are treated as expired.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum DriveApiError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("Google Drive client credentials are not configured")]
    NotConfigured,

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("request failed: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("unexpected response: {0}")]
    Decode(String),
}

pub type ApiResult<T> = std::result::Result<T, DriveApiError>;

/// Token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Metadata of a file in the app-data space.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub modified_time: Option<DateTime<Utc>>,
    /// Monotonic file version maintained by Drive.
    #[serde(default)]
    pub version: Option<String>,
}

/// The slice of the Drive and OAuth endpoints this backend needs.
pub trait DriveApi {
    fn check_configured(&self) -> ApiResult<()> {
        Ok(())
    }

    fn authorization_url(&self, redirect_uri: &str, state: &str) -> String;

    fn exchange_code(&self, code: &str, redirect_uri: &str) -> ApiResult<TokenGrant>;

    fn refresh_token(&self, refresh_token: &str) -> ApiResult<TokenGrant>;

    /// Files named `name` in the app-data space, trashed files excluded.
    fn list_files(&self, access_token: &str, name: &str) -> ApiResult<Vec<DriveFile>>;

    fn download(&self, access_token: &str, file_id: &str) -> ApiResult<String>;

    fn create_file(&self, access_token: &str, name: &str, content: &str) -> ApiResult<DriveFile>;

    fn update_file(&self, access_token: &str, file_id: &str, content: &str)
        -> ApiResult<DriveFile>;
}

/// Result of the interactive consent step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationGrant {
    pub code: String,
    pub redirect_uri: String,
}

pub trait GrantProvider {
    /// Runs the consent step. `authorize(redirect_uri, state)` builds the URL
    /// to show the user. Returns `None` when the user declined.
    fn request_grant(
        &mut self,
        authorize: &dyn Fn(&str, &str) -> String,
    ) -> Result<Option<AuthorizationGrant>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct StoredToken {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: DateTime<Utc>,
}

impl StoredToken {
    fn from_grant(grant: TokenGrant, previous_refresh: Option<String>) -> Self {
        Self {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token.or(previous_refresh),
            expires_at: Utc::now() + Duration::seconds(grant.expires_in),
        }
    }

    fn is_fresh(&self) -> bool {
        self.expires_at > Utc::now() + Duration::seconds(EXPIRY_MARGIN_SECS)
    }
}

pub struct DriveAdapter {
    name: String,
    file_name: String,
    token_file: PathBuf,
    api: Box<dyn DriveApi>,
    grant: Box<dyn GrantProvider>,
    token: Option<StoredToken>,
    file_id: Option<String>,
}

impl DriveAdapter {
    /// Builds the adapter and restores a token persisted by an earlier session.
    pub fn new(token_file: PathBuf, api: Box<dyn DriveApi>, grant: Box<dyn GrantProvider>) -> Self {
        let mut adapter = Self {
            name: DRIVE_ADAPTER.to_string(),
            file_name: DEFAULT_DATA_FILE.to_string(),
            token_file,
            api,
            grant,
            token: None,
            file_id: None,
        };
        adapter.token = adapter.read_token();
        adapter
    }

    pub fn with_file_name(mut self, file_name: &str) -> Self {
        self.file_name = file_name.to_string();
        self
    }

    fn read_token(&self) -> Option<StoredToken> {
        let content = fs::read_to_string(&self.token_file).ok()?;
        match serde_json::from_str(&content) {
            Ok(token) => Some(token),
            Err(e) => {
                warn!(file = %self.token_file.display(), error = %e, "ignoring unreadable drive token");
                None
            }
        }
    }

    fn store_token(&mut self, token: StoredToken) -> Result<()> {
        let content = serde_json::to_string_pretty(&token)?;
        if let Some(parent) = self.token_file.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self
            .token_file
            .with_file_name(format!(".token-{}.tmp", Uuid::new_v4()));
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &self.token_file)?;
        self.token = Some(token);
        Ok(())
    }

    /// Refreshes an expired token without user interaction.
    fn refresh_silently(&mut self) -> Result<bool> {
        let Some(refresh) = self.token.as_ref().and_then(|t| t.refresh_token.clone()) else {
            return Ok(false);
        };
        match self.api.refresh_token(&refresh) {
            Ok(grant) => {
                debug!("refreshed drive access token");
                self.store_token(StoredToken::from_grant(grant, Some(refresh)))?;
                Ok(true)
            }
            Err(e) => {
                warn!(error = %e, "drive token refresh failed");
                Ok(false)
            }
        }
    }

    fn access_token(&mut self) -> Result<String> {
        if !self.is_authenticated() && !self.refresh_silently()? {
            return Err(SyncError::NotAuthenticated);
        }
        self.token
            .as_ref()
            .map(|t| t.access_token.clone())
            .ok_or(SyncError::NotAuthenticated)
    }

    fn api_error(&mut self, action: &str, err: DriveApiError) -> SyncError {
        match err {
            DriveApiError::Unauthorized => {
                warn!("drive rejected the access token");
                self.token = None;
                self.file_id = None;
                SyncError::NotAuthenticated
            }
            DriveApiError::NotConfigured => SyncError::Config(err.to_string()),
            other => SyncError::backend_with(&self.name, action, other),
        }
    }

    /// The current data file, newest copy first if there are duplicates.
    fn find_file(&mut self, token: &str) -> Result<Option<DriveFile>> {
        let mut files = match self.api.list_files(token, &self.file_name) {
            Ok(files) => files,
            Err(e) => return Err(self.api_error("cannot list app data", e)),
        };
        if files.len() > 1 {
            warn!(
                count = files.len(),
                file = %self.file_name,
                "found duplicate sync files in drive, using the newest"
            );
        }
        files.sort_by(|a, b| b.modified_time.cmp(&a.modified_time));
        let newest = files.into_iter().next();
        self.file_id = newest.as_ref().map(|f| f.id.clone());
        Ok(newest)
    }
}

impl SyncAdapter for DriveAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_authenticated(&self) -> bool {
        self.token.as_ref().is_some_and(StoredToken::is_fresh)
    }

    fn authenticate(&mut self) -> Result<bool> {
        if self.is_authenticated() {
            return Ok(true);
        }
        if let Err(e) = self.api.check_configured() {
            return Err(self.api_error("cannot authenticate", e));
        }
        if self.refresh_silently()? {
            return Ok(true);
        }

        let api = &self.api;
        let authorize = |redirect_uri: &str, state: &str| api.authorization_url(redirect_uri, state);
        let Some(grant) = self.grant.request_grant(&authorize)? else {
            debug!("drive consent declined");
            return Ok(false);
        };

        let previous_refresh = self.token.as_ref().and_then(|t| t.refresh_token.clone());
        let token = match self.api.exchange_code(&grant.code, &grant.redirect_uri) {
            Ok(token) => token,
            Err(e) => return Err(self.api_error("token exchange failed", e)),
        };
        self.store_token(StoredToken::from_grant(token, previous_refresh))?;
        info!("connected to google drive");
        Ok(true)
    }

    fn resume(&mut self) -> Result<bool> {
        Ok(self.is_authenticated() || self.refresh_silently()?)
    }

    fn load_data(&mut self) -> Result<Option<SyncBlob>> {
        let token = self.access_token()?;
        let Some(file) = self.find_file(&token)? else {
            return Ok(None);
        };

        let content = match self.api.download(&token, &file.id) {
            Ok(content) => content,
            Err(e) => return Err(self.api_error("cannot download sync file", e)),
        };
        let blob = SyncBlob::from_json(&content).map_err(|e| {
            SyncError::backend_with(&self.name, "drive file is not valid sync data", e)
        })?;
        debug!(file_id = %file.id, "loaded sync blob from drive");
        Ok(Some(blob))
    }

    fn save_data(&mut self, blob: &SyncBlob) -> Result<()> {
        let token = self.access_token()?;
        let content = blob.to_json()?;

        let file_id = match self.file_id.clone() {
            Some(id) => Some(id),
            None => self.find_file(&token)?.map(|f| f.id),
        };

        let saved = match file_id {
            Some(id) => self.api.update_file(&token, &id, &content),
            None => self.api.create_file(&token, &self.file_name, &content),
        };
        match saved {
            Ok(file) => {
                debug!(file_id = %file.id, "saved sync blob to drive");
                self.file_id = Some(file.id);
                Ok(())
            }
            Err(e) => Err(self.api_error("cannot upload sync file", e)),
        }
    }

    fn revision(&mut self) -> Result<Option<String>> {
        let token = self.access_token()?;
        Ok(self.find_file(&token)?.map(|f| {
            f.version
                .or_else(|| f.modified_time.map(|t| t.to_rfc3339()))
                .unwrap_or(f.id)
        }))
    }

    fn forget(&mut self) {
        self.token = None;
        self.file_id = None;
    }

    fn sign_out(&mut self) -> Result<()> {
        self.forget();
        if self.token_file.exists() {
            fs::remove_file(&self.token_file)?;
        }
        Ok(())
    }

    fn display_metadata(&self) -> Option<&dyn SupportsDisplayMetadata> {
        Some(self)
    }
}

impl SupportsDisplayMetadata for DriveAdapter {
    fn display_name(&self) -> String {
        "Google Drive".to_string()
    }

    fn location(&self) -> Option<String> {
        Some(format!("appDataFolder/{}", self.file_name))
    }
}
