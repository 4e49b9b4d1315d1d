//! # Sync Engine
//!
//! The engine owns the adapter registry and drives one sync at a time against
//! the active adapter:
//!
//! ```text
//! local data ──► from_local ──┐
//!                             ├─► merge_blobs ──► conflicts? ──► yes: return, no write
//! adapter.load_data() ────────┘                       │
//!                                                     no
//!                                                     ▼
//!                                 revision check ──► adapter.save_data(merged)
//! ```
//!
//! Writing merged data back into the local stores is the caller's job
//! ([`crate::api::SyncApi`] does it), and only after `sync` returned
//! [`SyncOutcome::Synced`]. A failed sync therefore leaves both sides as they
//! were.
//!
//! ## Write Races
//!
//! Two clients can load the same remote blob and both save. Before saving,
//! the engine asks the adapter for the current [`SyncAdapter::revision`] and
//! compares it with the one seen before loading. A mismatch aborts with
//! [`SyncError::RemoteChanged`]; running sync again merges the newer remote.
//!
//! ## State
//!
//! [`SyncState`] records where the last operation left the engine.
//! `Synced`, `ConflictsPending` and `Failed` are idle states: a new sync can
//! start from any of them.

use crate::adapters::SyncAdapter;
use crate::error::{Result, SyncError};
use crate::merge::{merge_blobs, Conflict};
use crate::model::{BlobStats, LocalData, SyncBlob};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncState {
    Unauthenticated,
    Authenticating,
    Authenticated,
    Syncing,
    Synced,
    ConflictsPending,
    Failed,
}

impl SyncState {
    /// Whether the active adapter was authenticated when this state was entered.
    pub fn is_connected(self) -> bool {
        !matches!(self, SyncState::Unauthenticated | SyncState::Authenticating)
    }
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SyncState::Unauthenticated => "not connected",
            SyncState::Authenticating => "connecting",
            SyncState::Authenticated => "connected",
            SyncState::Syncing => "syncing",
            SyncState::Synced => "synced",
            SyncState::ConflictsPending => "conflicts pending",
            SyncState::Failed => "failed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Synced {
        last_synced: DateTime<Utc>,
        merged: SyncBlob,
        /// No remote blob existed before this sync.
        first_sync: bool,
    },
    /// Same-stamp divergences; nothing was written anywhere.
    Conflicts { conflicts: Vec<Conflict> },
}

impl SyncOutcome {
    pub fn stats(&self) -> Option<BlobStats> {
        match self {
            SyncOutcome::Synced { merged, .. } => Some(merged.stats()),
            SyncOutcome::Conflicts { .. } => None,
        }
    }
}

type Clock = Box<dyn Fn() -> DateTime<Utc>>;

pub struct SyncEngine {
    adapters: Vec<Box<dyn SyncAdapter>>,
    active: Option<usize>,
    state: SyncState,
    clock: Clock,
}

impl Default for SyncEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncEngine {
    pub fn new() -> Self {
        Self::with_clock(Box::new(Utc::now))
    }

    /// Engine with an injected clock, used to stamp `lastSynced`.
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            adapters: Vec::new(),
            active: None,
            state: SyncState::Unauthenticated,
            clock,
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.adapters.iter().position(|a| a.name() == name)
    }

    /// Adds an adapter. Re-registering a name replaces the earlier instance
    /// in place, keeping its position and active status.
    pub fn register_adapter(&mut self, adapter: Box<dyn SyncAdapter>) -> Result<()> {
        match self.position(adapter.name()) {
            Some(idx) => {
                debug!(adapter = adapter.name(), "replacing registered adapter");
                self.adapters[idx] = adapter;
                if self.active == Some(idx) {
                    self.state = self.idle_state();
                }
            }
            None => self.adapters.push(adapter),
        }
        Ok(())
    }

    /// Like [`register_adapter`](Self::register_adapter) but rejects a name
    /// that is already taken.
    pub fn register_unique(&mut self, adapter: Box<dyn SyncAdapter>) -> Result<()> {
        if self.position(adapter.name()).is_some() {
            return Err(SyncError::DuplicateAdapter(adapter.name().to_string()));
        }
        self.register_adapter(adapter)
    }

    pub fn set_adapter(&mut self, name: &str) -> Result<()> {
        let idx = self
            .position(name)
            .ok_or_else(|| SyncError::UnknownAdapter(name.to_string()))?;
        if let Some(prev) = self.active.filter(|&prev| prev != idx) {
            self.adapters[prev].forget();
        }
        self.active = Some(idx);
        self.state = self.idle_state();
        debug!(adapter = name, "selected sync adapter");
        Ok(())
    }

    pub fn current_adapter(&self) -> Option<&dyn SyncAdapter> {
        self.active.map(|idx| self.adapters[idx].as_ref())
    }

    pub fn available_adapters(&self) -> Vec<String> {
        self.adapters.iter().map(|a| a.name().to_string()).collect()
    }

    pub fn adapter(&self, name: &str) -> Option<&dyn SyncAdapter> {
        self.position(name).map(|idx| self.adapters[idx].as_ref())
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn is_authenticated(&self) -> bool {
        self.current_adapter()
            .is_some_and(|adapter| adapter.is_authenticated())
    }

    fn idle_state(&self) -> SyncState {
        if self.is_authenticated() {
            SyncState::Authenticated
        } else {
            SyncState::Unauthenticated
        }
    }

    fn selected_mut(&mut self) -> Result<&mut dyn SyncAdapter> {
        let idx = self.active.ok_or(SyncError::NoAdapterSelected)?;
        Ok(self.adapters[idx].as_mut())
    }

    /// The active adapter, provided it holds a live grant.
    ///
    /// A lapsed grant (an expired token, a folder permission that needs
    /// re-checking) gets one silent [`SyncAdapter::resume`] before the caller
    /// is told to authenticate again.
    fn connected_mut(&mut self) -> Result<&mut dyn SyncAdapter> {
        let Some(idx) = self.active else {
            return Err(SyncError::NotAuthenticated);
        };
        if !self.adapters[idx].is_authenticated() {
            debug!(adapter = self.adapters[idx].name(), "grant lapsed, resuming silently");
            let resumed = self.adapters[idx].resume();
            if !self.track(resumed)? {
                self.state = SyncState::Unauthenticated;
                return Err(SyncError::NotAuthenticated);
            }
            if !self.state.is_connected() {
                self.state = SyncState::Authenticated;
            }
        }
        Ok(self.adapters[idx].as_mut())
    }

    /// Runs the active adapter's (possibly interactive) authentication.
    pub fn authenticate(&mut self) -> Result<bool> {
        self.state = SyncState::Authenticating;
        let result = self.selected_mut().and_then(|adapter| adapter.authenticate());
        self.state = match &result {
            Ok(true) => SyncState::Authenticated,
            _ => SyncState::Unauthenticated,
        };
        if let Ok(true) = result {
            info!(adapter = self.current_name(), "authenticated");
        }
        result
    }

    /// Restores the active adapter's stored grant without prompting.
    pub fn resume(&mut self) -> Result<bool> {
        let resumed = self.selected_mut()?.resume()?;
        self.state = self.idle_state();
        Ok(resumed)
    }

    fn current_name(&self) -> &str {
        self.current_adapter().map_or("none", |a| a.name())
    }

    /// Clears the selection and the in-memory grant. Remote data is untouched.
    pub fn disconnect(&mut self) {
        if let Some(idx) = self.active.take() {
            self.adapters[idx].forget();
            debug!(adapter = self.adapters[idx].name(), "disconnected");
        }
        self.state = SyncState::Unauthenticated;
    }

    /// Disconnects and deletes the active adapter's stored credentials.
    pub fn sign_out(&mut self) -> Result<()> {
        if let Some(idx) = self.active {
            self.adapters[idx].sign_out()?;
        }
        self.disconnect();
        Ok(())
    }

    /// `lastSynced` of the remote blob. Requires a load.
    pub fn last_sync_time(&mut self) -> Result<Option<DateTime<Utc>>> {
        let loaded = self.connected_mut()?.load_data();
        let remote = self.track(loaded)?;
        Ok(remote.and_then(|blob| blob.last_synced))
    }

    /// The remote blob, for a caller-side wholesale overwrite of local data.
    pub fn restore(&mut self) -> Result<Option<SyncBlob>> {
        let loaded = self.connected_mut()?.load_data();
        let remote = self.track(loaded)?;
        match &remote {
            Some(blob) => info!(stats = %blob.stats(), "loaded remote blob for restore"),
            None => info!("nothing to restore, remote is empty"),
        }
        Ok(remote)
    }

    /// Merges `local` with the remote blob and writes the result back to the
    /// remote when there are no conflicts.
    pub fn sync(&mut self, local: &LocalData) -> Result<SyncOutcome> {
        let now = (self.clock)();
        self.connected_mut()?;
        self.state = SyncState::Syncing;

        let result = self.run_sync(local, now);
        self.state = match &result {
            Ok(SyncOutcome::Synced { .. }) => SyncState::Synced,
            Ok(SyncOutcome::Conflicts { .. }) => SyncState::ConflictsPending,
            Err(SyncError::NotAuthenticated) => SyncState::Unauthenticated,
            Err(_) => SyncState::Failed,
        };
        result
    }

    fn run_sync(&mut self, local: &LocalData, now: DateTime<Utc>) -> Result<SyncOutcome> {
        let adapter = self.connected_mut()?;
        let name = adapter.name().to_string();

        let seen = adapter.revision()?;
        let remote = adapter.load_data()?;
        let first_sync = remote.is_none();
        let remote = remote.unwrap_or_else(SyncBlob::empty);

        let output = merge_blobs(&SyncBlob::from_local(local), &remote, now);
        if output.has_conflicts() {
            warn!(
                adapter = %name,
                count = output.conflicts.len(),
                "sync stopped on conflicts, nothing written"
            );
            return Ok(SyncOutcome::Conflicts {
                conflicts: output.conflicts,
            });
        }

        if adapter.revision()? != seen {
            warn!(adapter = %name, "remote changed while merging");
            return Err(SyncError::RemoteChanged { adapter: name });
        }

        adapter.save_data(&output.blob)?;
        let last_synced = output.blob.last_synced.unwrap_or(now);
        info!(
            adapter = %name,
            first_sync,
            stats = %output.blob.stats(),
            "sync complete"
        );
        Ok(SyncOutcome::Synced {
            last_synced,
            merged: output.blob,
            first_sync,
        })
    }

    /// Maps permission loss to the unauthenticated state.
    fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        if matches!(result, Err(SyncError::NotAuthenticated)) {
            self.state = SyncState::Unauthenticated;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{MemAdapter, MemRemoteHandle};
    use crate::merge::ConflictKind;
    use crate::model::{translation_key, Highlight, Note, ReadingProgress};
    use chrono::{NaiveDate, TimeZone};

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn engine_with(names: &[&str]) -> (SyncEngine, Vec<MemRemoteHandle>) {
        let mut engine = SyncEngine::with_clock(Box::new(fixed_now));
        let mut handles = Vec::new();
        for name in names {
            let adapter = MemAdapter::new(name);
            handles.push(adapter.handle());
            engine.register_adapter(Box::new(adapter)).unwrap();
        }
        (engine, handles)
    }

    fn connected() -> (SyncEngine, MemRemoteHandle) {
        let (mut engine, mut handles) = engine_with(&["mem"]);
        engine.set_adapter("mem").unwrap();
        assert!(engine.authenticate().unwrap());
        (engine, handles.remove(0))
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn registry_preserves_order_and_replaces_in_place() {
        let (mut engine, _) = engine_with(&["b", "a", "c"]);
        engine.register_adapter(Box::new(MemAdapter::new("a"))).unwrap();
        assert_eq!(engine.available_adapters(), vec!["b", "a", "c"]);
    }

    #[test]
    fn register_unique_rejects_duplicates() {
        let (mut engine, _) = engine_with(&["a"]);
        assert!(matches!(
            engine.register_unique(Box::new(MemAdapter::new("a"))),
            Err(SyncError::DuplicateAdapter(name)) if name == "a"
        ));
    }

    #[test]
    fn set_unknown_adapter_fails() {
        let (mut engine, _) = engine_with(&["a"]);
        assert!(matches!(
            engine.set_adapter("nope"),
            Err(SyncError::UnknownAdapter(_))
        ));
        assert!(engine.current_adapter().is_none());
    }

    #[test]
    fn authenticate_without_selection_fails() {
        let (mut engine, _) = engine_with(&["a"]);
        assert!(matches!(
            engine.authenticate(),
            Err(SyncError::NoAdapterSelected)
        ));
    }

    #[test]
    fn switching_adapters_forgets_previous_grant() {
        let (mut engine, _) = engine_with(&["a", "b"]);
        engine.set_adapter("a").unwrap();
        engine.authenticate().unwrap();
        engine.set_adapter("b").unwrap();

        assert!(!engine.adapter("a").unwrap().is_authenticated());
        assert_eq!(engine.current_adapter().unwrap().name(), "b");
        assert_eq!(engine.state(), SyncState::Unauthenticated);
    }

    #[test]
    fn declined_grant_stays_unauthenticated() {
        let (mut engine, handles) = engine_with(&["a"]);
        handles[0].refuse_grant(true);
        engine.set_adapter("a").unwrap();
        assert!(!engine.authenticate().unwrap());
        assert_eq!(engine.state(), SyncState::Unauthenticated);
    }

    #[test]
    fn newer_remote_highlight_wins() {
        let (mut engine, remote) = connected();
        let key = translation_key("Genesis", 1, 1, "KJV");
        let mut blob = SyncBlob::empty();
        blob.highlights.insert(
            key.clone(),
            Highlight::new("Genesis", 1, 1, "blue", "KJV", 2_000),
        );
        remote.set_blob(blob);

        let local = LocalData {
            highlights: vec![Highlight::new("Genesis", 1, 1, "yellow", "KJV", 1_000)],
            ..Default::default()
        };
        let outcome = engine.sync(&local).unwrap();

        let SyncOutcome::Synced { merged, .. } = outcome else {
            panic!("expected a clean sync");
        };
        assert_eq!(merged.highlights[&key].color, "blue");
        assert_eq!(merged.highlights[&key].timestamp, 2_000);
        assert_eq!(remote.blob().unwrap().highlights[&key].color, "blue");
        assert_eq!(engine.state(), SyncState::Synced);
    }

    #[test]
    fn same_stamp_note_conflict_writes_nothing() {
        let (mut engine, remote) = connected();
        let key = translation_key("John", 3, 16, "KJV");
        let mut blob = SyncBlob::empty();
        blob.notes
            .insert(key.clone(), Note::new("John", 3, 16, "remote", "KJV", 5_000));
        remote.set_blob(blob.clone());
        let saves = remote.save_count();

        let local = LocalData {
            notes: vec![Note::new("John", 3, 16, "local", "KJV", 5_000)],
            ..Default::default()
        };
        let outcome = engine.sync(&local).unwrap();

        assert_eq!(
            outcome,
            SyncOutcome::Conflicts {
                conflicts: vec![Conflict {
                    kind: ConflictKind::Note,
                    key,
                    local_timestamp: 5_000,
                    remote_timestamp: 5_000,
                }]
            }
        );
        assert_eq!(remote.save_count(), saves);
        assert_eq!(remote.blob(), Some(blob));
        assert_eq!(engine.state(), SyncState::ConflictsPending);
    }

    #[test]
    fn first_sync_writes_local_verbatim() {
        let (mut engine, remote) = connected();
        let local = LocalData {
            highlights: vec![Highlight::new("Psalms", 23, 1, "green", "ESV", 10)],
            notes: vec![Note::new("Psalms", 23, 4, "comfort", "ESV", 20)],
            reading_progress: vec![ReadingProgress::new(date("2024-01-01"), true, false, 30)],
            ..Default::default()
        };

        let outcome = engine.sync(&local).unwrap();

        let SyncOutcome::Synced {
            merged,
            first_sync,
            last_synced,
        } = outcome
        else {
            panic!("expected a clean sync");
        };
        assert!(first_sync);
        assert_eq!(last_synced, fixed_now());
        assert_eq!(merged.to_local(), local);
        assert_eq!(remote.blob(), Some(merged));
    }

    #[test]
    fn disconnect_then_sync_is_not_authenticated() {
        let (mut engine, _) = connected();
        engine.disconnect();
        assert!(matches!(
            engine.sync(&LocalData::default()),
            Err(SyncError::NotAuthenticated)
        ));
        assert!(engine.current_adapter().is_none());
    }

    #[test]
    fn restore_returns_remote_blob() {
        let (mut engine, remote) = connected();
        let mut blob = SyncBlob::empty();
        blob.reading_progress = vec![ReadingProgress::new(date("2024-01-01"), true, false, 1)];
        remote.set_blob(blob.clone());

        assert_eq!(engine.restore().unwrap(), Some(blob));
    }

    #[test]
    fn last_sync_time_reads_remote() {
        let (mut engine, remote) = connected();
        assert_eq!(engine.last_sync_time().unwrap(), None);

        engine.sync(&LocalData::default()).unwrap();
        assert_eq!(engine.last_sync_time().unwrap(), Some(fixed_now()));
        assert!(remote.load_count() >= 2);
    }

    #[test]
    fn last_synced_never_moves_backwards() {
        let (mut engine, remote) = connected();
        let later = fixed_now() + chrono::Duration::hours(1);
        let mut blob = SyncBlob::empty();
        blob.last_synced = Some(later);
        remote.set_blob(blob);

        let SyncOutcome::Synced { last_synced, .. } = engine.sync(&LocalData::default()).unwrap()
        else {
            panic!("expected a clean sync");
        };
        assert_eq!(last_synced, later);
    }

    #[test]
    fn concurrent_write_aborts_without_saving() {
        let (mut engine, remote) = connected();
        remote.set_blob(SyncBlob::empty());
        let mut other = SyncBlob::empty();
        other.notes.insert(
            translation_key("Ruth", 1, 16, "NIV"),
            Note::new("Ruth", 1, 16, "where you go", "NIV", 7),
        );
        remote.write_after_next_load(other.clone());

        let result = engine.sync(&LocalData::default());

        assert!(matches!(result, Err(SyncError::RemoteChanged { .. })));
        assert_eq!(remote.blob(), Some(other));
        assert_eq!(remote.save_count(), 0);
        assert_eq!(engine.state(), SyncState::Failed);

        // Second attempt picks up the other client's note.
        let SyncOutcome::Synced { merged, .. } = engine.sync(&LocalData::default()).unwrap()
        else {
            panic!("expected a clean sync");
        };
        assert_eq!(merged.notes.len(), 1);
    }

    #[test]
    fn backend_failure_marks_failed_and_recovers() {
        let (mut engine, remote) = connected();
        remote.set_simulate_save_error(true);
        assert!(matches!(
            engine.sync(&LocalData::default()),
            Err(SyncError::Backend { .. })
        ));
        assert_eq!(engine.state(), SyncState::Failed);
        assert!(remote.blob().is_none());

        remote.set_simulate_save_error(false);
        engine.sync(&LocalData::default()).unwrap();
        assert_eq!(engine.state(), SyncState::Synced);
    }

    #[test]
    fn revoked_grant_surfaces_as_unauthenticated() {
        let (mut engine, remote) = connected();
        remote.revoke();
        assert!(matches!(
            engine.sync(&LocalData::default()),
            Err(SyncError::NotAuthenticated)
        ));
        assert_eq!(engine.state(), SyncState::Unauthenticated);
    }

    #[test]
    fn repeated_sync_is_stable() {
        let (mut engine, remote) = connected();
        let local = LocalData {
            highlights: vec![Highlight::new("Genesis", 1, 1, "red", "KJV", 1)],
            ..Default::default()
        };
        engine.sync(&local).unwrap();
        let first = remote.blob();
        engine.sync(&local).unwrap();
        assert_eq!(remote.blob(), first);
    }
}
