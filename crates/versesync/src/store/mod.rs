//! # Local Entity Stores
//!
//! The engine never reads the app's data directly. Each collection lives in an
//! [`EntityStore`], and [`LocalLibrary`] bundles the four of them so a sync can
//! take a [`LocalData`] snapshot and write merged results back.
//!
//! ## Record Identity
//!
//! Stores key records by [`Record::record_id`], which matches the blob key, so a
//! verse carries one highlight and one note per translation on both sides.
//!
//! | Record            | Local identity             | Blob key                   |
//! |-------------------|----------------------------|----------------------------|
//! | `Highlight`       | `{reference}\|{version}`   | `{reference}\|{version}`   |
//! | `Note`            | `{reference}\|{version}`   | `{reference}\|{version}`   |
//! | `HistoryEntry`    | `id`                       | `id`                       |
//! | `ReadingProgress` | `date`                     | `date`                     |
//!
//! ## Write-back vs Restore
//!
//! - [`LocalLibrary::apply`] upserts the merged blob. Records the blob does not
//!   mention survive, except verse history: the merged history is the
//!   authoritative, already-truncated list and replaces the local one.
//! - [`LocalLibrary::replace_all`] clears every store and imports the blob.
//!   Nothing local survives.
//!
//! ## Implementations
//!
//! - [`fs::JsonFileStore`]: one JSON array file per collection.
//! - [`memory::MemStore`]: for tests.
//!
//! ## Storage Layout
//!
//! ```text
//! <data dir>/library/
//! ├── highlights.json
//! ├── notes.json
//! ├── verse-history.json
//! └── reading-progress.json
//! ```

use crate::error::Result;
use crate::model::{Highlight, HistoryEntry, LocalData, Note, ReadingProgress, SyncBlob};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use tracing::debug;

pub mod fs;
pub mod memory;

pub trait Record: Serialize + DeserializeOwned + Clone {
    /// Identity within a local store. `put` replaces a record with the same id.
    fn record_id(&self) -> String;
}

impl Record for Highlight {
    fn record_id(&self) -> String {
        format!("{}|{}", self.reference, self.version)
    }
}

impl Record for Note {
    fn record_id(&self) -> String {
        format!("{}|{}", self.reference, self.version)
    }
}

impl Record for HistoryEntry {
    fn record_id(&self) -> String {
        self.id.clone()
    }
}

impl Record for ReadingProgress {
    fn record_id(&self) -> String {
        self.date.to_string()
    }
}

/// Contract of a per-collection local store.
pub trait EntityStore<T: Record> {
    fn get_all(&self) -> Result<Vec<T>>;

    /// Inserts or replaces by [`Record::record_id`].
    fn put(&self, record: T) -> Result<()>;

    fn clear(&self) -> Result<()>;

    /// Bulk [`put`](Self::put), written in one go.
    fn import_records(&self, records: Vec<T>) -> Result<()>;
}

/// Upserts `incoming` into `existing`, keeping first-seen order.
pub(crate) fn upsert<T: Record>(existing: &mut Vec<T>, incoming: Vec<T>) {
    for record in incoming {
        let id = record.record_id();
        match existing.iter_mut().find(|r| r.record_id() == id) {
            Some(slot) => *slot = record,
            None => existing.push(record),
        }
    }
}

pub struct LocalLibrary {
    pub highlights: Box<dyn EntityStore<Highlight>>,
    pub notes: Box<dyn EntityStore<Note>>,
    pub verse_history: Box<dyn EntityStore<HistoryEntry>>,
    pub reading_progress: Box<dyn EntityStore<ReadingProgress>>,
}

impl LocalLibrary {
    /// JSON-file stores under `dir`.
    pub fn open(dir: &Path) -> Self {
        Self {
            highlights: Box::new(fs::JsonFileStore::new(dir.join("highlights.json"))),
            notes: Box::new(fs::JsonFileStore::new(dir.join("notes.json"))),
            verse_history: Box::new(fs::JsonFileStore::new(dir.join("verse-history.json"))),
            reading_progress: Box::new(fs::JsonFileStore::new(
                dir.join("reading-progress.json"),
            )),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            highlights: Box::new(memory::MemStore::new()),
            notes: Box::new(memory::MemStore::new()),
            verse_history: Box::new(memory::MemStore::new()),
            reading_progress: Box::new(memory::MemStore::new()),
        }
    }

    pub fn snapshot(&self) -> Result<LocalData> {
        Ok(LocalData {
            highlights: self.highlights.get_all()?,
            notes: self.notes.get_all()?,
            verse_history: self.verse_history.get_all()?,
            reading_progress: self.reading_progress.get_all()?,
        })
    }

    /// Writes a merged blob back after a successful sync.
    pub fn apply(&self, merged: &SyncBlob) -> Result<()> {
        let data = merged.to_local();
        self.highlights.import_records(data.highlights)?;
        self.notes.import_records(data.notes)?;
        self.verse_history.clear()?;
        self.verse_history.import_records(data.verse_history)?;
        self.reading_progress.import_records(data.reading_progress)?;
        debug!(stats = %merged.stats(), "applied merged data locally");
        Ok(())
    }

    /// Replaces every local collection with the blob's content.
    pub fn replace_all(&self, blob: &SyncBlob) -> Result<()> {
        let data = blob.to_local();
        self.highlights.clear()?;
        self.highlights.import_records(data.highlights)?;
        self.notes.clear()?;
        self.notes.import_records(data.notes)?;
        self.verse_history.clear()?;
        self.verse_history.import_records(data.verse_history)?;
        self.reading_progress.clear()?;
        self.reading_progress.import_records(data.reading_progress)?;
        debug!(stats = %blob.stats(), "replaced local data");
        Ok(())
    }
}
