//! # Domain Model: the Sync Blob
//!
//! Everything that leaves the device travels inside a single JSON document, the
//! [`SyncBlob`]. Both backends read and write exactly this shape, which is what
//! makes a blob written by one backend readable by the other.
//!
//! ## Wire Format
//!
//! ```text
//! {
//!   "version": "1.0.0",
//!   "lastSynced": "2024-01-01T08:00:00Z",
//!   "highlights":      { "Genesis 1:1|KJV": { ...Highlight } },
//!   "notes":           { "John 3:16|ESV":   { ...Note } },
//!   "verseHistory":    [ ...HistoryEntry, newest first ],
//!   "readingProgress": [ ...ReadingProgress, one per date ]
//! }
//! ```
//!
//! Record fields are camelCase on the wire. Record timestamps are integer
//! milliseconds since the Unix epoch; `lastSynced` is an RFC 3339 string.
//!
//! ## Keys
//!
//! Highlights and notes are keyed by reference and translation,
//! `"{book} {chapter}:{verse}|{version}"` (see [`translation_key`]). A verse
//! carries at most one highlight and one note per translation, so every
//! translation a device holds travels to the others.
//!
//! ## Bounds
//!
//! - `verseHistory` never holds more than [`HISTORY_LIMIT`] entries.
//! - `readingProgress` holds at most one record per calendar date.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Schema version written into every blob.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Maximum number of verse history entries kept in a blob.
pub const HISTORY_LIMIT: usize = 100;

/// Builds the `"{book} {chapter}:{verse}"` key used for highlights and notes.
pub fn reference_key(book: &str, chapter: u32, verse: u32) -> String {
    format!("{} {}:{}", book, chapter, verse)
}

/// Builds the `"{book} {chapter}:{verse}|{version}"` blob key for highlights and notes.
pub fn translation_key(book: &str, chapter: u32, verse: u32, version: &str) -> String {
    format!("{}|{}", reference_key(book, chapter, verse), version)
}

/// Records that take part in last-writer-wins merging.
pub trait Stamped {
    /// Key under which the record is stored in the blob.
    fn sync_key(&self) -> String;

    /// Millisecond timestamp compared during merge.
    fn stamp(&self) -> i64;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Highlight {
    pub book: String,
    pub chapter: u32,
    pub verse: u32,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub reference: String,
    pub timestamp: i64,
    /// Translation the highlight was made in (e.g. "KJV").
    pub version: String,
}

impl Highlight {
    pub fn new(
        book: &str,
        chapter: u32,
        verse: u32,
        color: &str,
        version: &str,
        timestamp: i64,
    ) -> Self {
        Self {
            book: book.to_string(),
            chapter,
            verse,
            color: color.to_string(),
            note: None,
            reference: reference_key(book, chapter, verse),
            timestamp,
            version: version.to_string(),
        }
    }

    pub fn with_note(mut self, note: &str) -> Self {
        self.note = Some(note.to_string());
        self
    }
}

impl Stamped for Highlight {
    fn sync_key(&self) -> String {
        translation_key(&self.book, self.chapter, self.verse, &self.version)
    }

    fn stamp(&self) -> i64 {
        self.timestamp
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub book: String,
    pub chapter: u32,
    pub verse: u32,
    pub note: String,
    pub reference: String,
    pub created_at: i64,
    pub last_modified: i64,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl Note {
    pub fn new(book: &str, chapter: u32, verse: u32, text: &str, version: &str, at: i64) -> Self {
        Self {
            book: book.to_string(),
            chapter,
            verse,
            note: text.to_string(),
            reference: reference_key(book, chapter, verse),
            created_at: at,
            last_modified: at,
            version: version.to_string(),
            tags: None,
        }
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = Some(tags.iter().map(|t| t.to_string()).collect());
        self
    }
}

impl Stamped for Note {
    fn sync_key(&self) -> String {
        translation_key(&self.book, self.chapter, self.verse, &self.version)
    }

    fn stamp(&self) -> i64 {
        self.last_modified
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub book: String,
    pub chapter: u32,
    pub verse: u32,
    pub verse_text: String,
    pub version: String,
    pub reference: String,
    pub timestamp: i64,
}

impl HistoryEntry {
    pub fn new(id: &str, book: &str, chapter: u32, verse: u32, version: &str, at: i64) -> Self {
        Self {
            id: id.to_string(),
            book: book.to_string(),
            chapter,
            verse,
            verse_text: String::new(),
            version: version.to_string(),
            reference: reference_key(book, chapter, verse),
            timestamp: at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingProgress {
    pub date: NaiveDate,
    pub psalm_completed: bool,
    pub proverbs_completed: bool,
    pub timestamp: i64,
}

impl ReadingProgress {
    pub fn new(date: NaiveDate, psalm: bool, proverbs: bool, at: i64) -> Self {
        Self {
            date,
            psalm_completed: psalm,
            proverbs_completed: proverbs,
            timestamp: at,
        }
    }
}

/// The four local collections, as handed out by the entity stores.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalData {
    pub highlights: Vec<Highlight>,
    pub notes: Vec<Note>,
    pub verse_history: Vec<HistoryEntry>,
    pub reading_progress: Vec<ReadingProgress>,
}

impl LocalData {
    pub fn is_empty(&self) -> bool {
        self.highlights.is_empty()
            && self.notes.is_empty()
            && self.verse_history.is_empty()
            && self.reading_progress.is_empty()
    }

    pub fn stats(&self) -> BlobStats {
        BlobStats {
            highlights: self.highlights.len(),
            notes: self.notes.len(),
            verse_history: self.verse_history.len(),
            reading_progress: self.reading_progress.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncBlob {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_synced: Option<DateTime<Utc>>,
    #[serde(default)]
    pub highlights: BTreeMap<String, Highlight>,
    #[serde(default)]
    pub notes: BTreeMap<String, Note>,
    #[serde(default)]
    pub verse_history: Vec<HistoryEntry>,
    #[serde(default)]
    pub reading_progress: Vec<ReadingProgress>,
}

impl Default for SyncBlob {
    fn default() -> Self {
        Self::empty()
    }
}

impl SyncBlob {
    /// A blob with no data and no `lastSynced`, standing in for a missing remote.
    pub fn empty() -> Self {
        Self {
            version: SCHEMA_VERSION.to_string(),
            last_synced: None,
            highlights: BTreeMap::new(),
            notes: BTreeMap::new(),
            verse_history: Vec::new(),
            reading_progress: Vec::new(),
        }
    }

    /// Keys local collections the way the wire format expects.
    ///
    /// Duplicate keys keep the record with the later stamp.
    pub fn from_local(local: &LocalData) -> Self {
        Self {
            highlights: keyed(&local.highlights),
            notes: keyed(&local.notes),
            verse_history: local.verse_history.clone(),
            reading_progress: local.reading_progress.clone(),
            ..Self::empty()
        }
    }

    pub fn to_local(&self) -> LocalData {
        LocalData {
            highlights: self.highlights.values().cloned().collect(),
            notes: self.notes.values().cloned().collect(),
            verse_history: self.verse_history.clone(),
            reading_progress: self.reading_progress.clone(),
        }
    }

    pub fn stats(&self) -> BlobStats {
        BlobStats {
            highlights: self.highlights.len(),
            notes: self.notes.len(),
            verse_history: self.verse_history.len(),
            reading_progress: self.reading_progress.len(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(content: &str) -> serde_json::Result<Self> {
        serde_json::from_str(content)
    }
}

fn keyed<T: Stamped + Clone>(records: &[T]) -> BTreeMap<String, T> {
    let mut map: BTreeMap<String, T> = BTreeMap::new();
    for record in records {
        let key = record.sync_key();
        match map.get(&key) {
            Some(existing) if existing.stamp() >= record.stamp() => {}
            _ => {
                map.insert(key, record.clone());
            }
        }
    }
    map
}

/// Record counts per collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BlobStats {
    pub highlights: usize,
    pub notes: usize,
    pub verse_history: usize,
    pub reading_progress: usize,
}

impl std::fmt::Display for BlobStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} highlights, {} notes, {} history entries, {} progress days",
            self.highlights, self.notes, self.verse_history, self.reading_progress
        )
    }
}
