//! # Merge Rules
//!
//! Pure functions that reconcile a local blob with the remote one. Nothing here
//! touches a backend; [`crate::engine::SyncEngine`] decides what to do with the
//! result.
//!
//! | Collection        | Rule                                                        |
//! |-------------------|-------------------------------------------------------------|
//! | `highlights`      | per key, later `timestamp` wins                             |
//! | `notes`           | per key, later `lastModified` wins                          |
//! | `verseHistory`    | union by `id`, newest first, capped at [`HISTORY_LIMIT`]    |
//! | `readingProgress` | per date, completion flags are OR-ed                        |
//!
//! ## Conflicts
//!
//! Two records under the same key with the *same* stamp but different content
//! cannot be ordered. They are reported as [`Conflict`]s and the local record is
//! kept in the merged map provisionally; the engine refuses to write a blob that
//! carries conflicts.
//!
//! ## Properties
//!
//! - Idempotent: `merge(L, merge(L, R)) == merge(L, R)`.
//! - Commutative on keys without conflicts.
//! - Reading progress only ever moves towards "completed".

use crate::model::{
    HistoryEntry, ReadingProgress, Stamped, SyncBlob, HISTORY_LIMIT, SCHEMA_VERSION,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictKind {
    Highlight,
    Note,
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictKind::Highlight => write!(f, "highlight"),
            ConflictKind::Note => write!(f, "note"),
        }
    }
}

/// A same-timestamp divergence that needs a human decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub key: String,
    pub local_timestamp: i64,
    pub remote_timestamp: i64,
}

#[derive(Debug, Clone)]
pub struct MergeOutput {
    pub blob: SyncBlob,
    pub conflicts: Vec<Conflict>,
}

impl MergeOutput {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

/// Merges `local` into `remote`, stamping the result with `now`.
///
/// `lastSynced` never moves backwards: when the remote clock was ahead, the
/// remote value is kept.
pub fn merge_blobs(local: &SyncBlob, remote: &SyncBlob, now: DateTime<Utc>) -> MergeOutput {
    let mut conflicts = Vec::new();

    let highlights = merge_keyed(
        ConflictKind::Highlight,
        &local.highlights,
        &remote.highlights,
        &mut conflicts,
    );
    let notes = merge_keyed(ConflictKind::Note, &local.notes, &remote.notes, &mut conflicts);

    let last_synced = match remote.last_synced {
        Some(previous) if previous > now => previous,
        _ => now,
    };

    let blob = SyncBlob {
        version: SCHEMA_VERSION.to_string(),
        last_synced: Some(last_synced),
        highlights,
        notes,
        verse_history: merge_history(&local.verse_history, &remote.verse_history),
        reading_progress: merge_progress(&local.reading_progress, &remote.reading_progress),
    };

    MergeOutput { blob, conflicts }
}

/// Last-writer-wins merge of a keyed collection.
pub fn merge_keyed<T>(
    kind: ConflictKind,
    local: &BTreeMap<String, T>,
    remote: &BTreeMap<String, T>,
    conflicts: &mut Vec<Conflict>,
) -> BTreeMap<String, T>
where
    T: Stamped + Clone + PartialEq,
{
    let mut merged = remote.clone();

    for (key, mine) in local {
        let Some(theirs) = remote.get(key) else {
            merged.insert(key.clone(), mine.clone());
            continue;
        };

        if mine.stamp() > theirs.stamp() {
            merged.insert(key.clone(), mine.clone());
        } else if mine.stamp() == theirs.stamp() && mine != theirs {
            conflicts.push(Conflict {
                kind,
                key: key.clone(),
                local_timestamp: mine.stamp(),
                remote_timestamp: theirs.stamp(),
            });
            merged.insert(key.clone(), mine.clone());
        }
    }

    merged
}

/// Union by entry id, newest first, capped at [`HISTORY_LIMIT`].
pub fn merge_history(local: &[HistoryEntry], remote: &[HistoryEntry]) -> Vec<HistoryEntry> {
    let mut by_id: HashMap<&str, &HistoryEntry> = HashMap::new();

    for entry in remote.iter().chain(local.iter()) {
        match by_id.get(entry.id.as_str()) {
            Some(existing) if !replaces(entry, existing) => {}
            _ => {
                by_id.insert(entry.id.as_str(), entry);
            }
        }
    }

    let mut merged: Vec<HistoryEntry> = by_id.into_values().cloned().collect();
    merged.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));
    merged.truncate(HISTORY_LIMIT);
    merged
}

// Same id seen twice: the later visit wins, equal timestamps fall back to a
// content ordering so the outcome does not depend on which side is local.
fn replaces(candidate: &HistoryEntry, existing: &HistoryEntry) -> bool {
    if candidate.timestamp != existing.timestamp {
        return candidate.timestamp > existing.timestamp;
    }
    history_rank(candidate) > history_rank(existing)
}

fn history_rank(e: &HistoryEntry) -> (&str, u32, u32, &str, &str, &str) {
    (&e.book, e.chapter, e.verse, &e.version, &e.reference, &e.verse_text)
}

/// Per-date OR of the completion flags, ordered by date.
pub fn merge_progress(local: &[ReadingProgress], remote: &[ReadingProgress]) -> Vec<ReadingProgress> {
    let mut by_date: BTreeMap<NaiveDate, ReadingProgress> = BTreeMap::new();

    for record in remote.iter().chain(local.iter()) {
        by_date
            .entry(record.date)
            .and_modify(|merged| {
                merged.psalm_completed |= record.psalm_completed;
                merged.proverbs_completed |= record.proverbs_completed;
                merged.timestamp = merged.timestamp.max(record.timestamp);
            })
            .or_insert_with(|| record.clone());
    }

    by_date.into_values().collect()
}
