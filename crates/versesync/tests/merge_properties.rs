//! Property-based tests for the merge rules.
//!
//! - Merging a blob with itself changes nothing
//! - Merging local data into a merged result again changes nothing
//! - Without conflicts, the keyed merge does not depend on argument order
//! - History stays bounded, unique and newest first
//! - Reading progress never loses a completion

use chrono::{NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use std::collections::HashSet;
use versesync::merge::{merge_blobs, merge_history, merge_progress};
use versesync::model::{
    Highlight, HistoryEntry, LocalData, Note, ReadingProgress, SyncBlob, HISTORY_LIMIT,
};

const BOOKS: [&str; 3] = ["Genesis", "Psalms", "John"];
const COLORS: [&str; 3] = ["yellow", "green", "blue"];

fn highlight() -> impl Strategy<Value = Highlight> {
    (0..BOOKS.len(), 1u32..4, 1u32..4, 0..COLORS.len(), 0i64..6).prop_map(
        |(book, chapter, verse, color, ts)| {
            Highlight::new(BOOKS[book], chapter, verse, COLORS[color], "KJV", ts)
        },
    )
}

fn note() -> impl Strategy<Value = Note> {
    (0..BOOKS.len(), 1u32..4, 1u32..4, "[a-z]{1,8}", 0i64..6)
        .prop_map(|(book, chapter, verse, text, ts)| Note::new(BOOKS[book], chapter, verse, &text, "KJV", ts))
}

fn history_entry() -> impl Strategy<Value = HistoryEntry> {
    (0u32..150, 0..BOOKS.len(), 1u32..20, 0i64..1_000).prop_map(|(id, book, verse, ts)| {
        HistoryEntry::new(&format!("h{id}"), BOOKS[book], 1, verse, "KJV", ts)
    })
}

fn progress() -> impl Strategy<Value = ReadingProgress> {
    (0u32..20, any::<bool>(), any::<bool>(), 0i64..100).prop_map(|(day, psalm, proverbs, ts)| {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1 + day).unwrap();
        ReadingProgress::new(date, psalm, proverbs, ts)
    })
}

fn blob() -> impl Strategy<Value = SyncBlob> {
    (
        prop::collection::vec(highlight(), 0..12),
        prop::collection::vec(note(), 0..12),
        prop::collection::vec(progress(), 0..8),
    )
        .prop_map(|(highlights, notes, reading_progress)| {
            SyncBlob::from_local(&LocalData {
                highlights,
                notes,
                reading_progress,
                ..LocalData::default()
            })
        })
}

proptest! {
    /// Property: a blob merged with itself is conflict free and unchanged
    #[test]
    fn prop_self_merge_is_identity(b in blob()) {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let out = merge_blobs(&b, &b, now);

        prop_assert!(out.conflicts.is_empty());
        prop_assert_eq!(&out.blob.highlights, &b.highlights);
        prop_assert_eq!(&out.blob.notes, &b.notes);
    }

    /// Property: merging local into an already merged result changes nothing
    #[test]
    fn prop_merge_is_idempotent(local in blob(), remote in blob()) {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let once = merge_blobs(&local, &remote, now);
        prop_assume!(once.conflicts.is_empty());
        let twice = merge_blobs(&local, &once.blob, now);

        prop_assert!(twice.conflicts.is_empty());
        prop_assert_eq!(&twice.blob.highlights, &once.blob.highlights);
        prop_assert_eq!(&twice.blob.notes, &once.blob.notes);
        prop_assert_eq!(&twice.blob.reading_progress, &once.blob.reading_progress);
    }

    /// Property: when neither direction reports conflicts, direction does not matter
    #[test]
    fn prop_keyed_merge_commutes_without_conflicts(a in blob(), b in blob()) {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let ab = merge_blobs(&a, &b, now);
        let ba = merge_blobs(&b, &a, now);
        prop_assume!(ab.conflicts.is_empty() && ba.conflicts.is_empty());

        prop_assert_eq!(&ab.blob.highlights, &ba.blob.highlights);
        prop_assert_eq!(&ab.blob.notes, &ba.blob.notes);
    }

    /// Property: every key from either side survives, with the newest stamp
    #[test]
    fn prop_keyed_merge_keeps_newest(a in blob(), b in blob()) {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let out = merge_blobs(&a, &b, now);

        for (key, h) in a.highlights.iter().chain(b.highlights.iter()) {
            let merged = out.blob.highlights.get(key);
            prop_assert!(merged.is_some(), "lost highlight {}", key);
            prop_assert!(merged.unwrap().timestamp >= h.timestamp);
        }
        prop_assert!(out.conflicts.iter().all(|c| c.local_timestamp == c.remote_timestamp));
    }

    /// Property: merged history is bounded, unique by id and newest first
    #[test]
    fn prop_history_bounded_and_ordered(
        local in prop::collection::vec(history_entry(), 0..120),
        remote in prop::collection::vec(history_entry(), 0..120),
    ) {
        let merged = merge_history(&local, &remote);

        prop_assert!(merged.len() <= HISTORY_LIMIT);
        let ids: HashSet<&str> = merged.iter().map(|e| e.id.as_str()).collect();
        prop_assert_eq!(ids.len(), merged.len());
        prop_assert!(merged.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));

        let distinct: HashSet<&str> = local.iter().chain(remote.iter()).map(|e| e.id.as_str()).collect();
        prop_assert_eq!(merged.len(), distinct.len().min(HISTORY_LIMIT));
    }

    /// Property: history merge is symmetric
    #[test]
    fn prop_history_merge_commutes(
        local in prop::collection::vec(history_entry(), 0..60),
        remote in prop::collection::vec(history_entry(), 0..60),
    ) {
        prop_assert_eq!(merge_history(&local, &remote), merge_history(&remote, &local));
    }

    /// Property: a completion recorded on either side is never lost
    #[test]
    fn prop_progress_is_monotonic(
        local in prop::collection::vec(progress(), 0..30),
        remote in prop::collection::vec(progress(), 0..30),
    ) {
        let merged = merge_progress(&local, &remote);

        prop_assert!(merged.windows(2).all(|w| w[0].date < w[1].date));
        for record in local.iter().chain(remote.iter()) {
            let day = merged.iter().find(|m| m.date == record.date);
            prop_assert!(day.is_some());
            let day = day.unwrap();
            prop_assert!(day.psalm_completed || !record.psalm_completed);
            prop_assert!(day.proverbs_completed || !record.proverbs_completed);
            prop_assert!(day.timestamp >= record.timestamp);
        }
    }
}
