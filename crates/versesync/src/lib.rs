//! # versesync
//!
//! Cloud sync for a Bible reading app's personal data: highlights, notes,
//! verse history and reading progress. Everything travels as one JSON
//! [`SyncBlob`](model::SyncBlob) that can live in a local folder or in the
//! hidden app-data space of Google Drive.
//!
//! ## Architecture
//!
//! ```text
//! UI (CLI, ...)
//!   └── api::SyncApi                 facade, one method per operation
//!         └── commands::*            gather, sync/restore, write back, report
//!               ├── engine::SyncEngine   registry, selection, merge driving
//!               │     ├── merge          pure last-writer-wins rules
//!               │     └── adapters::*    local folder, Google Drive, memory
//!               ├── store::LocalLibrary  the four local entity stores
//!               └── session::SessionFile active backend between runs
//! ```
//!
//! ## Sync in One Paragraph
//!
//! The local collections are keyed into a blob and merged with the remote
//! blob: later stamps win for highlights and notes, history is a bounded
//! newest-first union, reading progress only ever gains completions. If two
//! records share a stamp but differ, the sync stops and reports the conflicts
//! without writing anything. Otherwise the merged blob is saved remotely and
//! then written back into the local stores.
//!
//! Restore skips the merge: the remote blob replaces local data wholesale.
//!
//! ## Entry Point
//!
//! [`init::initialize`] builds a ready [`init::SyncContext`] from the data
//! directory, configuration and the UI's [`init::Interaction`] hooks.

pub mod adapters;
pub mod api;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod init;
pub mod merge;
pub mod model;
pub mod session;
pub mod store;
