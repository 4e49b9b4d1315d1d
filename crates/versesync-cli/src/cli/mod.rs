//! # CLI Behavior
//!
//! This is one possible UI client for versesync. It is the only place that
//! knows about terminal I/O, exit codes and output formatting.
//!
//! ## Typical Session
//!
//! ```text
//! versesync adapters                    # what can I sync with?
//! versesync connect local-folder --dir ~/Dropbox/bible
//! versesync sync                        # merge local and remote
//! versesync restore --yes               # replace local with remote
//! versesync disconnect --forget
//! ```
//!
//! Destructive operations ask for `--yes` instead of prompting, so the
//! binary stays scriptable.
//!
//! ## Module Structure
//!
//! - `setup`: Argument parsing via clap, version string
//! - `commands`: Logging, context initialization and dispatch
//! - `interact`: Terminal implementations of the library's prompt hooks
//! - `render`: Styled text or JSON output of a `CmdResult`

mod commands;
mod interact;
mod render;
pub mod setup;

pub use commands::{exit_code, run};
