//! # versesync CLI
//!
//! A thin terminal client for the `versesync` library. This file only invokes
//! [`cli::run`] and turns errors into an exit code; everything else lives in
//! `src/cli/`.
//!
//! ## Layering
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  CLI Layer (crates/versesync-cli/src/cli/)               │
//! │  - clap argument parsing (setup.rs)                      │
//! │  - Context wiring + dispatch (commands.rs)               │
//! │  - Folder prompt + browser consent (interact.rs)         │
//! │  - Terminal / JSON rendering (render.rs)                 │
//! └──────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │  API Layer (crates/versesync/src/api.rs)                 │
//! │  - One method per operation, returns `CmdResult`         │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything from `api.rs` inward is UI agnostic. The CLI owns argument
//! parsing, prompts, logging setup, rendering and exit codes.

mod cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(cli::exit_code(&e));
    }
}
