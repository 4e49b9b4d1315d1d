use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Returns the version string, including git hash and commit date for non-release builds.
/// Format for releases: "v0.3.0"
/// Format for dev builds: "v0.3.0\ndev: abc1234 2024-01-15 14:30"
fn get_version() -> &'static str {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    const GIT_HASH: &str = env!("GIT_HASH");
    const GIT_COMMIT_DATE: &str = env!("GIT_COMMIT_DATE");
    const IS_RELEASE: &str = env!("IS_RELEASE");

    use std::sync::OnceLock;
    static VERSION_STRING: OnceLock<String> = OnceLock::new();

    VERSION_STRING.get_or_init(|| {
        if IS_RELEASE == "true" || GIT_HASH.is_empty() {
            format!("v{}", VERSION)
        } else {
            format!("v{}\ndev: {} {}", VERSION, GIT_HASH, GIT_COMMIT_DATE)
        }
    })
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(
    name = "versesync",
    bin_name = "versesync",
    version = get_version(),
    disable_help_subcommand = true
)]
#[command(about = "Sync Bible highlights, notes and reading progress", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output (debug logging)
    #[arg(short, long, global = true, help_heading = "Options")]
    pub verbose: bool,

    /// Data directory (defaults to VERSESYNC_DATA or the OS data dir)
    #[arg(long, global = true, value_name = "DIR", help_heading = "Options")]
    pub data: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text, help_heading = "Options")]
    pub output: OutputFormat,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List available sync backends
    #[command(display_order = 1, alias = "ls")]
    Adapters,

    /// Select a backend without connecting
    #[command(display_order = 2)]
    Use {
        /// Backend name (see `adapters`)
        name: String,
    },

    /// Select a backend (optional) and grant access to it
    #[command(display_order = 3)]
    Connect {
        /// Backend name, defaults to the selected one
        name: Option<String>,

        /// Folder to sync into (local-folder backend), skips the prompt
        #[arg(long, value_name = "PATH")]
        dir: Option<PathBuf>,
    },

    /// Show the selected backend, connection state and local counts
    #[command(display_order = 4)]
    Status {
        /// Read the last sync time from the remote copy
        #[arg(long)]
        remote: bool,
    },

    /// Merge local data with the remote copy
    #[command(display_order = 10)]
    Sync,

    /// Replace ALL local data with the remote copy
    #[command(display_order = 11)]
    Restore {
        /// Confirm that local data may be overwritten
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Deselect the backend, optionally revoking stored access
    #[command(display_order = 20)]
    Disconnect {
        /// Also delete the stored folder grant or OAuth token
        #[arg(long)]
        forget: bool,
    },

    /// Show or edit configuration
    #[command(display_order = 30)]
    Config {
        #[command(subcommand)]
        action: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print a commented template of every setting
    Gen {
        /// Write to this file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Print one setting (e.g. drive.timeout_secs)
    Get { key: String },

    /// Persist one setting in the data directory's config file
    Set { key: String, value: String },
}
