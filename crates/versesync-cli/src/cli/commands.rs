//! # CLI Command Flow
//!
//! 1. **Parse**: clap turns argv into [`Cli`].
//! 2. **Logging**: `tracing` goes to stderr, filtered by `VERSESYNC_LOG`
//!    (an `EnvFilter` directive) or `-v`.
//! 3. **Config**: `versesync config ...` is answered by clapfig directly and
//!    never builds a sync context.
//! 4. **Context Setup**: [`initialize`] wires the engine with terminal
//!    [`Interaction`] hooks.
//! 5. **Dispatch + Render**: one API call, one rendered [`CmdResult`].

use super::interact::{BrowserConsent, PromptDirectory};
use super::render::render;
use super::setup::{Cli, Commands, ConfigCommands};
use anyhow::{bail, Context, Result};
use clap::Parser;
use clapfig::{Clapfig, ConfigAction, SearchPath};
use std::io::IsTerminal;
use std::path::Path;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use versesync::adapters::local_dir::{DirectoryPicker, FixedDirectory};
use versesync::api::SyncApi;
use versesync::commands::CmdResult;
use versesync::config::{SyncConfig, CONFIG_FILE};
use versesync::error::SyncError;
use versesync::init::{initialize, resolve_data_dir, Interaction};

const LOG_ENV: &str = "VERSESYNC_LOG";

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Config { action } => {
            let data_dir = resolve_data_dir(cli.data)?;
            handle_config_command(action.as_ref(), &data_dir)
        }
        Commands::Restore { yes: false } => {
            bail!("restore replaces all local data with the remote copy, pass --yes to confirm")
        }
        command => {
            let interaction = build_interaction(&command)?;
            let mut ctx = initialize(cli.data, interaction)?;
            debug!(data_dir = %ctx.data_dir.display(), "context ready");

            let result = dispatch(&mut ctx.api, command)?;
            print!("{}", render(&result, cli.output)?);
            Ok(())
        }
    }
}

/// Exit status for a failed run. Mistakes that a retry will not fix (an
/// unknown backend, bad configuration) exit with 2, like clap's usage errors.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<SyncError>() {
        Some(e) if e.is_fatal() => 2,
        _ => 1,
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    // A second init (tests) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// `connect --dir` answers the folder prompt up front; otherwise we only
/// prompt when a human is attached to stdin.
fn build_interaction(command: &Commands) -> Result<Interaction> {
    let directory_picker: Box<dyn DirectoryPicker> = match command {
        Commands::Connect { dir: Some(dir), .. } => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("could not create {}", dir.display()))?;
            Box::new(FixedDirectory(Some(dir.clone())))
        }
        _ if std::io::stdin().is_terminal() => Box::new(PromptDirectory::stdio()),
        _ => Box::new(FixedDirectory(None)),
    };

    Ok(Interaction {
        directory_picker,
        consent: Box::new(BrowserConsent {
            open_browser: std::io::stderr().is_terminal(),
        }),
    })
}

fn dispatch(api: &mut SyncApi, command: Commands) -> Result<CmdResult> {
    let result = match command {
        Commands::Adapters => api.adapters()?,
        Commands::Use { name } => api.use_adapter(&name)?,
        Commands::Connect { name, .. } => api.connect(name.as_deref())?,
        Commands::Status { remote } => api.status(remote)?,
        Commands::Sync => api.sync()?,
        Commands::Restore { .. } => api.restore()?,
        Commands::Disconnect { forget } => api.disconnect(forget)?,
        // Answered before any context exists.
        Commands::Config { .. } => CmdResult::default(),
    };
    Ok(result)
}

/// Handle the `versesync config` subcommand using clapfig directly.
fn handle_config_command(action: Option<&ConfigCommands>, data_dir: &Path) -> Result<()> {
    let action = match action {
        None => {
            // Bare `versesync config` shows all resolved values
            let config = versesync::init::load_config(data_dir);
            print!("{}", toml::to_string_pretty(&config)?);
            return Ok(());
        }
        Some(ConfigCommands::Gen { output }) => ConfigAction::Gen {
            output: output.clone(),
        },
        Some(ConfigCommands::Get { key }) => ConfigAction::Get {
            key: key.clone(),
            scope: None,
        },
        Some(ConfigCommands::Set { key, value }) => {
            std::fs::create_dir_all(data_dir)
                .with_context(|| format!("could not create {}", data_dir.display()))?;
            ConfigAction::Set {
                key: key.clone(),
                value: value.clone(),
                scope: None,
            }
        }
    };

    let result = Clapfig::builder::<SyncConfig>()
        .app_name("versesync")
        .file_name(CONFIG_FILE)
        .search_paths(vec![SearchPath::Path(data_dir.to_path_buf())])
        .no_env()
        .strict(false)
        .handle(&action)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    println!("{result}");
    Ok(())
}
