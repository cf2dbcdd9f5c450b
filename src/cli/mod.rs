//! cli
//!
//! Command-line host harness for the `earlyad` binary.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Install the log subscriber
//! - Load configuration and resolve the API credential
//! - Construct the GitHub collaborator and hand it to the engine
//!
//! # Architecture
//!
//! The CLI layer is thin. It parses arguments via clap and dispatches to
//! [`commands`], which build a [`crate::engine::TriggerHandler`] from the
//! loaded [`Config`]. Nothing here talks to GitHub directly.

pub mod args;
pub mod commands;

pub use args::{Cli, Command};

use std::process::ExitCode;

use anyhow::{Context as _, Result};
use tracing::Level;

use crate::core::config::Config;

/// Settings shared by every command.
#[derive(Debug)]
pub struct Context {
    /// Loaded configuration
    pub config: Config,
    /// Token given on the command line, if any
    pub token: Option<String>,
}

impl Context {
    /// The API token: `--token` first, then the configured env var.
    pub fn token(&self) -> Result<String> {
        if let Some(token) = self.token.as_ref().filter(|t| !t.is_empty()) {
            return Ok(token.clone());
        }
        let var = self.config.token_env();
        match std::env::var(var) {
            Ok(token) if !token.is_empty() => Ok(token),
            _ => anyhow::bail!("No API token. Pass --token or set {}.", var),
        }
    }
}

/// Log level for the given flags.
pub fn log_level(debug: bool, quiet: bool) -> Level {
    if debug {
        Level::DEBUG
    } else if quiet {
        Level::WARN
    } else {
        Level::INFO
    }
}

/// Install the stderr log subscriber.
pub fn init_logging(level: Level) {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<ExitCode> {
    let cli = Cli::parse_args();
    init_logging(log_level(cli.debug, cli.quiet));

    let config = Config::load(cli.config.as_deref()).context("Failed to load config")?;
    match config.loaded_from() {
        Some(path) => tracing::debug!(path = %path.display(), "loaded config"),
        None => tracing::debug!("no config file found, using defaults"),
    }

    let ctx = Context {
        config,
        token: cli.token,
    };

    commands::dispatch(cli.command, &ctx)
}
