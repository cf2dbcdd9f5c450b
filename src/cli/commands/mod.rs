//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Validates command-specific arguments
//! 2. Builds the engine from the loaded config
//! 3. Prints the report as JSON on stdout
//!
//! # Async Commands
//!
//! Both commands do network I/O. Handlers create a tokio runtime and
//! `block_on` the engine so `run` stays synchronous.

mod handle;
mod scan;

pub use handle::{handle, read_event};
pub use scan::scan;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use serde::Serialize;

use super::args::Command;
use super::Context;
use crate::engine::{PublishOptions, Publisher, Scanner, TriggerHandler, TriggerReport};
use crate::forge::github::GitHubForge;

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<ExitCode> {
    match command {
        Command::Handle {
            event,
            dry_run,
            timeout_secs,
        } => handle::handle(ctx, &event, dry_run, timeout_secs),
        Command::Scan { dependency, tag } => scan::scan(ctx, &dependency, &tag),
    }
}

/// Build a handler backed by GitHub from the loaded config.
pub fn build_handler(ctx: &Context, dry_run: bool) -> Result<TriggerHandler> {
    let config = &ctx.config;
    let forge = Arc::new(GitHubForge::with_api_base(ctx.token()?, config.api_base()));

    let scanner = Scanner::new(forge.clone(), config.manifest_path())
        .with_concurrency(config.concurrency());
    let publisher = Publisher::new(
        forge,
        PublishOptions {
            manifest_path: config.manifest_path().to_string(),
            branch_prefix: config.branch_prefix().to_string(),
            naming: config.branch_naming(),
            draft: false,
            concurrency: config.concurrency(),
        },
    );

    if config.repositories().is_empty() {
        tracing::warn!("no watched repositories configured");
    }

    Ok(TriggerHandler::new(scanner, publisher, config.repositories().to_vec()).with_dry_run(dry_run))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize report")?;
    println!("{}", text);
    Ok(())
}

/// Print a report and map it to the process exit status.
fn finish(report: &TriggerReport) -> Result<ExitCode> {
    print_json(report)?;
    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
