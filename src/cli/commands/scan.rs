//! scan command - Report outdated repositories without publishing

use std::process::ExitCode;

use anyhow::{Context as _, Result};

use super::{build_handler, finish};
use crate::cli::Context;
use crate::core::resolve::UpdateTarget;

/// Scan the watched repositories for `dependency` at `tag`.
pub fn scan(ctx: &Context, dependency: &str, tag: &str) -> Result<ExitCode> {
    let target = UpdateTarget::new(dependency, tag)
        .with_context(|| format!("Cannot scan for {} at {}", dependency, tag))?;

    let handler = build_handler(ctx, true)?;
    let rt = tokio::runtime::Runtime::new()?;
    let report = rt.block_on(handler.run(&target));

    finish(&report)
}
