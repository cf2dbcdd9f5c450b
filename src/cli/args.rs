//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--config <path>`: Use this config file instead of searching
//! - `--token <token>`: API token (overrides the configured env var)
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Only log warnings and errors

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// earlyad - Open dependency-bump pull requests when a new tag is pushed
#[derive(Parser, Debug)]
#[command(name = "earlyad")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file to use instead of the default locations
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// API token; defaults to the env var named by `auth.token_env`
    #[arg(long, global = true, value_name = "TOKEN")]
    pub token: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true, conflicts_with = "quiet")]
    pub debug: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Handle a tag-created webhook payload
    #[command(
        name = "handle",
        long_about = "Handle a GitHub `create` webhook payload.\n\n\
            Reads the payload, scans every watched repository for a dependency on \
            the tagged repository pinned to an older version, and opens one pull \
            request per outdated repository. The aggregate report is printed as \
            JSON on stdout.\n\n\
            Events that are not tag creations are acknowledged and ignored.",
        after_help = "\
EXAMPLES:
    # Handle a delivery saved to a file
    earlyad handle --event delivery.json

    # Pipe the payload in
    cat delivery.json | earlyad handle

    # See what would change without touching any repository
    earlyad handle --event delivery.json --dry-run

EXIT STATUS:
    0 when every repository was handled, 1 when any repository failed"
    )]
    Handle {
        /// Payload file, or `-` for stdin
        #[arg(long, value_name = "FILE", default_value = "-")]
        event: PathBuf,

        /// Scan only; report the pull requests that would be opened
        #[arg(long)]
        dry_run: bool,

        /// Stop waiting after this many seconds
        #[arg(long, value_name = "SECS")]
        timeout_secs: Option<u64>,
    },

    /// Scan the watched repositories for one dependency version
    #[command(
        name = "scan",
        after_help = "\
EXAMPLES:
    earlyad scan --dependency baz/bar --tag 1.0.1
    earlyad scan --dependency git://github.com/baz/bar.git --tag v2.0.0"
    )]
    Scan {
        /// Dependency reference (`owner/name` or `git://host/owner/name.git`)
        #[arg(long, value_name = "REF")]
        dependency: String,

        /// New version tag
        #[arg(long, value_name = "VERSION")]
        tag: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn handle_defaults_to_stdin() {
        let cli = Cli::try_parse_from(["earlyad", "handle"]).unwrap();
        match cli.command {
            Command::Handle {
                event,
                dry_run,
                timeout_secs,
            } => {
                assert_eq!(event, PathBuf::from("-"));
                assert!(!dry_run);
                assert_eq!(timeout_secs, None);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "earlyad",
            "scan",
            "--dependency",
            "baz/bar",
            "--tag",
            "1.0.1",
            "--config",
            "/tmp/earlyad.toml",
            "--debug",
        ])
        .unwrap();
        assert!(cli.debug);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/earlyad.toml")));
        assert!(matches!(cli.command, Command::Scan { .. }));
    }

    #[test]
    fn debug_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["earlyad", "--debug", "--quiet", "handle"]).is_err());
    }

    #[test]
    fn scan_requires_tag() {
        assert!(Cli::try_parse_from(["earlyad", "scan", "--dependency", "baz/bar"]).is_err());
    }
}
