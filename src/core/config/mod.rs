//! core::config
//!
//! Configuration schema and loading.
//!
//! # Locations
//!
//! Searched in order, first hit wins:
//! 1. An explicit path (the `--config` flag)
//! 2. `$EARLYAD_CONFIG` if set
//! 3. `$XDG_CONFIG_HOME/earlyad/config.toml`
//! 4. `~/.earlyad/config.toml`
//!
//! A missing file is not an error; defaults are used and the watch list is
//! empty. An explicit path that does not exist is an error.
//!
//! # Example
//!
//! ```no_run
//! use early_adopter::core::config::Config;
//!
//! let config = Config::load(None).unwrap();
//! for repo in config.repositories() {
//!     println!("watching {}", repo);
//! }
//! println!("manifest: {}", config.manifest_path());
//! ```

pub mod schema;

pub use schema::{AuthConfig, BranchConfig, FileConfig};

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::naming::{BranchNaming, DEFAULT_BRANCH_PREFIX};
use crate::core::reference::RepoRef;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "EARLYAD_CONFIG";

/// Default manifest location inside a repository.
pub const DEFAULT_MANIFEST_PATH: &str = "package.json";

/// Default GitHub API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Default environment variable for the API token.
pub const DEFAULT_TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Default bound on concurrent repository work.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("config file '{0}' does not exist")]
    NotFound(PathBuf),

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Loaded configuration with defaults applied through accessors.
#[derive(Debug, Clone, Default)]
pub struct Config {
    file: FileConfig,
    repositories: Vec<RepoRef>,
    loaded_from: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the explicit path or default locations.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read, parsed
    /// or validated, or if `explicit` points at a missing file.
    pub fn load(explicit: Option<&Path>) -> Result<Config, ConfigError> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            return Self::load_from(path);
        }

        match Self::find_default() {
            Some(path) => Self::load_from(&path),
            None => Ok(Config::default()),
        }
    }

    /// Load and validate one config file.
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let file: FileConfig = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut config = Self::from_file_config(file)?;
        config.loaded_from = Some(path.to_path_buf());
        Ok(config)
    }

    /// Build a config from already-parsed contents.
    pub fn from_file_config(file: FileConfig) -> Result<Config, ConfigError> {
        file.validate()?;

        let repositories = file
            .repositories
            .iter()
            .map(|raw| RepoRef::parse(raw).map(|r| r.without_fragment()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        Ok(Config {
            file,
            repositories,
            loaded_from: None,
        })
    }

    /// First existing file among the default locations.
    fn find_default() -> Option<PathBuf> {
        let mut candidates = Vec::new();
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            candidates.push(PathBuf::from(path));
        }
        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            candidates.push(PathBuf::from(xdg_home).join("earlyad/config.toml"));
        }
        if let Some(home) = dirs::home_dir() {
            candidates.push(home.join(".earlyad/config.toml"));
        }
        candidates.into_iter().find(|p| p.exists())
    }

    // =========================================================================
    // Accessor methods with defaults
    // =========================================================================

    /// Watched repositories, in configured order.
    pub fn repositories(&self) -> &[RepoRef] {
        &self.repositories
    }

    /// Path of the manifest inside each repository.
    ///
    /// Defaults to `package.json`.
    pub fn manifest_path(&self) -> &str {
        self.file
            .manifest_path
            .as_deref()
            .unwrap_or(DEFAULT_MANIFEST_PATH)
    }

    /// API base URL.
    ///
    /// Defaults to `https://api.github.com`.
    pub fn api_base(&self) -> &str {
        self.file.api_base.as_deref().unwrap_or(DEFAULT_API_BASE)
    }

    /// Maximum number of repositories processed at once.
    pub fn concurrency(&self) -> usize {
        self.file.concurrency.unwrap_or(DEFAULT_CONCURRENCY)
    }

    /// Prefix for generated branches.
    ///
    /// Defaults to `earlyad/`.
    pub fn branch_prefix(&self) -> &str {
        self.file
            .branch
            .as_ref()
            .and_then(|b| b.prefix.as_deref())
            .unwrap_or(DEFAULT_BRANCH_PREFIX)
    }

    /// Branch naming strategy.
    pub fn branch_naming(&self) -> BranchNaming {
        self.file
            .branch
            .as_ref()
            .and_then(|b| b.naming)
            .unwrap_or_default()
    }

    /// Environment variable holding the API token.
    ///
    /// Defaults to `GITHUB_TOKEN`.
    pub fn token_env(&self) -> &str {
        self.file
            .auth
            .as_ref()
            .and_then(|a| a.token_env.as_deref())
            .unwrap_or(DEFAULT_TOKEN_ENV)
    }

    /// Path the config was loaded from, if any.
    pub fn loaded_from(&self) -> Option<&Path> {
        self.loaded_from.as_deref()
    }
}
