//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Validation
//!
//! Config values are validated after parsing: every watched repository must
//! be an accepted reference, concurrency must be positive, and the branch
//! prefix must not produce invalid ref names.

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::naming::BranchNaming;
use crate::core::reference::RepoRef;

/// Configuration file contents.
///
/// # Example
///
/// ```toml
/// repositories = [
///     "apbarrero/earlyad",
///     "git://github.com/auth0/wt-cli.git",
/// ]
/// manifest_path = "package.json"
/// api_base = "https://api.github.com"
/// concurrency = 8
///
/// [branch]
/// prefix = "earlyad/"
/// naming = "content"
///
/// [auth]
/// token_env = "GITHUB_TOKEN"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Watched repositories, in reference form
    pub repositories: Vec<String>,

    /// Path of the manifest inside each repository
    pub manifest_path: Option<String>,

    /// API base URL (GitHub Enterprise installations differ)
    pub api_base: Option<String>,

    /// Maximum number of repositories processed at once
    pub concurrency: Option<usize>,

    /// Branch naming settings
    pub branch: Option<BranchConfig>,

    /// Credential settings
    pub auth: Option<AuthConfig>,
}

impl FileConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for raw in &self.repositories {
            RepoRef::parse(raw).map_err(|e| {
                ConfigError::InvalidValue(format!("repositories: {}", e))
            })?;
        }

        if let Some(path) = &self.manifest_path {
            if path.is_empty() || path.starts_with('/') {
                return Err(ConfigError::InvalidValue(format!(
                    "manifest_path '{}' must be a relative path",
                    path
                )));
            }
        }

        if let Some(api_base) = &self.api_base {
            if !(api_base.starts_with("https://") || api_base.starts_with("http://")) {
                return Err(ConfigError::InvalidValue(format!(
                    "api_base '{}' must be an http(s) URL",
                    api_base
                )));
            }
        }

        if self.concurrency == Some(0) {
            return Err(ConfigError::InvalidValue(
                "concurrency must be at least 1".into(),
            ));
        }

        if let Some(branch) = &self.branch {
            branch.validate()?;
        }

        Ok(())
    }
}

/// Branch naming settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BranchConfig {
    /// Prefix prepended to every generated branch
    pub prefix: Option<String>,

    /// Naming strategy
    pub naming: Option<BranchNaming>,
}

impl BranchConfig {
    /// Validate the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(prefix) = &self.prefix {
            let bad = prefix.starts_with('/')
                || prefix.starts_with('.')
                || prefix.starts_with('-')
                || prefix.contains("..")
                || prefix.contains("//")
                || prefix
                    .chars()
                    .any(|c| c.is_ascii_control() || " ~^:?*[\\".contains(c));
            if bad {
                return Err(ConfigError::InvalidValue(format!(
                    "branch prefix '{}' is not valid in a ref name",
                    prefix
                )));
            }
        }
        Ok(())
    }
}

/// Credential settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// Environment variable holding the API token
    pub token_env: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let toml = r#"
            repositories = ["apbarrero/earlyad", "git://github.com/auth0/wt-cli.git"]
            manifest_path = "package.json"
            api_base = "https://github.example.com/api/v3"
            concurrency = 4

            [branch]
            prefix = "deps/"
            naming = "timestamp"

            [auth]
            token_env = "EARLYAD_TOKEN"
        "#;

        let config: FileConfig = toml::from_str(toml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.repositories.len(), 2);
        assert_eq!(config.concurrency, Some(4));
        assert_eq!(
            config.branch.as_ref().and_then(|b| b.naming),
            Some(BranchNaming::Timestamp)
        );
        assert_eq!(
            config.auth.and_then(|a| a.token_env),
            Some("EARLYAD_TOKEN".to_string())
        );
    }

    #[test]
    fn empty_config_is_valid() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert!(config.validate().is_ok());
        assert!(config.repositories.is_empty());
    }

    #[test]
    fn invalid_repository_rejected() {
        let config = FileConfig {
            repositories: vec!["https://github.com/a/b".into()],
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("repositories"));
    }

    #[test]
    fn zero_concurrency_rejected() {
        let config = FileConfig {
            concurrency: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn absolute_manifest_path_rejected() {
        let config = FileConfig {
            manifest_path: Some("/etc/package.json".into()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn bad_api_base_rejected() {
        let config = FileConfig {
            api_base: Some("api.github.com".into()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn bad_branch_prefix_rejected() {
        for prefix in ["/x", "a..b", "has space/", "-x", "a:b"] {
            let branch = BranchConfig {
                prefix: Some(prefix.into()),
                naming: None,
            };
            assert!(branch.validate().is_err(), "prefix '{}' should fail", prefix);
        }
    }

    #[test]
    fn unknown_naming_rejected() {
        let result: Result<FileConfig, _> = toml::from_str("[branch]\nnaming = \"random\"");
        assert!(result.is_err());
    }
}
