//! core::reference
//!
//! Repository references and their normalization.
//!
//! # Accepted Forms
//!
//! A reference may be written in two shapes:
//!
//! 1. Canonical: `git://<host>/<owner>/<name>.git[#<fragment>]`
//! 2. Short: `<owner>/<name>[#<fragment>]`, which expands to the canonical
//!    form on [`DEFAULT_HOST`]
//!
//! Canonical owner and name segments may hold any character except `/`,
//! `#` and whitespace, so a canonical URL always passes through unchanged.
//! Short owner and name segments follow GitHub's naming rules, which keeps
//! scp-style URLs and npm version ranges from being read as short refs.
//!
//! Every other shape is rejected. Two references denote the same repository
//! when their owner and name match (ASCII case-insensitively), whatever
//! spelling or fragment they were written with.
//!
//! # Example
//!
//! ```
//! use early_adopter::core::reference::RepoRef;
//!
//! let short = RepoRef::parse("baz/bar").unwrap();
//! let full = RepoRef::parse("git://github.com/baz/bar.git#1.0.0").unwrap();
//!
//! assert!(short.same_repository(&full));
//! assert_eq!(short.canonical(), "git://github.com/baz/bar.git");
//! assert_eq!(full.fragment(), Some("1.0.0"));
//! ```

use std::fmt;
use std::str::FromStr;

use semver::Version;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::version::parse_version;

/// Host used when expanding short `owner/name` references.
pub const DEFAULT_HOST: &str = "github.com";

const SCHEME: &str = "git://";
const GIT_SUFFIX: &str = ".git";

/// Errors from reference parsing.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("repository reference is empty")]
    Empty,

    #[error("unrecognized repository reference '{0}'")]
    Unrecognized(String),
}

/// A normalized reference to a remote repository.
///
/// Stores the pieces of the canonical URL so that owner/name lookups never
/// need to re-parse. The optional fragment is kept verbatim; for dependency
/// declarations it carries the pinned version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoRef {
    host: String,
    owner: String,
    name: String,
    fragment: Option<String>,
}

impl RepoRef {
    /// Parse a canonical or short reference.
    ///
    /// # Errors
    ///
    /// Returns `ReferenceError::Empty` for an empty string and
    /// `ReferenceError::Unrecognized` for any shape other than the two
    /// accepted forms.
    pub fn parse(raw: &str) -> Result<Self, ReferenceError> {
        if raw.is_empty() {
            return Err(ReferenceError::Empty);
        }

        let unrecognized = || ReferenceError::Unrecognized(raw.to_string());

        let (body, fragment) = match raw.split_once('#') {
            Some((body, fragment)) => (body, Some(fragment.to_string())),
            None => (raw, None),
        };

        if let Some(path) = body.strip_prefix(SCHEME) {
            let path = path.strip_suffix(GIT_SUFFIX).ok_or_else(unrecognized)?;
            let mut parts = path.split('/');
            let (host, owner, name) = match (parts.next(), parts.next(), parts.next(), parts.next())
            {
                (Some(host), Some(owner), Some(name), None) => (host, owner, name),
                _ => return Err(unrecognized()),
            };
            if !is_path_segment(host) || !is_path_segment(owner) || !is_path_segment(name) {
                return Err(unrecognized());
            }
            return Ok(Self {
                host: host.to_string(),
                owner: owner.to_string(),
                name: name.to_string(),
                fragment,
            });
        }

        let (owner, name) = body.split_once('/').ok_or_else(unrecognized)?;
        if !is_valid_segment(owner) || !is_valid_segment(name) {
            return Err(unrecognized());
        }

        Ok(Self {
            host: DEFAULT_HOST.to_string(),
            owner: owner.to_string(),
            name: name.to_string(),
            fragment,
        })
    }

    /// Host component of the canonical URL.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Repository owner (user or organization).
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Repository name, without the `.git` suffix.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The text after `#`, if any.
    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    /// The fragment interpreted as a semantic version.
    ///
    /// `None` when there is no fragment or it is not a valid version.
    pub fn version(&self) -> Option<Version> {
        self.fragment().and_then(parse_version)
    }

    /// `owner/name`, the key used for remote API calls.
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// The canonical `git://host/owner/name.git[#fragment]` spelling.
    pub fn canonical(&self) -> String {
        let mut url = format!("{}{}/{}/{}{}", SCHEME, self.host, self.owner, self.name, GIT_SUFFIX);
        if let Some(fragment) = &self.fragment {
            url.push('#');
            url.push_str(fragment);
        }
        url
    }

    /// The same repository with its fragment removed.
    pub fn without_fragment(&self) -> Self {
        Self {
            fragment: None,
            ..self.clone()
        }
    }

    /// Check whether two references point at the same repository.
    ///
    /// Only owner and name take part in the comparison.
    pub fn same_repository(&self, other: &RepoRef) -> bool {
        self.owner.eq_ignore_ascii_case(&other.owner) && self.name.eq_ignore_ascii_case(&other.name)
    }
}

/// A non-empty canonical URL segment. `/` and `#` never reach here.
fn is_path_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.chars().any(char::is_whitespace)
}

/// Short-form owner and name segments follow GitHub's naming rules: ASCII alphanumerics,
/// `-`, `_` and `.`, and never a bare `.` or `..`.
fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

impl FromStr for RepoRef {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RepoRef {
    type Error = ReferenceError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<RepoRef> for String {
    fn from(reference: RepoRef) -> Self {
        reference.canonical()
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

/// Normalize any accepted spelling to its canonical URL.
///
/// Returns `None` for unrecognized input.
pub fn normalize(raw: &str) -> Option<String> {
    RepoRef::parse(raw).ok().map(|r| r.canonical())
}

/// Extract `(owner, name)` from either accepted spelling.
pub fn owner_and_name(raw: &str) -> Option<(String, String)> {
    RepoRef::parse(raw)
        .ok()
        .map(|r| (r.owner, r.name))
}
