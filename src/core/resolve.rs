//! core::resolve
//!
//! Dependency resolution: decide whether a manifest pins an older version of
//! a freshly tagged repository and, if so, compute the rewritten manifest.
//!
//! # Rules
//!
//! - Entries are examined in file order; the first whose reference names the
//!   target repository decides the outcome. Later duplicates are ignored.
//! - If that entry has no fragment, or its fragment is not a semantic
//!   version, the whole manifest is left alone.
//! - The entry is rewritten only when the target version is strictly newer.
//!   The new fragment is the tag exactly as pushed, and the rest of the
//!   declaration (short or canonical spelling) is kept.
//!
//! `resolve` is pure: same inputs, same result, and the input manifest is
//! never modified.
//!
//! # Example
//!
//! ```
//! use early_adopter::core::manifest::Manifest;
//! use early_adopter::core::resolve::{resolve, Resolution, UpdateTarget};
//!
//! let manifest = Manifest::from_json(
//!     r#"{"dependencies": {"bar": "git://github.com/baz/bar.git#1.0.0"}}"#,
//! ).unwrap();
//! let target = UpdateTarget::new("baz/bar", "1.0.1").unwrap();
//!
//! match resolve(&manifest, &target) {
//!     Resolution::Updated(update) => {
//!         assert_eq!(
//!             update.manifest.dependency("bar"),
//!             Some("git://github.com/baz/bar.git#1.0.1"),
//!         );
//!     }
//!     Resolution::NoChange(reason) => panic!("unexpected: {}", reason),
//! }
//! ```

use std::fmt;

use semver::Version;
use serde::Serialize;
use thiserror::Error;

use super::manifest::Manifest;
use super::reference::{ReferenceError, RepoRef};
use super::version::parse_version;

/// Errors from building an update target.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TargetError {
    #[error(transparent)]
    InvalidReference(#[from] ReferenceError),

    #[error("tag '{0}' is not a semantic version")]
    InvalidVersion(String),
}

/// The dependency that was just tagged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateTarget {
    /// The tagged repository (fragment stripped).
    pub reference: RepoRef,
    /// Parsed version of the tag.
    pub version: Version,
    /// The tag as pushed, written into rewritten declarations.
    pub tag: String,
}

impl UpdateTarget {
    /// Build a target from a repository reference and a tag.
    ///
    /// # Errors
    ///
    /// Fails if the reference is not an accepted form or the tag is not a
    /// semantic version.
    pub fn new(reference: &str, tag: &str) -> Result<Self, TargetError> {
        let reference = RepoRef::parse(reference)?.without_fragment();
        let version =
            parse_version(tag).ok_or_else(|| TargetError::InvalidVersion(tag.to_string()))?;
        Ok(Self {
            reference,
            version,
            tag: tag.to_string(),
        })
    }
}

/// A manifest with exactly one dependency declaration rewritten.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdatedManifest {
    /// The rewritten manifest.
    pub manifest: Manifest,
    /// Name of the rewritten dependency.
    pub dependency: String,
    /// Declaration before the rewrite.
    pub previous: String,
    /// Declaration after the rewrite.
    pub current: String,
}

/// Why a manifest was left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// No dependency references the target repository.
    NotDeclared,
    /// The matching dependency is not pinned to a semantic version.
    Unversioned {
        dependency: String,
        fragment: Option<String>,
    },
    /// The matching dependency is already at or past the target version.
    UpToDate { dependency: String, current: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotDeclared => write!(f, "dependency not declared"),
            SkipReason::Unversioned {
                dependency,
                fragment: Some(fragment),
            } => write!(f, "'{}' is pinned to non-version '{}'", dependency, fragment),
            SkipReason::Unversioned {
                dependency,
                fragment: None,
            } => write!(f, "'{}' is not pinned to a version", dependency),
            SkipReason::UpToDate {
                dependency,
                current,
            } => write!(f, "'{}' already at {}", dependency, current),
        }
    }
}

/// Outcome of [`resolve`].
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The manifest needs the contained update.
    Updated(UpdatedManifest),
    /// The manifest stays as it is.
    NoChange(SkipReason),
}

impl Resolution {
    /// The updated manifest, if any.
    pub fn into_update(self) -> Option<UpdatedManifest> {
        match self {
            Resolution::Updated(update) => Some(update),
            Resolution::NoChange(_) => None,
        }
    }

    /// Check whether the manifest was left unchanged.
    pub fn is_no_change(&self) -> bool {
        matches!(self, Resolution::NoChange(_))
    }
}

/// Resolve `target` against `manifest`.
pub fn resolve(manifest: &Manifest, target: &UpdateTarget) -> Resolution {
    let matched = manifest
        .entries()
        .find(|entry| entry.reference.same_repository(&target.reference));

    let entry = match matched {
        Some(entry) => entry,
        None => return Resolution::NoChange(SkipReason::NotDeclared),
    };

    let current = match &entry.version {
        Some(version) => version,
        None => {
            return Resolution::NoChange(SkipReason::Unversioned {
                dependency: entry.name,
                fragment: entry.reference.fragment().map(str::to_string),
            })
        }
    };

    if target.version <= *current {
        return Resolution::NoChange(SkipReason::UpToDate {
            current: entry.reference.fragment().unwrap_or_default().to_string(),
            dependency: entry.name,
        });
    }

    // A versioned entry always came from a declaration with a '#'.
    let previous = manifest.dependency(&entry.name).unwrap_or_default().to_string();
    let body = previous.split_once('#').map_or(previous.as_str(), |(body, _)| body);
    let declaration = format!("{}#{}", body, target.tag);

    Resolution::Updated(UpdatedManifest {
        manifest: manifest.with_dependency(&entry.name, &declaration),
        dependency: entry.name,
        previous,
        current: declaration,
    })
}
