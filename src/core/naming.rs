//! core::naming
//!
//! Branch names for proposed updates.
//!
//! # Strategies
//!
//! - [`BranchNaming::Content`]: derived from a hash of the repository being
//!   updated, the dependency and the tag. Redelivering the same event
//!   produces the same name, so the remote rejects the second branch instead
//!   of a duplicate pull request appearing.
//! - [`BranchNaming::Timestamp`]: suffixed with the current time in
//!   milliseconds, unique per attempt.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::reference::RepoRef;

/// Default prefix for generated branches.
pub const DEFAULT_BRANCH_PREFIX: &str = "earlyad/";

/// Number of hex digits of the content hash kept in branch names.
const HASH_LEN: usize = 12;

/// How update branches are named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchNaming {
    /// Stable name derived from the update's content.
    #[default]
    Content,
    /// Unique name per attempt.
    Timestamp,
}

impl std::fmt::Display for BranchNaming {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BranchNaming::Content => write!(f, "content"),
            BranchNaming::Timestamp => write!(f, "timestamp"),
        }
    }
}

/// Build the branch name for one update.
///
/// # Example
///
/// ```
/// use early_adopter::core::naming::{branch_name, BranchNaming};
/// use early_adopter::core::reference::RepoRef;
///
/// let repo = RepoRef::parse("acme/app").unwrap();
/// let dep = RepoRef::parse("baz/bar").unwrap();
///
/// let a = branch_name(BranchNaming::Content, "earlyad/", &repo, &dep, "1.0.1");
/// let b = branch_name(BranchNaming::Content, "earlyad/", &repo, &dep, "1.0.1");
/// assert_eq!(a, b);
/// assert!(a.starts_with("earlyad/bar-1.0.1-"));
/// ```
pub fn branch_name(
    naming: BranchNaming,
    prefix: &str,
    repository: &RepoRef,
    dependency: &RepoRef,
    tag: &str,
) -> String {
    let suffix = match naming {
        BranchNaming::Content => content_hash(repository, dependency, tag),
        BranchNaming::Timestamp => Utc::now().timestamp_millis().to_string(),
    };
    format!(
        "{}{}-{}-{}",
        prefix,
        sanitize(dependency.name()),
        sanitize(tag),
        suffix
    )
}

/// Hash of the update's identity, truncated to [`HASH_LEN`] hex digits.
fn content_hash(repository: &RepoRef, dependency: &RepoRef, tag: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(repository.slug().to_ascii_lowercase().as_bytes());
    hasher.update([0u8]);
    hasher.update(dependency.slug().to_ascii_lowercase().as_bytes());
    hasher.update([0u8]);
    hasher.update(tag.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..HASH_LEN].to_string()
}

/// Reduce a string to characters that are safe in a ref name component.
///
/// Keeps ASCII alphanumerics, `-`, `_` and single `.`; everything else
/// becomes `-`. Leading and trailing separators are trimmed.
fn sanitize(component: &str) -> String {
    let mut out = String::with_capacity(component.len());
    for c in component.chars() {
        let c = if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
            c
        } else {
            '-'
        };
        // ".." is not allowed in ref names
        if c == '.' && out.ends_with('.') {
            continue;
        }
        out.push(c);
    }
    out.trim_matches(|c| c == '-' || c == '.').to_string()
}
