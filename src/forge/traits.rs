//! forge::traits
//!
//! Collaborator traits for reading from and writing to a hosted repository
//! service.
//!
//! # Design
//!
//! The traits are async because every operation is a network round trip.
//! All methods return `Result<_, ForgeError>`; none of them retry.
//!
//! Two traits are kept apart because the scanner only reads manifests while
//! the publisher mutates repositories. A single implementation (GitHub, the
//! mock) usually provides both.
//!
//! # Example
//!
//! ```ignore
//! use early_adopter::forge::{RepositoryHost, CreatePrRequest};
//!
//! async fn open(host: &dyn RepositoryHost, repo: &RepoRef) -> Result<(), ForgeError> {
//!     let tip = host.default_branch_tip(repo).await?;
//!     host.create_branch(repo, "earlyad/bar-1.0.1", &tip.sha).await?;
//!     let pr = host.open_pull_request(repo, CreatePrRequest {
//!         head: "earlyad/bar-1.0.1".to_string(),
//!         base: tip.branch,
//!         title: "Update bar".to_string(),
//!         body: None,
//!         draft: false,
//!     }).await?;
//!     println!("Opened PR #{}: {}", pr.number, pr.url);
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::core::manifest::Manifest;
use crate::core::reference::RepoRef;

/// Errors from forge operations.
///
/// These map to the failure modes of a hosted git service.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ForgeError {
    /// No credential was configured.
    #[error("authentication required")]
    AuthRequired,

    /// The credential is invalid or lacks permission.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The remote state differs from what the request expected
    /// (stale file sha, branch already exists).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Rate limit exceeded.
    #[error("rate limited")]
    RateLimited,

    /// API returned an error not covered above.
    #[error("API error: {status} - {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// Network or connection error.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The remote returned content that could not be interpreted.
    #[error("invalid content: {0}")]
    InvalidContent(String),
}

impl ForgeError {
    /// Check whether retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ForgeError::RateLimited | ForgeError::NetworkError(_) => true,
            ForgeError::ApiError { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Tip of a repository's default branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchTip {
    /// Branch name (e.g. `main`)
    pub branch: String,
    /// Commit sha at the tip
    pub sha: String,
}

/// Content-addressing handle of a file at some revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    /// Path inside the repository
    pub path: String,
    /// Blob sha; the precondition for a later write
    pub sha: String,
}

/// A parsed manifest and the blob sha it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedManifest {
    pub manifest: Manifest,
    /// Blob sha of the file as read; later writes are guarded by it
    pub sha: String,
}

/// Request to replace a file's content on a branch.
#[derive(Debug, Clone)]
pub struct WriteFileRequest {
    /// Path inside the repository
    pub path: String,
    /// Branch receiving the commit
    pub branch: String,
    /// New file content
    pub content: String,
    /// Commit message
    pub message: String,
    /// Blob sha the file must currently have; the write fails otherwise
    pub expected_sha: String,
}

/// Commit produced by a file write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    /// Commit sha
    pub sha: String,
}

/// Request to create a pull request.
#[derive(Debug, Clone)]
pub struct CreatePrRequest {
    /// Head branch name (the branch with changes)
    pub head: String,
    /// Base branch name (the branch to merge into)
    pub base: String,
    /// PR title
    pub title: String,
    /// PR body/description
    pub body: Option<String>,
    /// Create as draft
    pub draft: bool,
}

/// Pull request information returned from the forge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequest {
    /// PR number
    pub number: u64,
    /// PR URL (web URL for viewing)
    pub url: String,
    /// Head branch name
    pub head: String,
    /// Base branch name
    pub base: String,
    /// PR title
    pub title: String,
}

/// Read access to repository manifests.
///
/// Implementations must be `Send + Sync`; the scanner calls them from many
/// concurrent tasks.
#[async_trait]
pub trait ManifestSource: Send + Sync {
    /// Fetch and parse the manifest at `path` on the default branch.
    ///
    /// Only owner and name of `repo` are used. The returned sha identifies
    /// the exact revision of the file that was parsed.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the repository or file does not exist
    /// - `PermissionDenied` if the credential cannot read it
    /// - `RateLimited` / `NetworkError` for transient failures
    /// - `InvalidContent` if the file is not a JSON object
    async fn fetch_manifest(
        &self,
        repo: &RepoRef,
        path: &str,
    ) -> Result<FetchedManifest, ForgeError>;
}

/// Write access to repositories, in the granularity the publisher needs.
///
/// # Error Handling
///
/// Callers should expect:
/// - `NotFound`: repository, branch or file is missing
/// - `Conflict`: stale precondition or branch already exists
/// - `PermissionDenied`: credential lacks write access
/// - `RateLimited` / `NetworkError`: transient, safe to retry later
#[async_trait]
pub trait RepositoryHost: Send + Sync {
    /// Get the forge name (e.g., "github").
    fn name(&self) -> &'static str;

    /// Read the name and tip commit of the default branch.
    async fn default_branch_tip(&self, repo: &RepoRef) -> Result<BranchTip, ForgeError>;

    /// Read the handle of the file at `path` on `branch`.
    async fn file_handle(
        &self,
        repo: &RepoRef,
        path: &str,
        branch: &str,
    ) -> Result<FileHandle, ForgeError>;

    /// Create `branch` pointing at commit `sha`.
    ///
    /// Fails with `Conflict` when the branch already exists.
    async fn create_branch(&self, repo: &RepoRef, branch: &str, sha: &str)
        -> Result<(), ForgeError>;

    /// Commit new file content, guarded by `request.expected_sha`.
    ///
    /// Fails with `Conflict` when the file's current sha differs.
    async fn write_file(
        &self,
        repo: &RepoRef,
        request: WriteFileRequest,
    ) -> Result<CommitInfo, ForgeError>;

    /// Open a pull request.
    async fn open_pull_request(
        &self,
        repo: &RepoRef,
        request: CreatePrRequest,
    ) -> Result<PullRequest, ForgeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forge_error_display() {
        assert_eq!(
            format!("{}", ForgeError::AuthRequired),
            "authentication required"
        );
        assert_eq!(
            format!("{}", ForgeError::PermissionDenied("read-only token".into())),
            "permission denied: read-only token"
        );
        assert_eq!(
            format!("{}", ForgeError::NotFound("package.json".into())),
            "not found: package.json"
        );
        assert_eq!(
            format!("{}", ForgeError::Conflict("sha mismatch".into())),
            "conflict: sha mismatch"
        );
        assert_eq!(format!("{}", ForgeError::RateLimited), "rate limited");
        assert_eq!(
            format!(
                "{}",
                ForgeError::ApiError {
                    status: 422,
                    message: "Validation failed".into()
                }
            ),
            "API error: 422 - Validation failed"
        );
        assert_eq!(
            format!("{}", ForgeError::NetworkError("connection refused".into())),
            "network error: connection refused"
        );
    }

    #[test]
    fn transient_errors() {
        assert!(ForgeError::RateLimited.is_transient());
        assert!(ForgeError::NetworkError("reset".into()).is_transient());
        assert!(ForgeError::ApiError {
            status: 502,
            message: "bad gateway".into()
        }
        .is_transient());
        assert!(!ForgeError::Conflict("stale".into()).is_transient());
        assert!(!ForgeError::NotFound("x".into()).is_transient());
    }

    #[test]
    fn forge_error_serializes_with_kind() {
        let json = serde_json::to_value(ForgeError::Conflict("stale".into())).unwrap();
        assert_eq!(json["kind"], "conflict");
        assert_eq!(json["detail"], "stale");

        let json = serde_json::to_value(ForgeError::RateLimited).unwrap();
        assert_eq!(json["kind"], "rate_limited");
    }
}
