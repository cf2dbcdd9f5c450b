//! engine::publish
//!
//! Turn an update candidate into a branch, a commit and a pull request.
//!
//! # Transaction
//!
//! Publishing one repository is five remote steps, each depending on the
//! previous one:
//!
//! 1. Read the default branch name and its tip commit
//! 2. Read the manifest's blob sha on that branch and check it is still the
//!    revision the update was computed from
//! 3. Create the update branch at the tip commit
//! 4. Commit the rewritten manifest, guarded by that blob sha
//! 5. Open a pull request from the update branch into the default branch
//!
//! A manifest that changed between scan and publish fails step 2 with
//! [`ForgeError::Conflict`]. The stale rewrite is never committed, so it
//! cannot revert the newer change.
//!
//! The first failing step ends the transaction. The failure names the step
//! and carries the forge error unchanged. Nothing is retried and nothing is
//! rolled back: when steps 4 or 5 fail the update branch stays on the
//! remote and is reported as [`PublishFailure::leftover_branch`].
//!
//! Steps 2 and 3 only depend on step 1, but they run in order so that a
//! manifest which vanished never leaves a stray branch behind.

use std::fmt;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::config::{DEFAULT_CONCURRENCY, DEFAULT_MANIFEST_PATH};
use crate::core::naming::{branch_name, BranchNaming, DEFAULT_BRANCH_PREFIX};
use crate::core::reference::RepoRef;
use crate::engine::scan::UpdateCandidate;
use crate::forge::{
    BranchTip, CommitInfo, CreatePrRequest, FileHandle, ForgeError, PullRequest, RepositoryHost,
    WriteFileRequest,
};

/// One step of the publish transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStep {
    ReadBranchTip,
    ReadFileHandle,
    CreateBranch,
    WriteFile,
    OpenPullRequest,
}

impl PublishStep {
    /// Position in the transaction, starting at 1.
    pub fn number(self) -> u8 {
        match self {
            PublishStep::ReadBranchTip => 1,
            PublishStep::ReadFileHandle => 2,
            PublishStep::CreateBranch => 3,
            PublishStep::WriteFile => 4,
            PublishStep::OpenPullRequest => 5,
        }
    }

    fn describe(self) -> &'static str {
        match self {
            PublishStep::ReadBranchTip => "read default branch",
            PublishStep::ReadFileHandle => "read manifest handle",
            PublishStep::CreateBranch => "create branch",
            PublishStep::WriteFile => "commit manifest",
            PublishStep::OpenPullRequest => "open pull request",
        }
    }
}

impl fmt::Display for PublishStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step {} ({})", self.number(), self.describe())
    }
}

/// Settings shared by every publish.
#[derive(Debug, Clone)]
pub struct PublishOptions {
    /// Manifest path inside each repository.
    pub manifest_path: String,
    /// Prefix for update branch names.
    pub branch_prefix: String,
    /// How the branch suffix is chosen.
    pub naming: BranchNaming,
    /// Open pull requests as drafts.
    pub draft: bool,
    /// Bound on concurrent transactions in [`Publisher::publish_all`].
    pub concurrency: usize,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            manifest_path: DEFAULT_MANIFEST_PATH.to_string(),
            branch_prefix: DEFAULT_BRANCH_PREFIX.to_string(),
            naming: BranchNaming::default(),
            draft: false,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// State accumulated while a transaction runs, one field per step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishTransaction {
    pub branch_name: String,
    pub base: Option<BranchTip>,
    pub manifest: Option<FileHandle>,
    pub branch_created: bool,
    pub commit: Option<CommitInfo>,
    pub pull_request: Option<PullRequest>,
}

impl PublishTransaction {
    fn new(branch_name: String) -> Self {
        Self {
            branch_name,
            ..Self::default()
        }
    }

    /// Number of leading steps that completed.
    pub fn completed_steps(&self) -> u8 {
        let done = [
            self.base.is_some(),
            self.manifest.is_some(),
            self.branch_created,
            self.commit.is_some(),
            self.pull_request.is_some(),
        ];
        done.iter().take_while(|step| **step).count() as u8
    }
}

/// A completed publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedChange {
    pub repository: RepoRef,
    pub branch: String,
    pub commit: String,
    pub pull_request: PullRequest,
}

/// A publish that stopped at `step`.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[error("{repository}: {step} failed: {error}")]
pub struct PublishFailure {
    pub repository: RepoRef,
    pub step: PublishStep,
    pub error: ForgeError,
    /// Update branch left on the remote, if step 3 had succeeded.
    pub leftover_branch: Option<String>,
}

pub type PublishResult = Result<PublishedChange, PublishFailure>;

/// Pull request title for an update.
pub fn pull_request_title(dependency: &RepoRef, tag: &str) -> String {
    format!("Update dependency on {} to new version {}", dependency, tag)
}

/// Pull request body for an update.
pub fn pull_request_body(candidate: &UpdateCandidate, manifest_path: &str) -> String {
    let update = &candidate.update;
    format!(
        "Updates `{}` in `{}`.\n\n\
         - Dependency: {}\n\
         - From: `{}`\n\
         - To: `{}`\n",
        update.dependency,
        manifest_path,
        candidate.dependency.without_fragment(),
        update.previous,
        update.current,
    )
}

/// Runs publish transactions against a [`RepositoryHost`].
#[derive(Clone)]
pub struct Publisher {
    host: Arc<dyn RepositoryHost>,
    options: PublishOptions,
}

impl fmt::Debug for Publisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publisher")
            .field("host", &self.host.name())
            .field("options", &self.options)
            .finish()
    }
}

impl Publisher {
    pub fn new(host: Arc<dyn RepositoryHost>, options: PublishOptions) -> Self {
        Self { host, options }
    }

    pub fn options(&self) -> &PublishOptions {
        &self.options
    }

    /// Branch name a candidate would be published under.
    pub fn branch_for(&self, candidate: &UpdateCandidate) -> String {
        branch_name(
            self.options.naming,
            &self.options.branch_prefix,
            &candidate.repository,
            &candidate.dependency,
            &candidate.tag,
        )
    }

    /// Publish every candidate, at most `concurrency` at a time.
    ///
    /// Results are in input order. One failure never affects the others.
    pub async fn publish_all(
        &self,
        candidates: &[UpdateCandidate],
        title: &str,
    ) -> Vec<PublishResult> {
        stream::iter(candidates.iter().cloned())
            .map(|candidate| {
                let publisher = self.clone();
                let title = title.to_string();
                async move { publisher.publish(&candidate, &title).await }
            })
            .buffered(self.options.concurrency.max(1))
            .collect()
            .await
    }

    /// Run the five-step transaction for one candidate.
    ///
    /// `title` is used for both the commit message and the pull request.
    pub async fn publish(&self, candidate: &UpdateCandidate, title: &str) -> PublishResult {
        let repo = &candidate.repository;
        let mut tx = PublishTransaction::new(self.branch_for(candidate));
        debug!(repo = %repo.slug(), branch = %tx.branch_name, "publishing update");

        let base = self
            .host
            .default_branch_tip(repo)
            .await
            .map_err(|e| self.failure(candidate, &tx, PublishStep::ReadBranchTip, e))?;
        tx.base = Some(base.clone());

        let handle = self
            .host
            .file_handle(repo, &self.options.manifest_path, &base.branch)
            .await
            .map_err(|e| self.failure(candidate, &tx, PublishStep::ReadFileHandle, e))?;
        if handle.sha != candidate.source_sha {
            let error = ForgeError::Conflict(format!(
                "{} changed since it was scanned ({} is now {})",
                handle.path, candidate.source_sha, handle.sha
            ));
            return Err(self.failure(candidate, &tx, PublishStep::ReadFileHandle, error));
        }
        tx.manifest = Some(handle);

        self.host
            .create_branch(repo, &tx.branch_name, &base.sha)
            .await
            .map_err(|e| self.failure(candidate, &tx, PublishStep::CreateBranch, e))?;
        tx.branch_created = true;

        let commit = self
            .host
            .write_file(
                repo,
                WriteFileRequest {
                    path: self.options.manifest_path.clone(),
                    branch: tx.branch_name.clone(),
                    content: candidate.manifest().to_json(),
                    message: title.to_string(),
                    expected_sha: candidate.source_sha.clone(),
                },
            )
            .await
            .map_err(|e| self.failure(candidate, &tx, PublishStep::WriteFile, e))?;
        tx.commit = Some(commit.clone());

        let pull_request = self
            .host
            .open_pull_request(
                repo,
                CreatePrRequest {
                    head: tx.branch_name.clone(),
                    base: base.branch,
                    title: title.to_string(),
                    body: Some(pull_request_body(candidate, &self.options.manifest_path)),
                    draft: self.options.draft,
                },
            )
            .await
            .map_err(|e| self.failure(candidate, &tx, PublishStep::OpenPullRequest, e))?;
        tx.pull_request = Some(pull_request.clone());
        debug!(repo = %repo.slug(), steps = tx.completed_steps(), "transaction complete");

        info!(
            repo = %repo.slug(),
            number = pull_request.number,
            url = %pull_request.url,
            "opened pull request"
        );

        Ok(PublishedChange {
            repository: repo.clone(),
            branch: tx.branch_name,
            commit: commit.sha,
            pull_request,
        })
    }

    fn failure(
        &self,
        candidate: &UpdateCandidate,
        tx: &PublishTransaction,
        step: PublishStep,
        error: ForgeError,
    ) -> PublishFailure {
        warn!(
            repo = %candidate.repository.slug(),
            %step,
            completed = tx.completed_steps(),
            %error,
            "publish failed"
        );
        PublishFailure {
            repository: candidate.repository.clone(),
            step,
            error,
            leftover_branch: tx.branch_created.then(|| tx.branch_name.clone()),
        }
    }
}
