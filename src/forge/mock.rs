//! forge::mock
//!
//! Mock forge implementation for deterministic testing.
//!
//! # Design
//!
//! The mock keeps repositories, branches, files and pull requests in
//! memory. Each branch holds its own snapshot of files, `create_branch`
//! copies the snapshot of the branch whose tip matches the requested sha,
//! and `write_file` enforces the expected-sha precondition the way the real
//! service does. Operations can be configured to fail, for every repository
//! or for one.
//!
//! # Example
//!
//! ```
//! use early_adopter::core::reference::RepoRef;
//! use early_adopter::forge::mock::MockForge;
//! use early_adopter::forge::ManifestSource;
//!
//! # tokio_test::block_on(async {
//! let forge = MockForge::new()
//!     .with_repository("acme/app", "main", &[("package.json", r#"{"name": "app"}"#)]);
//!
//! let repo = RepoRef::parse("acme/app").unwrap();
//! let fetched = forge.fetch_manifest(&repo, "package.json").await.unwrap();
//! assert_eq!(fetched.manifest.fields()["name"], "app");
//! # });
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::traits::{
    BranchTip, CommitInfo, CreatePrRequest, FetchedManifest, FileHandle, ForgeError,
    ManifestSource, PullRequest, RepositoryHost, WriteFileRequest,
};
use crate::core::manifest::Manifest;
use crate::core::reference::RepoRef;

/// Mock forge for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockForge {
    /// Internal state shared across clones.
    inner: Arc<Mutex<MockForgeInner>>,
}

/// Internal mutable state.
#[derive(Debug, Default)]
struct MockForgeInner {
    /// Repositories keyed by lowercase `owner/name`.
    repos: HashMap<String, MockRepo>,
    /// Opened PRs, per repository key.
    prs: Vec<(String, PullRequest)>,
    /// Next PR number to assign.
    next_pr_number: u64,
    /// Counter used to mint commit shas.
    next_commit: u64,
    /// Configured failures, optionally scoped to one repository key.
    failures: Vec<(Option<String>, FailOn)>,
    /// Recorded operations for verification.
    operations: Vec<MockOperation>,
}

#[derive(Debug, Clone)]
struct MockRepo {
    default_branch: String,
    branches: HashMap<String, MockBranch>,
}

#[derive(Debug, Clone)]
struct MockBranch {
    tip: String,
    files: BTreeMap<String, MockFile>,
}

#[derive(Debug, Clone)]
struct MockFile {
    content: String,
    sha: String,
}

impl MockFile {
    fn new(content: &str) -> Self {
        Self {
            content: content.to_string(),
            sha: blob_sha(content),
        }
    }
}

/// Configuration for which operation should fail.
#[derive(Debug, Clone)]
pub enum FailOn {
    /// Fail fetch_manifest with the given error.
    FetchManifest(ForgeError),
    /// Fail default_branch_tip with the given error.
    DefaultBranchTip(ForgeError),
    /// Fail file_handle with the given error.
    FileHandle(ForgeError),
    /// Fail create_branch with the given error.
    CreateBranch(ForgeError),
    /// Fail write_file with the given error.
    WriteFile(ForgeError),
    /// Fail open_pull_request with the given error.
    OpenPullRequest(ForgeError),
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    FetchManifest {
        repo: String,
        path: String,
    },
    DefaultBranchTip {
        repo: String,
    },
    FileHandle {
        repo: String,
        path: String,
        branch: String,
    },
    CreateBranch {
        repo: String,
        branch: String,
        sha: String,
    },
    WriteFile {
        repo: String,
        path: String,
        branch: String,
        expected_sha: String,
    },
    OpenPullRequest {
        repo: String,
        head: String,
        base: String,
        title: String,
    },
}

impl MockOperation {
    /// The `owner/name` key of the repository the operation targeted.
    pub fn repo(&self) -> &str {
        match self {
            MockOperation::FetchManifest { repo, .. }
            | MockOperation::DefaultBranchTip { repo }
            | MockOperation::FileHandle { repo, .. }
            | MockOperation::CreateBranch { repo, .. }
            | MockOperation::WriteFile { repo, .. }
            | MockOperation::OpenPullRequest { repo, .. } => repo,
        }
    }
}

/// Deterministic stand-in for a git blob sha.
fn blob_sha(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))[..40].to_string()
}

fn repo_key(repo: &RepoRef) -> String {
    repo.slug().to_ascii_lowercase()
}

impl MockForge {
    /// Create a new empty mock forge.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a repository whose default branch holds `files`.
    pub fn with_repository(self, slug: &str, default_branch: &str, files: &[(&str, &str)]) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.next_commit += 1;
            let tip = format!("{:040x}", inner.next_commit);
            let files = files
                .iter()
                .map(|(path, content)| (path.to_string(), MockFile::new(content)))
                .collect();
            let mut branches = HashMap::new();
            branches.insert(default_branch.to_string(), MockBranch { tip, files });
            inner.repos.insert(
                slug.to_ascii_lowercase(),
                MockRepo {
                    default_branch: default_branch.to_string(),
                    branches,
                },
            );
        }
        self
    }

    /// Configure an operation to fail for every repository.
    ///
    /// # Example
    ///
    /// ```
    /// use early_adopter::forge::mock::{MockForge, FailOn};
    /// use early_adopter::forge::ForgeError;
    ///
    /// let forge = MockForge::new()
    ///     .fail_on(FailOn::OpenPullRequest(ForgeError::RateLimited));
    /// ```
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.failures.push((None, fail_on));
        }
        self
    }

    /// Configure an operation to fail for one repository only.
    pub fn fail_on_repo(self, slug: &str, fail_on: FailOn) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            inner
                .failures
                .push((Some(slug.to_ascii_lowercase()), fail_on));
        }
        self
    }

    /// Clear the failure configuration.
    pub fn clear_fail_on(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.failures.clear();
    }

    /// Replace a file on a branch, as an out-of-band push would.
    pub fn push_file(&self, slug: &str, branch: &str, path: &str, content: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.next_commit += 1;
        let tip = format!("{:040x}", inner.next_commit);
        if let Some(b) = inner
            .repos
            .get_mut(&slug.to_ascii_lowercase())
            .and_then(|r| r.branches.get_mut(branch))
        {
            b.files.insert(path.to_string(), MockFile::new(content));
            b.tip = tip;
        }
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<MockOperation> {
        let inner = self.inner.lock().unwrap();
        inner.operations.clone()
    }

    /// Recorded operations for one repository.
    pub fn operations_for(&self, slug: &str) -> Vec<MockOperation> {
        let key = slug.to_ascii_lowercase();
        self.operations()
            .into_iter()
            .filter(|op| op.repo() == key)
            .collect()
    }

    /// Clear recorded operations.
    pub fn clear_operations(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.clear();
    }

    /// Branch names of a repository, sorted.
    pub fn branches(&self, slug: &str) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        let mut names: Vec<String> = inner
            .repos
            .get(&slug.to_ascii_lowercase())
            .map(|r| r.branches.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Content of a file on a branch (for test verification).
    pub fn file_content(&self, slug: &str, branch: &str, path: &str) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        inner
            .repos
            .get(&slug.to_ascii_lowercase())
            .and_then(|r| r.branches.get(branch))
            .and_then(|b| b.files.get(path))
            .map(|f| f.content.clone())
    }

    /// Opened PRs for one repository.
    pub fn pull_requests(&self, slug: &str) -> Vec<PullRequest> {
        let key = slug.to_ascii_lowercase();
        let inner = self.inner.lock().unwrap();
        inner
            .prs
            .iter()
            .filter(|(repo, _)| *repo == key)
            .map(|(_, pr)| pr.clone())
            .collect()
    }

    /// Total number of opened PRs.
    pub fn pr_count(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.prs.len()
    }

    /// Record an operation.
    fn record(&self, op: MockOperation) {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(op);
    }

    /// Check if we should fail and return the error if so.
    fn check_fail(&self, key: &str, expected: &str) -> Option<ForgeError> {
        let inner = self.inner.lock().unwrap();
        inner
            .failures
            .iter()
            .filter(|(scope, _)| scope.as_deref().map_or(true, |s| s == key))
            .find_map(|(_, fail)| match fail {
                FailOn::FetchManifest(e) if expected == "fetch_manifest" => Some(e.clone()),
                FailOn::DefaultBranchTip(e) if expected == "default_branch_tip" => Some(e.clone()),
                FailOn::FileHandle(e) if expected == "file_handle" => Some(e.clone()),
                FailOn::CreateBranch(e) if expected == "create_branch" => Some(e.clone()),
                FailOn::WriteFile(e) if expected == "write_file" => Some(e.clone()),
                FailOn::OpenPullRequest(e) if expected == "open_pull_request" => Some(e.clone()),
                _ => None,
            })
    }
}

fn not_found_repo(key: &str) -> ForgeError {
    ForgeError::NotFound(format!("repository {}", key))
}

#[async_trait]
impl ManifestSource for MockForge {
    async fn fetch_manifest(
        &self,
        repo: &RepoRef,
        path: &str,
    ) -> Result<FetchedManifest, ForgeError> {
        let key = repo_key(repo);
        self.record(MockOperation::FetchManifest {
            repo: key.clone(),
            path: path.to_string(),
        });

        if let Some(err) = self.check_fail(&key, "fetch_manifest") {
            return Err(err);
        }

        let file = {
            let inner = self.inner.lock().unwrap();
            let r = inner.repos.get(&key).ok_or_else(|| not_found_repo(&key))?;
            r.branches
                .get(&r.default_branch)
                .and_then(|b| b.files.get(path))
                .cloned()
                .ok_or_else(|| ForgeError::NotFound(path.to_string()))?
        };

        let manifest = Manifest::from_json(&file.content)
            .map_err(|e| ForgeError::InvalidContent(format!("{}: {}", path, e)))?;
        Ok(FetchedManifest {
            manifest,
            sha: file.sha,
        })
    }
}

#[async_trait]
impl RepositoryHost for MockForge {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn default_branch_tip(&self, repo: &RepoRef) -> Result<BranchTip, ForgeError> {
        let key = repo_key(repo);
        self.record(MockOperation::DefaultBranchTip { repo: key.clone() });

        if let Some(err) = self.check_fail(&key, "default_branch_tip") {
            return Err(err);
        }

        let inner = self.inner.lock().unwrap();
        let r = inner.repos.get(&key).ok_or_else(|| not_found_repo(&key))?;
        let branch = r
            .branches
            .get(&r.default_branch)
            .ok_or_else(|| ForgeError::NotFound(format!("branch {}", r.default_branch)))?;
        Ok(BranchTip {
            branch: r.default_branch.clone(),
            sha: branch.tip.clone(),
        })
    }

    async fn file_handle(
        &self,
        repo: &RepoRef,
        path: &str,
        branch: &str,
    ) -> Result<FileHandle, ForgeError> {
        let key = repo_key(repo);
        self.record(MockOperation::FileHandle {
            repo: key.clone(),
            path: path.to_string(),
            branch: branch.to_string(),
        });

        if let Some(err) = self.check_fail(&key, "file_handle") {
            return Err(err);
        }

        let inner = self.inner.lock().unwrap();
        let r = inner.repos.get(&key).ok_or_else(|| not_found_repo(&key))?;
        let file = r
            .branches
            .get(branch)
            .and_then(|b| b.files.get(path))
            .ok_or_else(|| ForgeError::NotFound(format!("{} on {}", path, branch)))?;
        Ok(FileHandle {
            path: path.to_string(),
            sha: file.sha.clone(),
        })
    }

    async fn create_branch(
        &self,
        repo: &RepoRef,
        branch: &str,
        sha: &str,
    ) -> Result<(), ForgeError> {
        let key = repo_key(repo);
        self.record(MockOperation::CreateBranch {
            repo: key.clone(),
            branch: branch.to_string(),
            sha: sha.to_string(),
        });

        if let Some(err) = self.check_fail(&key, "create_branch") {
            return Err(err);
        }

        let mut inner = self.inner.lock().unwrap();
        let r = inner
            .repos
            .get_mut(&key)
            .ok_or_else(|| not_found_repo(&key))?;
        if r.branches.contains_key(branch) {
            return Err(ForgeError::Conflict("Reference already exists".into()));
        }
        let files = r
            .branches
            .values()
            .find(|b| b.tip == sha)
            .map(|b| b.files.clone())
            .ok_or_else(|| ForgeError::NotFound(format!("commit {}", sha)))?;
        r.branches.insert(
            branch.to_string(),
            MockBranch {
                tip: sha.to_string(),
                files,
            },
        );
        Ok(())
    }

    async fn write_file(
        &self,
        repo: &RepoRef,
        request: WriteFileRequest,
    ) -> Result<CommitInfo, ForgeError> {
        let key = repo_key(repo);
        self.record(MockOperation::WriteFile {
            repo: key.clone(),
            path: request.path.clone(),
            branch: request.branch.clone(),
            expected_sha: request.expected_sha.clone(),
        });

        if let Some(err) = self.check_fail(&key, "write_file") {
            return Err(err);
        }

        let mut inner = self.inner.lock().unwrap();
        inner.next_commit += 1;
        let commit = format!("{:040x}", inner.next_commit);
        let r = inner
            .repos
            .get_mut(&key)
            .ok_or_else(|| not_found_repo(&key))?;
        let branch = r
            .branches
            .get_mut(&request.branch)
            .ok_or_else(|| ForgeError::NotFound(format!("branch {}", request.branch)))?;

        let current = branch.files.get(&request.path).map(|f| f.sha.as_str());
        if current != Some(request.expected_sha.as_str()) {
            return Err(ForgeError::Conflict(format!(
                "{} does not match {}",
                request.path, request.expected_sha
            )));
        }

        branch
            .files
            .insert(request.path.clone(), MockFile::new(&request.content));
        branch.tip = commit.clone();
        Ok(CommitInfo { sha: commit })
    }

    async fn open_pull_request(
        &self,
        repo: &RepoRef,
        request: CreatePrRequest,
    ) -> Result<PullRequest, ForgeError> {
        let key = repo_key(repo);
        self.record(MockOperation::OpenPullRequest {
            repo: key.clone(),
            head: request.head.clone(),
            base: request.base.clone(),
            title: request.title.clone(),
        });

        if let Some(err) = self.check_fail(&key, "open_pull_request") {
            return Err(err);
        }

        let mut inner = self.inner.lock().unwrap();
        {
            let r = inner.repos.get(&key).ok_or_else(|| not_found_repo(&key))?;
            for name in [&request.head, &request.base] {
                if !r.branches.contains_key(name) {
                    return Err(ForgeError::ApiError {
                        status: 422,
                        message: format!("branch {} does not exist", name),
                    });
                }
            }
        }

        inner.next_pr_number += 1;
        let number = inner.next_pr_number;
        let pr = PullRequest {
            number,
            url: format!("https://github.com/{}/pull/{}", key, number),
            head: request.head,
            base: request.base,
            title: request.title,
        };
        inner.prs.push((key, pr.clone()));
        Ok(pr)
    }
}
