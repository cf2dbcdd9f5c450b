//! engine::scan
//!
//! Fan out dependency resolution over the watched repositories.
//!
//! # Concurrency
//!
//! Each repository is one unit of work: fetch its manifest, then resolve.
//! Up to `concurrency` units run at once. Results come back in input order,
//! so a fixed input produces a fixed report regardless of which fetch
//! finishes first.
//!
//! # Failure Isolation
//!
//! A failed fetch excludes that repository and is recorded in
//! [`ScanReport::failures`]. It never stops the other repositories from
//! being scanned.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::config::{DEFAULT_CONCURRENCY, DEFAULT_MANIFEST_PATH};
use crate::core::manifest::Manifest;
use crate::core::reference::RepoRef;
use crate::core::resolve::{resolve, Resolution, SkipReason, UpdateTarget, UpdatedManifest};
use crate::forge::{ForgeError, ManifestSource};

/// A repository whose manifest needs the target's new version.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateCandidate {
    /// The repository to update.
    pub repository: RepoRef,
    /// The dependency that was tagged.
    pub dependency: RepoRef,
    /// The tag the dependency moves to.
    pub tag: String,
    /// The computed manifest change.
    pub update: UpdatedManifest,
    /// Blob sha of the manifest the change was computed from.
    pub source_sha: String,
}

impl UpdateCandidate {
    /// The manifest to publish.
    pub fn manifest(&self) -> &Manifest {
        &self.update.manifest
    }
}

/// A repository that needs no change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Unchanged {
    pub repository: RepoRef,
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// A repository whose manifest could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanFailure {
    pub repository: RepoRef,
    pub error: ForgeError,
}

/// Outcome of scanning one repository.
#[derive(Debug, Clone, PartialEq)]
pub enum RepoScanOutcome {
    Candidate(UpdateCandidate),
    Unchanged(Unchanged),
    Failed(ScanFailure),
}

/// Aggregated scan results, each list in input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanReport {
    pub candidates: Vec<UpdateCandidate>,
    pub unchanged: Vec<Unchanged>,
    pub failures: Vec<ScanFailure>,
}

impl ScanReport {
    fn from_outcomes(outcomes: Vec<RepoScanOutcome>) -> Self {
        let mut report = ScanReport::default();
        for outcome in outcomes {
            match outcome {
                RepoScanOutcome::Candidate(c) => report.candidates.push(c),
                RepoScanOutcome::Unchanged(u) => report.unchanged.push(u),
                RepoScanOutcome::Failed(f) => report.failures.push(f),
            }
        }
        report
    }
}

/// Scans repositories for outdated declarations of a dependency.
#[derive(Clone)]
pub struct Scanner {
    source: Arc<dyn ManifestSource>,
    manifest_path: String,
    concurrency: usize,
}

impl std::fmt::Debug for Scanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner")
            .field("manifest_path", &self.manifest_path)
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

impl Scanner {
    /// Create a scanner reading `manifest_path` through `source`.
    pub fn new(source: Arc<dyn ManifestSource>, manifest_path: impl Into<String>) -> Self {
        Self {
            source,
            manifest_path: manifest_path.into(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Create a scanner for `package.json`.
    pub fn with_default_path(source: Arc<dyn ManifestSource>) -> Self {
        Self::new(source, DEFAULT_MANIFEST_PATH)
    }

    /// Bound the number of concurrent fetches. Zero is treated as one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// The manifest path being read.
    pub fn manifest_path(&self) -> &str {
        &self.manifest_path
    }

    /// Scan every repository against `target`.
    pub async fn scan(&self, repositories: &[RepoRef], target: &UpdateTarget) -> ScanReport {
        info!(
            dependency = %target.reference.slug(),
            tag = %target.tag,
            repositories = repositories.len(),
            "scanning watched repositories"
        );

        let outcomes: Vec<RepoScanOutcome> = stream::iter(repositories.iter().cloned())
            .map(|repo| {
                let scanner = self.clone();
                let target = target.clone();
                async move { scanner.scan_one(&repo, &target).await }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let report = ScanReport::from_outcomes(outcomes);
        info!(
            candidates = report.candidates.len(),
            unchanged = report.unchanged.len(),
            failures = report.failures.len(),
            "scan finished"
        );
        report
    }

    /// Fetch and resolve a single repository.
    pub async fn scan_one(&self, repo: &RepoRef, target: &UpdateTarget) -> RepoScanOutcome {
        let fetched = match self.source.fetch_manifest(repo, &self.manifest_path).await {
            Ok(fetched) => fetched,
            Err(error) => {
                warn!(repo = %repo.slug(), %error, "failed to fetch manifest");
                return RepoScanOutcome::Failed(ScanFailure {
                    repository: repo.clone(),
                    error,
                });
            }
        };

        match resolve(&fetched.manifest, target) {
            Resolution::Updated(update) => {
                info!(
                    repo = %repo.slug(),
                    dependency = %update.dependency,
                    from = %update.previous,
                    to = %update.current,
                    "update needed"
                );
                RepoScanOutcome::Candidate(UpdateCandidate {
                    repository: repo.clone(),
                    dependency: target.reference.clone(),
                    tag: target.tag.clone(),
                    update,
                    source_sha: fetched.sha,
                })
            }
            Resolution::NoChange(reason) => {
                debug!(repo = %repo.slug(), %reason, "no update needed");
                RepoScanOutcome::Unchanged(Unchanged {
                    repository: repo.clone(),
                    reason,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forge::mock::{FailOn, MockForge};

    fn target() -> UpdateTarget {
        UpdateTarget::new("baz/bar", "1.1.0").unwrap()
    }

    fn refs(slugs: &[&str]) -> Vec<RepoRef> {
        slugs.iter().map(|s| RepoRef::parse(s).unwrap()).collect()
    }

    fn forge() -> MockForge {
        MockForge::new()
            .with_repository(
                "acme/old",
                "main",
                &[("package.json", r#"{"dependencies": {"bar": "baz/bar#1.0.0"}}"#)],
            )
            .with_repository(
                "acme/current",
                "main",
                &[("package.json", r#"{"dependencies": {"bar": "baz/bar#1.1.0"}}"#)],
            )
            .with_repository(
                "acme/unrelated",
                "main",
                &[("package.json", r#"{"dependencies": {"left-pad": "^1.0.0"}}"#)],
            )
    }

    #[tokio::test]
    async fn partitions_outcomes() {
        let scanner = Scanner::with_default_path(Arc::new(forge()));
        let report = scanner
            .scan(&refs(&["acme/old", "acme/current", "acme/unrelated"]), &target())
            .await;

        assert_eq!(report.candidates.len(), 1);
        assert_eq!(report.candidates[0].repository.slug(), "acme/old");
        assert_eq!(
            report.candidates[0].manifest().dependency("bar"),
            Some("baz/bar#1.1.0")
        );
        assert_eq!(report.unchanged.len(), 2);
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn candidate_remembers_source_revision() {
        use crate::forge::RepositoryHost;

        let forge = forge();
        let scanner = Scanner::with_default_path(Arc::new(forge.clone()));
        let report = scanner.scan(&refs(&["acme/old"]), &target()).await;

        let repo = RepoRef::parse("acme/old").unwrap();
        let handle = forge.file_handle(&repo, "package.json", "main").await.unwrap();
        assert_eq!(report.candidates[0].source_sha, handle.sha);
    }

    #[tokio::test]
    async fn failed_fetch_is_isolated() {
        let forge = forge().fail_on_repo("acme/current", FailOn::FetchManifest(ForgeError::RateLimited));
        let scanner = Scanner::with_default_path(Arc::new(forge)).with_concurrency(1);
        let report = scanner
            .scan(&refs(&["acme/current", "acme/old", "acme/missing"]), &target())
            .await;

        assert_eq!(report.candidates.len(), 1);
        assert_eq!(report.candidates[0].repository.slug(), "acme/old");
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0].repository.slug(), "acme/current");
        assert_eq!(report.failures[0].error, ForgeError::RateLimited);
        assert!(matches!(report.failures[1].error, ForgeError::NotFound(_)));
    }

    #[tokio::test]
    async fn order_follows_input() {
        let forge = MockForge::new()
            .with_repository("a/one", "main", &[("package.json", r#"{"dependencies": {"bar": "baz/bar#0.1.0"}}"#)])
            .with_repository("a/two", "main", &[("package.json", r#"{"dependencies": {"bar": "baz/bar#0.2.0"}}"#)])
            .with_repository("a/three", "main", &[("package.json", r#"{"dependencies": {"bar": "baz/bar#0.3.0"}}"#)]);
        let scanner = Scanner::with_default_path(Arc::new(forge)).with_concurrency(3);

        let report = scanner.scan(&refs(&["a/three", "a/one", "a/two"]), &target()).await;
        let slugs: Vec<String> = report.candidates.iter().map(|c| c.repository.slug()).collect();
        assert_eq!(slugs, vec!["a/three", "a/one", "a/two"]);
    }

    #[tokio::test]
    async fn custom_manifest_path() {
        let forge = MockForge::new().with_repository(
            "acme/mono",
            "main",
            &[("web/package.json", r#"{"dependencies": {"bar": "baz/bar#1.0.0"}}"#)],
        );
        let scanner = Scanner::new(Arc::new(forge.clone()), "web/package.json");
        let report = scanner.scan(&refs(&["acme/mono"]), &target()).await;
        assert_eq!(report.candidates.len(), 1);
        assert!(forge
            .operations()
            .iter()
            .all(|op| matches!(op, crate::forge::mock::MockOperation::FetchManifest { path, .. } if path == "web/package.json")));
    }

    #[tokio::test]
    async fn empty_watch_list() {
        let scanner = Scanner::with_default_path(Arc::new(MockForge::new()));
        let report = scanner.scan(&[], &target()).await;
        assert_eq!(report, ScanReport::default());
    }

    #[test]
    fn zero_concurrency_clamped() {
        let scanner = Scanner::with_default_path(Arc::new(MockForge::new())).with_concurrency(0);
        assert_eq!(scanner.concurrency, 1);
    }
}
