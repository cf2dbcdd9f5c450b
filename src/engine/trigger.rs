//! engine::trigger
//!
//! Entry point for tag events: build the update target, scan the watched
//! repositories, publish the candidates and aggregate the outcome.
//!
//! # Benign Events
//!
//! Events that are not tag creations, that name an unrecognized originating
//! repository, or whose tag is not a semantic version are not failures. They
//! produce a report with status [`TriggerStatus::Ignored`] and a message, and
//! nothing is fetched or published.
//!
//! # Deadlines
//!
//! [`TriggerHandler::handle_with_deadline`] runs the batch on a spawned task
//! and stops waiting when the deadline passes. The batch itself is not
//! cancelled: remote calls already in flight may still complete after the
//! caller has received [`TriggerError::DeadlineExceeded`].

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::reference::RepoRef;
use crate::core::resolve::{TargetError, UpdateTarget};
use crate::engine::publish::{pull_request_title, PublishFailure, PublishedChange, Publisher};
use crate::engine::scan::{ScanFailure, Scanner, Unchanged, UpdateCandidate};

/// `ref_type` value of a tag creation.
pub const TAG_REF_TYPE: &str = "tag";

/// Errors from running the handler under a deadline.
#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("deadline of {0:?} exceeded; in-flight work continues in the background")]
    DeadlineExceeded(Duration),

    #[error("trigger task failed: {0}")]
    TaskFailed(String),
}

/// Repository section of a tag event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRepository {
    /// `git://` clone URL of the originating repository.
    #[serde(default)]
    pub git_url: Option<String>,
    /// `owner/name` of the originating repository.
    #[serde(default)]
    pub full_name: Option<String>,
}

/// Inbound event, shaped like a GitHub `create` webhook payload.
///
/// Unknown fields are ignored so full webhook deliveries parse as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEvent {
    /// Name of the created ref (the tag).
    #[serde(rename = "ref", default)]
    pub ref_name: String,
    /// Kind of ref created; only `tag` is acted on.
    #[serde(default)]
    pub ref_type: String,
    #[serde(default)]
    pub repository: EventRepository,
}

impl TriggerEvent {
    /// Build a tag-created event for `repository`.
    pub fn tag_created(repository: &str, tag: &str) -> Self {
        Self {
            ref_name: tag.to_string(),
            ref_type: TAG_REF_TYPE.to_string(),
            repository: EventRepository {
                git_url: Some(repository.to_string()),
                full_name: None,
            },
        }
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn is_tag_created(&self) -> bool {
        self.ref_type == TAG_REF_TYPE
    }

    /// Reference string of the originating repository, `git_url` first.
    pub fn origin(&self) -> Option<&str> {
        self.repository
            .git_url
            .as_deref()
            .or(self.repository.full_name.as_deref())
    }

    /// Build the update target, or explain why the event is ignored.
    pub fn target(&self) -> Result<UpdateTarget, String> {
        if !self.is_tag_created() {
            return Err("No tag update, nothing to do".to_string());
        }
        let origin = self
            .origin()
            .ok_or_else(|| "Event does not name its repository, nothing to do".to_string())?;
        UpdateTarget::new(origin, &self.ref_name).map_err(|e| match e {
            TargetError::InvalidReference(e) => {
                format!("Unrecognized repository {}: {}, nothing to do", origin, e)
            }
            TargetError::InvalidVersion(tag) => {
                format!("Tag {} is not a semantic version, nothing to do", tag)
            }
        })
    }
}

/// Aggregate status of one trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerStatus {
    /// The event was not acted on.
    Ignored,
    /// Every watched repository is already current or does not depend on
    /// the tagged repository.
    NoUpdates,
    /// Every candidate got a pull request.
    Updated,
    /// Candidates were found and left unpublished.
    DryRun,
    /// At least one repository failed during scan or publish.
    PartialFailure,
}

/// An update found in dry-run mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingUpdate {
    pub repository: RepoRef,
    pub dependency: String,
    pub from: String,
    pub to: String,
    pub branch: String,
}

/// Outcome of handling one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerReport {
    pub status: TriggerStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependency: Option<RepoRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub published: Vec<PublishedChange>,
    pub pending: Vec<PendingUpdate>,
    pub unchanged: Vec<Unchanged>,
    pub scan_failures: Vec<ScanFailure>,
    pub publish_failures: Vec<PublishFailure>,
}

impl TriggerReport {
    /// Report for an event that was not acted on.
    pub fn ignored(message: String) -> Self {
        Self {
            status: TriggerStatus::Ignored,
            message,
            dependency: None,
            tag: None,
            published: Vec::new(),
            pending: Vec::new(),
            unchanged: Vec::new(),
            scan_failures: Vec::new(),
            publish_failures: Vec::new(),
        }
    }

    /// True unless some repository failed.
    pub fn is_success(&self) -> bool {
        self.status != TriggerStatus::PartialFailure
    }

    /// Number of repositories that failed in either phase.
    pub fn failure_count(&self) -> usize {
        self.scan_failures.len() + self.publish_failures.len()
    }

    fn finish(&mut self, dry_run: bool) {
        let failures = self.failure_count();
        let dependency = self
            .dependency
            .as_ref()
            .map(|d| d.slug())
            .unwrap_or_default();
        let (status, message) = if failures > 0 {
            (
                TriggerStatus::PartialFailure,
                format!(
                    "{} repositories failed, {} pull requests created",
                    failures,
                    self.published.len()
                ),
            )
        } else if dry_run && !self.pending.is_empty() {
            (
                TriggerStatus::DryRun,
                format!("{} repositories need an update to {}", self.pending.len(), dependency),
            )
        } else if !self.published.is_empty() {
            (
                TriggerStatus::Updated,
                format!("Created {} pull requests", self.published.len()),
            )
        } else {
            (
                TriggerStatus::NoUpdates,
                format!("No need to update {} on any watched repository", dependency),
            )
        };
        self.status = status;
        self.message = message;
    }
}

/// Scans and publishes in response to tag events.
#[derive(Debug, Clone)]
pub struct TriggerHandler {
    scanner: Scanner,
    publisher: Publisher,
    repositories: Arc<[RepoRef]>,
    dry_run: bool,
}

impl TriggerHandler {
    pub fn new(scanner: Scanner, publisher: Publisher, repositories: Vec<RepoRef>) -> Self {
        Self {
            scanner,
            publisher,
            repositories: repositories.into(),
            dry_run: false,
        }
    }

    /// Scan only; candidates are reported as pending instead of published.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn repositories(&self) -> &[RepoRef] {
        &self.repositories
    }

    /// Handle one inbound event.
    pub async fn handle(&self, event: &TriggerEvent) -> TriggerReport {
        match event.target() {
            Ok(target) => self.run(&target).await,
            Err(message) => {
                info!(ref_type = %event.ref_type, tag = %event.ref_name, "{}", message);
                TriggerReport::ignored(message)
            }
        }
    }

    /// Handle one event, giving up on waiting after `deadline`.
    pub async fn handle_with_deadline(
        &self,
        event: TriggerEvent,
        deadline: Duration,
    ) -> Result<TriggerReport, TriggerError> {
        let handler = self.clone();
        let task = tokio::spawn(async move { handler.handle(&event).await });
        match tokio::time::timeout(deadline, task).await {
            Ok(Ok(report)) => Ok(report),
            Ok(Err(e)) => Err(TriggerError::TaskFailed(e.to_string())),
            Err(_) => {
                warn!(?deadline, "trigger deadline exceeded, leaving batch running");
                Err(TriggerError::DeadlineExceeded(deadline))
            }
        }
    }

    /// Scan the watched repositories for `target` and publish the results.
    pub async fn run(&self, target: &UpdateTarget) -> TriggerReport {
        let watched: Vec<RepoRef> = self
            .repositories
            .iter()
            .filter(|repo| {
                let origin = repo.same_repository(&target.reference);
                if origin {
                    debug!(repo = %repo.slug(), "skipping originating repository");
                }
                !origin
            })
            .cloned()
            .collect();

        let scan = self.scanner.scan(&watched, target).await;

        let mut report = TriggerReport::ignored(String::new());
        report.dependency = Some(target.reference.clone());
        report.tag = Some(target.tag.clone());
        report.unchanged = scan.unchanged;
        report.scan_failures = scan.failures;

        if self.dry_run {
            report.pending = scan
                .candidates
                .iter()
                .map(|c| self.pending(c))
                .collect();
        } else if !scan.candidates.is_empty() {
            let title = pull_request_title(&target.reference, &target.tag);
            for result in self.publisher.publish_all(&scan.candidates, &title).await {
                match result {
                    Ok(change) => report.published.push(change),
                    Err(failure) => report.publish_failures.push(failure),
                }
            }
        }

        report.finish(self.dry_run);
        info!(status = ?report.status, "{}", report.message);
        report
    }

    fn pending(&self, candidate: &UpdateCandidate) -> PendingUpdate {
        PendingUpdate {
            repository: candidate.repository.clone(),
            dependency: candidate.update.dependency.clone(),
            from: candidate.update.previous.clone(),
            to: candidate.update.current.clone(),
            branch: self.publisher.branch_for(candidate),
        }
    }
}
