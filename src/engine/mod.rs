//! engine
//!
//! Orchestrates one trigger: Scan -> Publish -> Report.
//!
//! # Architecture
//!
//! 1. **Scan**: fetch each watched manifest and resolve it against the
//!    update target ([`scan`])
//! 2. **Publish**: run the five-step remote transaction for every
//!    candidate ([`publish`])
//! 3. **Report**: aggregate per-repository outcomes ([`trigger`])
//!
//! # Invariants
//!
//! - Collaborators are injected; the engine owns no clients
//! - One repository's failure never aborts work on another
//! - Manifests are never mutated in place
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use early_adopter::engine::{PublishOptions, Publisher, Scanner, TriggerEvent, TriggerHandler};
//!
//! let forge = Arc::new(GitHubForge::new(token));
//! let handler = TriggerHandler::new(
//!     Scanner::new(forge.clone(), "package.json"),
//!     Publisher::new(forge, PublishOptions::default()),
//!     config.repositories().to_vec(),
//! );
//! let report = handler.handle(&TriggerEvent::from_json(&payload)?).await;
//! ```

pub mod publish;
pub mod scan;
pub mod trigger;

pub use publish::{
    PublishFailure, PublishOptions, PublishResult, PublishStep, PublishedChange, Publisher,
};
pub use scan::{ScanFailure, ScanReport, Scanner, Unchanged, UpdateCandidate};
pub use trigger::{TriggerError, TriggerEvent, TriggerHandler, TriggerReport, TriggerStatus};
