//! early-adopter - Dependency-bump pull requests on tag creation
//!
//! When a repository pushes a new version tag, early-adopter checks a set of
//! watched repositories for manifests that pin the tagged repository to an
//! older version, and opens one pull request per outdated repository.
//!
//! # Architecture
//!
//! The codebase follows a layered architecture:
//!
//! - [`cli`] - Host harness (parses args, loads config, delegates to engine)
//! - [`engine`] - Scan → Publish → Report for one trigger
//! - [`core`] - Versions, references, manifests, resolution, naming, config
//! - [`forge`] - Collaborator traits plus GitHub and in-memory implementations
//!
//! # Correctness Invariants
//!
//! 1. A manifest is only rewritten when it pins a strictly older version
//! 2. Unversioned or malformed pins are never touched
//! 3. Manifest writes are compare-and-swap against the sha the update was
//!    computed from
//! 4. A failure in one repository never affects another

pub mod cli;
pub mod core;
pub mod engine;
pub mod forge;
