//! forge
//!
//! Abstraction for the hosted repository service.
//!
//! # Architecture
//!
//! The engine depends only on the [`ManifestSource`] and [`RepositoryHost`]
//! traits. Implementations are constructed by the host harness and passed
//! in; nothing in the engine holds a global client.
//!
//! # Modules
//!
//! - `traits`: Collaborator traits and request/response types
//! - [`github`]: GitHub implementation using the REST API
//! - [`mock`]: In-memory implementation for deterministic testing
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use early_adopter::forge::github::GitHubForge;
//! use early_adopter::engine::{Publisher, Scanner};
//!
//! let forge = Arc::new(GitHubForge::new(token));
//! let scanner = Scanner::new(forge.clone(), "package.json");
//! let publisher = Publisher::new(forge, PublishOptions::default());
//! ```

pub mod github;
pub mod mock;
mod traits;

pub use traits::*;
