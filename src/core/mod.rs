//! core
//!
//! Domain types and pure operations.
//!
//! # Modules
//!
//! - [`version`] - Semantic version parsing and ordering
//! - [`reference`] - Repository references and normalization
//! - [`manifest`] - Manifest parsing and copy-on-write updates
//! - [`resolve`] - Decide and compute a dependency update for one manifest
//! - [`naming`] - Branch names for proposed updates
//! - [`config`] - Configuration schema and loading
//!
//! # Design Principles
//!
//! - Nothing in `core` performs I/O except config loading
//! - Invalid references and versions are unrepresentable past parsing
//! - Manifests are values; updates return new manifests

pub mod config;
pub mod manifest;
pub mod naming;
pub mod reference;
pub mod resolve;
pub mod version;
