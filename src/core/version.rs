//! core::version
//!
//! Semantic version parsing and ordering.
//!
//! # Grammar
//!
//! Versions follow the full semver grammar (`X.Y.Z[-pre][+build]`) as
//! implemented by the [`semver`] crate, with one relaxation: a single
//! leading `v` is accepted, since git tags are commonly spelled `v1.2.3`.
//! Anything else (`1.0`, `42`, `1.2.3foo`, leading zeros) is invalid.
//!
//! # Example
//!
//! ```
//! use early_adopter::core::version::is_newer;
//!
//! assert!(is_newer("1.2.3", "1.2.2"));
//! assert!(is_newer("v10.0.0", "9.2.18"));
//! assert!(!is_newer("1.2.3", "1.2.3"));
//! assert!(!is_newer("1.2.3", "1.0"));
//! ```

use semver::Version;

/// Parse a version string, accepting an optional leading `v`.
///
/// Returns `None` for anything that is not a complete semantic version.
pub fn parse_version(raw: &str) -> Option<Version> {
    let trimmed = raw.strip_prefix('v').unwrap_or(raw);
    Version::parse(trimmed).ok()
}

/// Check whether `candidate` orders strictly after `current`.
///
/// Both arguments must parse as semantic versions; a parse failure on
/// either side yields `false`.
pub fn is_newer(candidate: &str, current: &str) -> bool {
    match (parse_version(candidate), parse_version(current)) {
        (Some(candidate), Some(current)) => candidate > current,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_when_greater() {
        assert!(is_newer("1.2.3", "1.2.2"));
        assert!(is_newer("1.4.1", "1.3.1"));
        assert!(is_newer("2.3.1", "1.3.1"));
        assert!(is_newer("1.4.1", "1.3.12"));
        assert!(is_newer("1.15.0", "1.8.12"));
        assert!(is_newer("2.0.0", "1.8.10"));
        assert!(is_newer("10.0.0", "9.2.18"));
    }

    #[test]
    fn not_newer_when_lesser() {
        assert!(!is_newer("1.2.1", "1.2.2"));
        assert!(!is_newer("1.4.1", "1.5.1"));
        assert!(!is_newer("2.3.1", "3.3.1"));
        assert!(!is_newer("1.4.12", "1.5.1"));
        assert!(!is_newer("1.0.15", "1.2.1"));
        assert!(!is_newer("2.9.0", "3.0.10"));
        assert!(!is_newer("9.1.12", "10.0.1"));
    }

    #[test]
    fn not_newer_when_equal() {
        assert!(!is_newer("1.2.3", "1.2.3"));
        assert!(!is_newer("v1.2.3", "1.2.3"));
    }

    #[test]
    fn malformed_input_is_never_newer() {
        assert!(!is_newer("1.2.3", "foo"));
        assert!(!is_newer("foo", "1.2.3"));
        assert!(!is_newer("foo", "bar"));
        assert!(!is_newer("1.2.3", "1.0"));
        assert!(!is_newer("1.0", "1.2.3"));
        assert!(!is_newer("1.0", "1.0"));
        assert!(!is_newer("1.2.3", "42"));
        assert!(!is_newer("42", "1.2.3"));
        assert!(!is_newer("42", "42"));
        assert!(!is_newer("1.2.3", "1.2.3foo"));
        assert!(!is_newer("1.2.3foo", "1.2.3"));
        assert!(!is_newer("1.2.3foo", "1.2.3foo"));
    }

    #[test]
    fn leading_v_is_accepted_once() {
        assert_eq!(parse_version("v1.2.3"), Some(Version::new(1, 2, 3)));
        assert!(parse_version("vv1.2.3").is_none());
        assert!(parse_version("V1.2.3").is_none());
    }

    #[test]
    fn prerelease_orders_before_release() {
        assert!(is_newer("1.0.0", "1.0.0-beta.1"));
        assert!(!is_newer("1.0.0-beta.1", "1.0.0"));
    }

    #[test]
    fn rejects_leading_zeros_and_empty() {
        assert!(parse_version("01.2.3").is_none());
        assert!(parse_version("").is_none());
        assert!(parse_version("v").is_none());
    }
}
