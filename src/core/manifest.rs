//! core::manifest
//!
//! The dependency manifest of a repository (`package.json`).
//!
//! # Design
//!
//! Only the `dependencies` object is interpreted; every other field is
//! carried through untouched. Key order is preserved (serde_json is built
//! with `preserve_order`), so a rewritten manifest differs from the fetched
//! one only in the entry that was changed.
//!
//! Manifests are immutable values. Updates go through
//! [`Manifest::with_dependency`], which returns a new manifest and leaves
//! the original as it was.

use semver::Version;
use serde_json::{Map, Value};
use thiserror::Error;

use super::reference::RepoRef;

/// Key of the dependency mapping inside a manifest.
pub const DEPENDENCIES_KEY: &str = "dependencies";

/// Errors from manifest parsing.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("manifest must be a JSON object")]
    NotAnObject,
}

/// A parsed manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    fields: Map<String, Value>,
    trailing_newline: bool,
}

impl Manifest {
    /// Parse manifest text.
    ///
    /// # Errors
    ///
    /// Fails when the text is not JSON or its top level is not an object.
    pub fn from_json(text: &str) -> Result<Self, ManifestError> {
        let value: Value = serde_json::from_str(text)?;
        let mut manifest = Self::from_value(value)?;
        manifest.trailing_newline = text.ends_with('\n');
        Ok(manifest)
    }

    /// Wrap an already-parsed JSON value.
    pub fn from_value(value: Value) -> Result<Self, ManifestError> {
        match value {
            Value::Object(fields) => Ok(Self {
                fields,
                trailing_newline: false,
            }),
            _ => Err(ManifestError::NotAnObject),
        }
    }

    /// Serialize with two-space indentation.
    ///
    /// A trailing newline is emitted when the source text had one.
    pub fn to_json(&self) -> String {
        // Serializing a Map<String, Value> cannot fail.
        let mut text = serde_json::to_string_pretty(&self.fields).unwrap_or_default();
        if self.trailing_newline {
            text.push('\n');
        }
        text
    }

    /// All top-level fields.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Declared dependencies whose value is a string, in file order.
    pub fn dependencies(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .get(DEPENDENCIES_KEY)
            .and_then(Value::as_object)
            .into_iter()
            .flat_map(|deps| deps.iter())
            .filter_map(|(name, value)| value.as_str().map(|v| (name.as_str(), v)))
    }

    /// The raw declaration for one dependency.
    pub fn dependency(&self, name: &str) -> Option<&str> {
        self.dependencies()
            .find(|(dep, _)| *dep == name)
            .map(|(_, value)| value)
    }

    /// Dependencies that are declared as repository references.
    pub fn entries(&self) -> impl Iterator<Item = DependencyEntry> + '_ {
        self.dependencies()
            .filter_map(|(name, raw)| DependencyEntry::from_declaration(name, raw))
    }

    /// Return a copy with one dependency declaration replaced.
    ///
    /// Nothing else changes, including the position of the entry. If
    /// `dependencies` is missing it is created.
    pub fn with_dependency(&self, name: &str, declaration: &str) -> Manifest {
        let mut updated = self.clone();
        let deps = updated
            .fields
            .entry(DEPENDENCIES_KEY)
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(deps) = deps {
            deps.insert(name.to_string(), Value::String(declaration.to_string()));
        }
        updated
    }
}

/// One dependency declared as a repository reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEntry {
    /// Key in the `dependencies` object.
    pub name: String,
    /// The declared repository, as written.
    pub reference: RepoRef,
    /// Version pinned by the fragment, if it is a semantic version.
    pub version: Option<Version>,
}

impl DependencyEntry {
    /// Interpret one declaration.
    ///
    /// Returns `None` when the value is not a repository reference (for
    /// example a registry range such as `^1.2.0`).
    pub fn from_declaration(name: &str, raw: &str) -> Option<Self> {
        let reference = RepoRef::parse(raw).ok()?;
        let version = reference.version();
        Some(Self {
            name: name.to_string(),
            reference,
            version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PACKAGE: &str = r#"{
  "name": "foo",
  "version": "1.0.0",
  "dependencies": {
    "bar": "git://github.com/baz/bar.git#1.0.0",
    "left-pad": "^1.3.0",
    "bar2": "baz/bar2#1.2.3"
  },
  "scripts": {
    "test": "mocha"
  }
}
"#;

    #[test]
    fn parses_and_lists_dependencies_in_order() {
        let manifest = Manifest::from_json(PACKAGE).unwrap();
        let names: Vec<&str> = manifest.dependencies().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["bar", "left-pad", "bar2"]);
    }

    #[test]
    fn entries_skip_registry_ranges() {
        let manifest = Manifest::from_json(PACKAGE).unwrap();
        let entries: Vec<DependencyEntry> = manifest.entries().collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "bar");
        assert_eq!(entries[0].version, Some(Version::new(1, 0, 0)));
        assert_eq!(entries[1].reference.slug(), "baz/bar2");
    }

    #[test]
    fn round_trip_keeps_text() {
        let manifest = Manifest::from_json(PACKAGE).unwrap();
        assert_eq!(manifest.to_json(), PACKAGE);
    }

    #[test]
    fn no_trailing_newline_when_source_had_none() {
        let manifest = Manifest::from_json(r#"{"a": 1}"#).unwrap();
        assert_eq!(manifest.to_json(), "{\n  \"a\": 1\n}");
    }

    #[test]
    fn with_dependency_copies() {
        let original = Manifest::from_json(PACKAGE).unwrap();
        let updated = original.with_dependency("bar", "git://github.com/baz/bar.git#1.0.1");

        assert_eq!(original.dependency("bar"), Some("git://github.com/baz/bar.git#1.0.0"));
        assert_eq!(updated.dependency("bar"), Some("git://github.com/baz/bar.git#1.0.1"));
        assert_eq!(updated.dependency("bar2"), original.dependency("bar2"));
        assert_eq!(updated.fields().get("scripts"), original.fields().get("scripts"));

        let names: Vec<&str> = updated.dependencies().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["bar", "left-pad", "bar2"]);
    }

    #[test]
    fn rejects_non_objects() {
        assert!(matches!(
            Manifest::from_json("[1, 2]"),
            Err(ManifestError::NotAnObject)
        ));
        assert!(matches!(
            Manifest::from_json("{"),
            Err(ManifestError::Parse(_))
        ));
    }

    #[test]
    fn missing_dependencies_section() {
        let manifest = Manifest::from_json(r#"{"name": "foo"}"#).unwrap();
        assert_eq!(manifest.dependencies().count(), 0);
        assert!(manifest.dependency("bar").is_none());
    }

    #[test]
    fn non_string_dependency_values_are_ignored() {
        let manifest = Manifest::from_json(r#"{"dependencies": {"a": 1, "b": "x/y#1.0.0"}}"#).unwrap();
        let names: Vec<&str> = manifest.dependencies().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["b"]);
    }
}
