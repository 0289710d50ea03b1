//! Installation manifest types

use serde::{Deserialize, Serialize};
use std::fmt;

/// What an entry checks and how it is repaired
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum EntryCheck {
    /// A file that must exist; repaired by writing `contents`
    File {
        #[serde(default, skip_serializing)]
        contents: String,
    },

    /// A directory that must exist
    Directory,

    /// A dotted key in a JSON config file, validated against a named schema
    ConfigKey {
        key: String,
        schema: String,
        #[serde(default)]
        default: serde_json::Value,
    },

    /// A package declared in a dependency manifest (composer.json or package.json)
    PackageDependency { package: String, version: String },
}

impl EntryCheck {
    pub fn kind(&self) -> &'static str {
        match self {
            EntryCheck::File { .. } => "file",
            EntryCheck::Directory => "directory",
            EntryCheck::ConfigKey { .. } => "config-key",
            EntryCheck::PackageDependency { .. } => "package-dependency",
        }
    }
}

/// One expected piece of project scaffolding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Project-relative path, `/` separated
    pub path: String,

    /// Whether the project is considered broken without this entry
    #[serde(default = "default_required")]
    pub required: bool,

    #[serde(flatten)]
    pub check: EntryCheck,
}

fn default_required() -> bool {
    true
}

impl ManifestEntry {
    pub fn file(path: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            required: true,
            check: EntryCheck::File {
                contents: contents.into(),
            },
        }
    }

    pub fn directory(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            required: true,
            check: EntryCheck::Directory,
        }
    }

    pub fn config_key(
        path: impl Into<String>,
        key: impl Into<String>,
        schema: impl Into<String>,
        default: serde_json::Value,
    ) -> Self {
        Self {
            path: path.into(),
            required: true,
            check: EntryCheck::ConfigKey {
                key: key.into(),
                schema: schema.into(),
                default,
            },
        }
    }

    pub fn package(path: impl Into<String>, package: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            required: true,
            check: EntryCheck::PackageDependency {
                package: package.into(),
                version: version.into(),
            },
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Two entries with the same identity check the same thing
    pub fn identity(&self) -> (&str, Option<&str>) {
        let target = match &self.check {
            EntryCheck::ConfigKey { key, .. } => Some(key.as_str()),
            EntryCheck::PackageDependency { package, .. } => Some(package.as_str()),
            EntryCheck::File { .. } | EntryCheck::Directory => None,
        };
        (self.path.as_str(), target)
    }
}

impl fmt::Display for ManifestEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.identity() {
            (path, Some(target)) => write!(f, "{} ({})", path, target),
            (path, None) => f.write_str(path),
        }
    }
}

/// Ordered list of entries a project is expected to have
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstallationManifest {
    entries: Vec<ManifestEntry>,
}

impl InstallationManifest {
    pub fn new(entries: Vec<ManifestEntry>) -> Self {
        Self { entries }
    }

    /// Append an entry unless one with the same identity is already listed
    pub fn push(&mut self, entry: ManifestEntry) -> bool {
        if self.entries.iter().any(|e| e.identity() == entry.identity()) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entry_deserializes_flattened_kind() {
        let entry: ManifestEntry = serde_json::from_value(json!({
            "path": "builder.json",
            "kind": "config-key",
            "key": "builder",
            "schema": "config.builder",
            "default": {"dialect": "vue"}
        }))
        .unwrap();
        assert!(entry.required);
        assert_eq!(entry.check.kind(), "config-key");
        assert_eq!(entry.identity(), ("builder.json", Some("builder")));
        assert_eq!(entry.to_string(), "builder.json (builder)");
    }

    #[test]
    fn test_file_contents_not_serialized() {
        let entry = ManifestEntry::file("config/visual-builder.php", "<?php return [];");
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value, json!({"path": "config/visual-builder.php", "required": true, "kind": "file"}));
    }

    #[test]
    fn test_push_skips_duplicates() {
        let mut manifest = InstallationManifest::default();
        assert!(manifest.push(ManifestEntry::package("package.json", "react", "^18")));
        assert!(manifest.push(ManifestEntry::package("package.json", "react-dom", "^18")));
        assert!(!manifest.push(ManifestEntry::package("package.json", "react", "^19").optional()));
        assert_eq!(manifest.len(), 2);
    }
}
