//! Installation manifest catalog (`templates/install.yaml`)
//!
//! The catalog groups manifest entries into features. File entries name a
//! stub instead of carrying contents inline, so the same stub can back
//! several entries.

use super::fs::DEPENDENCY_MANIFESTS;
use super::manifest::{EntryCheck, InstallationManifest, ManifestEntry};
use crate::error::CatalogError;
use crate::schema::Resolver;
use crate::value::Value;
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::{Component, Path};

#[derive(Debug, Deserialize)]
struct RawCatalog {
    version: String,
    #[serde(default)]
    stubs: IndexMap<String, String>,
    features: IndexMap<String, Vec<RawEntry>>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    path: String,
    #[serde(default = "default_required")]
    required: bool,
    #[serde(flatten)]
    check: RawCheck,
}

fn default_required() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
enum RawCheck {
    File {
        #[serde(default)]
        stub: Option<String>,
        #[serde(default)]
        contents: Option<String>,
    },
    Directory,
    ConfigKey {
        key: String,
        schema: String,
        #[serde(default)]
        default: serde_json::Value,
    },
    PackageDependency {
        package: String,
        version: String,
    },
}

/// Validated installation manifest catalog
#[derive(Debug, Clone)]
pub struct ManifestCatalog {
    version: String,
    features: IndexMap<String, Vec<ManifestEntry>>,
}

impl ManifestCatalog {
    /// Parse and validate a catalog
    ///
    /// Config-key defaults are checked against their schemas here so that a
    /// repair can never write a value the audit would reject.
    pub fn parse(file: &str, content: &str, resolver: &Resolver) -> Result<Self, CatalogError> {
        let raw: RawCatalog = serde_yaml::from_str(content).map_err(|source| CatalogError::Parse {
            file: file.to_string(),
            source,
        })?;

        let mut features = IndexMap::with_capacity(raw.features.len());
        for (name, entries) in raw.features {
            let entries = entries
                .into_iter()
                .map(|entry| build_entry(entry, &raw.stubs, resolver))
                .collect::<Result<Vec<_>, _>>()?;
            features.insert(name, entries);
        }

        Ok(Self {
            version: raw.version,
            features,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn feature_names(&self) -> impl Iterator<Item = &str> {
        self.features.keys().map(String::as_str)
    }

    /// Build the manifest for a set of features, in feature order
    ///
    /// Entries repeated across features are kept once, first occurrence wins.
    pub fn manifest<S: AsRef<str>>(&self, features: &[S]) -> Result<InstallationManifest, CatalogError> {
        let mut manifest = InstallationManifest::default();
        for feature in features {
            let feature = feature.as_ref();
            let entries = self
                .features
                .get(feature)
                .ok_or_else(|| CatalogError::UnknownFeature(feature.to_string()))?;
            for entry in entries {
                manifest.push(entry.clone());
            }
        }
        Ok(manifest)
    }
}

fn invalid(path: &str, message: impl Into<String>) -> CatalogError {
    CatalogError::InvalidManifest {
        path: path.to_string(),
        message: message.into(),
    }
}

fn build_entry(
    raw: RawEntry,
    stubs: &IndexMap<String, String>,
    resolver: &Resolver,
) -> Result<ManifestEntry, CatalogError> {
    let path = raw.path;
    let escapes = Path::new(&path)
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if path.is_empty() || escapes {
        return Err(invalid(&path, "path must be relative to the project root"));
    }

    let check = match raw.check {
        RawCheck::File { stub, contents } => {
            let contents = match (stub, contents) {
                (Some(stub), None) => stubs
                    .get(&stub)
                    .cloned()
                    .ok_or_else(|| invalid(&path, format!("unknown stub `{}`", stub)))?,
                (None, Some(contents)) => contents,
                _ => return Err(invalid(&path, "file entries need exactly one of `stub` or `contents`")),
            };
            EntryCheck::File { contents }
        }
        RawCheck::Directory => EntryCheck::Directory,
        RawCheck::ConfigKey { key, schema, default } => {
            if key.split('.').any(str::is_empty) {
                return Err(invalid(&path, format!("invalid config key `{}`", key)));
            }
            let default = if default.is_null() {
                serde_json::Value::Object(Default::default())
            } else {
                default
            };
            resolver
                .validate_named(&schema, &Value::from(default.clone()))
                .map_err(|e| invalid(&path, format!("default for `{}` is invalid: {}", key, e)))?;
            EntryCheck::ConfigKey { key, schema, default }
        }
        RawCheck::PackageDependency { package, version } => {
            if !DEPENDENCY_MANIFESTS.iter().any(|(name, _)| *name == path) {
                return Err(invalid(&path, "package dependencies must live in composer.json or package.json"));
            }
            EntryCheck::PackageDependency { package, version }
        }
    };

    Ok(ManifestEntry {
        path,
        required: raw.required,
        check,
    })
}
