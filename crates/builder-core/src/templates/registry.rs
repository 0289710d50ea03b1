//! Template registry keyed by (kind, variant, dialect)
//!
//! The registry is filled once from a catalog and then shared read-only
//! behind an `Arc`. There is no API to mutate a registry after it has been
//! handed to a [`Compiler`](super::engine::Compiler).

use super::escape::EscapeMode;
use super::manifest::{CatalogFile, TemplateSpec};
use super::parser::{ParsedTemplate, SyntaxError};
use crate::artifact::{ArtifactKind, TargetDialect};
use crate::error::CatalogError;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::debug;

/// Registry lookup key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TemplateKey {
    pub kind: ArtifactKind,
    pub variant: Option<String>,
    pub dialect: TargetDialect,
}

impl TemplateKey {
    pub fn new(kind: ArtifactKind, variant: Option<&str>, dialect: TargetDialect) -> Self {
        Self {
            kind,
            variant: variant.map(str::to_string),
            dialect,
        }
    }
}

impl fmt::Display for TemplateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.variant {
            Some(variant) => write!(f, "{}/{} ({})", self.kind, variant, self.dialect),
            None => write!(f, "{} ({})", self.kind, self.dialect),
        }
    }
}

/// A parsed, registered template
#[derive(Debug, Clone)]
pub struct TemplateEntry {
    pub markup: ParsedTemplate,
    pub script: Option<ParsedTemplate>,
    pub style: Option<ParsedTemplate>,
    /// Logical slot paths emitted without escaping
    pub raw: BTreeSet<String>,
    pub markup_escape: EscapeMode,
    pub script_escape: EscapeMode,
}

impl TemplateEntry {
    /// Parse a catalog spec into an entry
    pub fn from_spec(file: &str, spec: &TemplateSpec) -> Result<Self, CatalogError> {
        let parse = |section: &str, source: &str| {
            ParsedTemplate::parse(source).map_err(|SyntaxError { line, message }| {
                CatalogError::InvalidTemplate {
                    file: format!("{} [{} {}]", file, spec.dialect, section),
                    line,
                    message,
                }
            })
        };

        let markup = parse("markup", &spec.markup)?;
        let script = spec.script.as_deref().map(|s| parse("script", s)).transpose()?;
        let style = spec.style.as_deref().map(|s| parse("style", s)).transpose()?;

        let entry = Self {
            markup,
            script,
            style,
            raw: spec.raw.iter().cloned().collect(),
            markup_escape: spec.markup_escape.unwrap_or_else(|| spec.dialect.markup_escape()),
            script_escape: spec.dialect.script_escape(),
        };
        entry.check_raw_paths(file)?;
        Ok(entry)
    }

    /// Every raw path must name a slot that actually exists, so the raw list
    /// stays an accurate, reviewable record of the trust boundary
    fn check_raw_paths(&self, file: &str) -> Result<(), CatalogError> {
        let mut known: BTreeSet<String> = self.markup.slot_paths().into_iter().collect();
        for section in self.script.iter().chain(self.style.iter()) {
            known.extend(section.slot_paths());
        }
        match self.raw.iter().find(|path| !known.contains(*path)) {
            Some(path) => Err(CatalogError::InvalidTemplate {
                file: file.to_string(),
                line: 0,
                message: format!("raw path `{}` does not match any slot", path),
            }),
            None => Ok(()),
        }
    }
}

/// Immutable (kind, variant, dialect) -> template mapping
#[derive(Debug, Default)]
pub struct TemplateRegistry {
    entries: BTreeMap<TemplateKey, TemplateEntry>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from parsed catalog files
    pub fn from_catalogs<'a>(
        files: impl IntoIterator<Item = (&'a str, &'a CatalogFile)>,
    ) -> Result<Self, CatalogError> {
        let mut registry = Self::new();
        for (name, file) in files {
            for spec in &file.templates {
                let key = TemplateKey::new(file.kind, file.variant.as_deref(), spec.dialect);
                registry.register(key, TemplateEntry::from_spec(name, spec)?)?;
            }
        }
        Ok(registry)
    }

    /// Register a template; a key can only be registered once
    pub fn register(&mut self, key: TemplateKey, entry: TemplateEntry) -> Result<(), CatalogError> {
        if self.entries.contains_key(&key) {
            return Err(CatalogError::DuplicateTemplate(key.to_string()));
        }
        debug!(template = %key, "registered template");
        self.entries.insert(key, entry);
        Ok(())
    }

    pub fn lookup(
        &self,
        kind: ArtifactKind,
        variant: Option<&str>,
        dialect: TargetDialect,
    ) -> Option<&TemplateEntry> {
        self.entries.get(&TemplateKey::new(kind, variant, dialect))
    }

    /// Dialects registered for a (kind, variant) pair, in dialect order
    pub fn dialects_for(&self, kind: ArtifactKind, variant: Option<&str>) -> Vec<TargetDialect> {
        TargetDialect::ALL
            .into_iter()
            .filter(|d| self.lookup(kind, variant, *d).is_some())
            .collect()
    }

    pub fn keys(&self) -> impl Iterator<Item = &TemplateKey> {
        self.entries.keys()
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

    fn alert_file(dialect: &str, raw: &str) -> CatalogFile {
        CatalogFile::parse(
            "alert.yaml",
            &format!(
                "kind: component\nvariant: alert\ntemplates:\n  - dialect: {}\n    markup: \"<p>[[ message ]]</p>\"\n    raw: [{}]\n",
                dialect, raw
            ),
        )
        .unwrap()
    }

    #[test]
    fn test_register_and_lookup() {
        let file = alert_file("server-template", "");
        let registry = TemplateRegistry::from_catalogs([("alert.yaml", &file)]).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry
            .lookup(ArtifactKind::Component, Some("alert"), TargetDialect::ServerTemplate)
            .is_some());
        assert!(registry
            .lookup(ArtifactKind::Component, Some("alert"), TargetDialect::ComponentFrameworkA)
            .is_none());
        assert_eq!(
            registry.dialects_for(ArtifactKind::Component, Some("alert")),
            vec![TargetDialect::ServerTemplate]
        );
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let a = alert_file("server-template", "");
        let b = alert_file("blade", "");
        let err = TemplateRegistry::from_catalogs([("a.yaml", &a), ("b.yaml", &b)]).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateTemplate(_)));
    }

    #[test]
    fn test_raw_path_must_exist() {
        let file = alert_file("server-template", "title");
        let err = TemplateRegistry::from_catalogs([("alert.yaml", &file)]).unwrap_err();
        assert!(err.to_string().contains("raw path `title`"));
    }

    #[test]
    fn test_markup_escape_follows_dialect() {
        let file = alert_file("react", "");
        let registry = TemplateRegistry::from_catalogs([("alert.yaml", &file)]).unwrap();
        let entry = registry
            .lookup(ArtifactKind::Component, Some("alert"), TargetDialect::ComponentFrameworkA)
            .unwrap();
        assert_eq!(entry.markup_escape, EscapeMode::Jsx);
        assert_eq!(entry.script_escape, EscapeMode::JsString);
    }
}
