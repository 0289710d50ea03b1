use super::manifest::{EntryCheck, InstallationManifest, ManifestEntry};
use super::report::{EntryStatus, ReconciliationReport, RepairState, ReportEntry};
use super::Reconciler;
use crate::error::ReconcileError;
use crate::value::Value;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::debug;

impl Reconciler {
    /// Check every manifest entry, in order
    pub fn audit(&self, manifest: &InstallationManifest) -> ReconciliationReport {
        ReconciliationReport::new(manifest.entries().iter().map(|e| self.check(e)).collect())
    }

    /// [`audit`](Self::audit) with up to `jobs` entries checked at once
    ///
    /// The report keeps manifest order regardless of completion order.
    pub async fn audit_concurrent(
        &self,
        manifest: &InstallationManifest,
    ) -> Result<ReconciliationReport, ReconcileError> {
        let semaphore = Arc::new(Semaphore::new(self.jobs));
        let mut handles = Vec::with_capacity(manifest.len());

        for entry in manifest.entries() {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| ReconcileError::Task(e.to_string()))?;
            let this = self.clone();
            let entry = entry.clone();
            handles.push(tokio::task::spawn_blocking(move || {
                let _permit = permit;
                this.check(&entry)
            }));
        }

        let mut entries = Vec::with_capacity(handles.len());
        for handle in handles {
            entries.push(handle.await.map_err(|e| ReconcileError::Task(e.to_string()))?);
        }
        Ok(ReconciliationReport::new(entries))
    }

    /// Audit a single entry
    pub fn check(&self, entry: &ManifestEntry) -> ReportEntry {
        let (status, detail) = self.status_of(entry);
        debug!(entry = %entry, %status, "checked manifest entry");
        ReportEntry {
            entry: entry.clone(),
            status,
            detail,
            repair: RepairState::NotAttempted,
        }
    }

    pub(super) fn status_of(&self, entry: &ManifestEntry) -> (EntryStatus, Option<String>) {
        let path = entry.path.as_str();
        match &entry.check {
            EntryCheck::File { .. } => {
                if self.fs.is_dir(path) {
                    (EntryStatus::Missing, Some("path is a directory".to_string()))
                } else if self.fs.exists(path) {
                    (EntryStatus::Ok, None)
                } else {
                    (EntryStatus::Missing, Some("file not found".to_string()))
                }
            }
            EntryCheck::Directory => {
                if self.fs.is_dir(path) {
                    (EntryStatus::Ok, None)
                } else if self.fs.exists(path) {
                    (EntryStatus::Missing, Some("path exists but is not a directory".to_string()))
                } else {
                    (EntryStatus::Missing, Some("directory not found".to_string()))
                }
            }
            EntryCheck::ConfigKey { key, schema, .. } => self.config_status(path, key, schema),
            // Only config keys drift; an unreadable manifest leaves the
            // package undeclared and its repair reports the failure
            EntryCheck::PackageDependency { package, .. } => match self.fs.list_dependencies(path) {
                Ok(packages) if packages.contains(package) => (EntryStatus::Ok, None),
                Ok(_) => (
                    EntryStatus::Missing,
                    Some(format!("`{}` is not declared in {}", package, path)),
                ),
                Err(e) => (
                    EntryStatus::Missing,
                    Some(format!("cannot read {}: {}", path, e)),
                ),
            },
        }
    }

    fn config_status(&self, path: &str, key: &str, schema: &str) -> (EntryStatus, Option<String>) {
        if !self.fs.exists(path) {
            return (EntryStatus::Missing, Some("config file not found".to_string()));
        }
        let json = match read_json(self.fs.as_ref(), path) {
            Ok(json) => json,
            Err(message) => return (EntryStatus::Drifted, Some(message)),
        };
        if let Some(blocker) = non_object_parent(&json, key) {
            return (
                EntryStatus::Drifted,
                Some(format!("`{}` holds a non-object value", blocker)),
            );
        }
        let Some(value) = lookup_key(&json, key) else {
            return (EntryStatus::Missing, Some(format!("key `{}` not set", key)));
        };
        match self.resolver.validate_named(schema, &Value::from(value.clone())) {
            Ok(_) => (EntryStatus::Ok, None),
            Err(e) => (EntryStatus::Drifted, Some(format!("`{}` is invalid: {}", key, e))),
        }
    }
}

pub(super) fn read_json(fs: &dyn super::ProjectFs, path: &str) -> Result<serde_json::Value, String> {
    let bytes = fs
        .read_file(path)
        .map_err(|e| format!("cannot read {}: {}", path, e))?;
    serde_json::from_slice(&bytes).map_err(|e| format!("{} is not valid JSON: {}", path, e))
}

/// Look up a dotted key such as `builder.theme`
pub(super) fn lookup_key<'a>(json: &'a serde_json::Value, key: &str) -> Option<&'a serde_json::Value> {
    key.split('.')
        .try_fold(json, |value, segment| value.get(segment))
        .filter(|value| !value.is_null())
}

/// First level above a dotted key that is set but is not an object.
/// The file root is reported as `(root)`.
pub(super) fn non_object_parent(json: &serde_json::Value, key: &str) -> Option<String> {
    let mut current = json;
    let mut path = String::new();
    let segments: Vec<&str> = key.split('.').collect();
    for (i, segment) in segments.iter().enumerate() {
        if !current.is_object() {
            return Some(if i == 0 { "(root)".to_string() } else { path });
        }
        if i + 1 == segments.len() {
            break;
        }
        match current.get(*segment) {
            Some(next) if !next.is_null() => current = next,
            _ => return None,
        }
        if !path.is_empty() {
            path.push('.');
        }
        path.push_str(segment);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::fs::LocalFs;
    use crate::schema::Resolver;
    use serde_json::json;
    use tempfile::TempDir;

    fn reconciler(dir: &TempDir) -> Reconciler {
        Reconciler::new(Arc::new(LocalFs::new(dir.path())), Resolver::builtin())
    }

    fn builder_key() -> ManifestEntry {
        ManifestEntry::config_key("builder.json", "builder", "config.builder", json!({"dialect": "server-template"}))
    }

    #[test]
    fn test_file_and_directory_checks() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("resources/views/builder")).unwrap();
        std::fs::write(dir.path().join("storage"), "not a dir").unwrap();

        let manifest = InstallationManifest::new(vec![
            ManifestEntry::file("config/visual-builder.php", "<?php"),
            ManifestEntry::directory("resources/views/builder"),
            ManifestEntry::directory("storage"),
            ManifestEntry::file("resources/views/builder", "x"),
        ]);
        let report = reconciler(&dir).audit(&manifest);
        let statuses: Vec<_> = report.entries.iter().map(|e| e.status).collect();
        assert_eq!(
            statuses,
            vec![
                EntryStatus::Missing,
                EntryStatus::Ok,
                EntryStatus::Missing,
                EntryStatus::Missing
            ]
        );
        assert_eq!(report.entries[3].detail.as_deref(), Some("path is a directory"));
    }

    #[test]
    fn test_config_key_missing_vs_drifted() {
        let dir = TempDir::new().unwrap();
        let r = reconciler(&dir);
        let manifest = InstallationManifest::new(vec![builder_key()]);

        assert_eq!(r.audit(&manifest).entries[0].status, EntryStatus::Missing);

        std::fs::write(dir.path().join("builder.json"), r#"{"other": 1}"#).unwrap();
        let report = r.audit(&manifest);
        assert_eq!(report.entries[0].status, EntryStatus::Missing);
        assert_eq!(report.entries[0].detail.as_deref(), Some("key `builder` not set"));

        std::fs::write(dir.path().join("builder.json"), r#"{"builder": {"dialect": "svelte"}}"#).unwrap();
        assert_eq!(r.audit(&manifest).entries[0].status, EntryStatus::Drifted);

        std::fs::write(dir.path().join("builder.json"), "{ broken").unwrap();
        assert_eq!(r.audit(&manifest).entries[0].status, EntryStatus::Drifted);

        std::fs::write(dir.path().join("builder.json"), r#"{"builder": {"dialect": "component-framework-b"}}"#).unwrap();
        assert_eq!(r.audit(&manifest).entries[0].status, EntryStatus::Ok);
    }

    #[test]
    fn test_package_dependency_checks() {
        let dir = TempDir::new().unwrap();
        let r = reconciler(&dir);
        let manifest = InstallationManifest::new(vec![ManifestEntry::package("package.json", "vue", "^3.4.0")]);

        assert_eq!(r.audit(&manifest).entries[0].status, EntryStatus::Missing);

        std::fs::write(dir.path().join("package.json"), r#"{"devDependencies": {"vue": "^3"}}"#).unwrap();
        assert_eq!(r.audit(&manifest).entries[0].status, EntryStatus::Ok);

        std::fs::write(dir.path().join("package.json"), "nope").unwrap();
        let report = r.audit(&manifest);
        assert_eq!(report.entries[0].status, EntryStatus::Missing);
        assert!(report.entries[0].detail.as_deref().unwrap().starts_with("cannot read package.json"));
    }

    #[test]
    fn test_package_checks_read_only_their_manifest() {
        let dir = TempDir::new().unwrap();
        let r = reconciler(&dir);
        std::fs::write(dir.path().join("composer.json"), r#"{"require": {"vue": "^3"}}"#).unwrap();
        std::fs::write(dir.path().join("package.json"), r#"{"dependencies": {"react": "^18"}}"#).unwrap();
        let manifest = InstallationManifest::new(vec![
            ManifestEntry::package("package.json", "vue", "^3.4.0"),
            ManifestEntry::package("package.json", "react", "^18.3.0"),
        ]);
        let statuses: Vec<_> = r.audit(&manifest).entries.iter().map(|e| e.status).collect();
        assert_eq!(statuses, vec![EntryStatus::Missing, EntryStatus::Ok]);

        // A broken composer.json does not affect package.json entries
        std::fs::write(dir.path().join("composer.json"), "{ broken").unwrap();
        let statuses: Vec<_> = r.audit(&manifest).entries.iter().map(|e| e.status).collect();
        assert_eq!(statuses, vec![EntryStatus::Missing, EntryStatus::Ok]);
    }

    #[test]
    fn test_config_key_under_scalar_is_drifted() {
        let dir = TempDir::new().unwrap();
        let r = reconciler(&dir);
        let manifest = InstallationManifest::new(vec![ManifestEntry::config_key(
            "builder.json",
            "settings.builder",
            "config.builder",
            json!({"dialect": "server-template"}),
        )]);

        std::fs::write(dir.path().join("builder.json"), r#"{"settings": "user-custom"}"#).unwrap();
        let report = r.audit(&manifest);
        assert_eq!(report.entries[0].status, EntryStatus::Drifted);
        assert_eq!(
            report.entries[0].detail.as_deref(),
            Some("`settings` holds a non-object value")
        );

        std::fs::write(dir.path().join("builder.json"), "[1, 2]").unwrap();
        assert_eq!(r.audit(&manifest).entries[0].status, EntryStatus::Drifted);

        std::fs::write(dir.path().join("builder.json"), r#"{"settings": null}"#).unwrap();
        assert_eq!(r.audit(&manifest).entries[0].status, EntryStatus::Missing);
    }

    #[test]
    fn test_non_object_parent() {
        let json = json!({"a": {"b": 1}, "c": null});
        assert_eq!(non_object_parent(&json, "a.b.c").as_deref(), Some("a.b"));
        assert!(non_object_parent(&json, "a.x.y").is_none());
        assert!(non_object_parent(&json, "c.d").is_none());
        assert!(non_object_parent(&json, "a.b").is_none());
        assert_eq!(non_object_parent(&json!("text"), "a").as_deref(), Some("(root)"));
    }

    #[test]
    fn test_lookup_nested_key() {
        let json = json!({"builder": {"theme": {"name": "dark"}}, "empty": null});
        assert_eq!(lookup_key(&json, "builder.theme.name"), Some(&json!("dark")));
        assert!(lookup_key(&json, "builder.missing").is_none());
        assert!(lookup_key(&json, "empty").is_none());
    }

    #[tokio::test]
    async fn test_concurrent_audit_keeps_manifest_order() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("b")).unwrap();
        let manifest = InstallationManifest::new(
            ["a", "b", "c", "d", "e", "f"]
                .into_iter()
                .map(ManifestEntry::directory)
                .collect(),
        );
        let r = reconciler(&dir).with_jobs(3);
        let concurrent = r.audit_concurrent(&manifest).await.unwrap();
        assert_eq!(concurrent, r.audit(&manifest));
        let paths: Vec<_> = concurrent.entries.iter().map(|e| e.entry.path.as_str()).collect();
        assert_eq!(paths, vec!["a", "b", "c", "d", "e", "f"]);
        assert_eq!(concurrent.count(EntryStatus::Ok), 1);
    }
}
