use super::audit::{lookup_key, read_json};
use super::fs::install_section;
use super::manifest::{EntryCheck, ManifestEntry};
use super::report::{EntryStatus, ReconciliationReport, RepairState, ReportEntry};
use super::Reconciler;
use crate::error::ReconcileError;
use crate::value::Value;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// How far a repair pass may go
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairOptions {
    /// Repair non-ok entries at all
    pub fix: bool,
    /// Overwrite drifted entries, discarding local changes
    pub force: bool,
}

impl RepairOptions {
    pub fn fix() -> Self {
        Self {
            fix: true,
            force: false,
        }
    }

    pub fn force() -> Self {
        Self {
            fix: true,
            force: true,
        }
    }
}

impl Reconciler {
    /// Repair every non-ok entry of an audit report, in order
    ///
    /// A failed entry never stops the pass. The returned report carries the
    /// audited status of each entry plus what repair did with it; run a new
    /// audit to see the resulting state.
    pub fn repair(&self, report: &ReconciliationReport, options: RepairOptions) -> ReconciliationReport {
        ReconciliationReport::new(
            report
                .entries
                .iter()
                .map(|e| self.repair_entry(e, options))
                .collect(),
        )
    }

    /// [`repair`](Self::repair) with up to `jobs` entries repaired at once;
    /// entries sharing a path still run one at a time
    pub async fn repair_concurrent(
        &self,
        report: &ReconciliationReport,
        options: RepairOptions,
    ) -> Result<ReconciliationReport, ReconcileError> {
        let semaphore = Arc::new(Semaphore::new(self.jobs));
        let mut handles = Vec::with_capacity(report.entries.len());

        for entry in &report.entries {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| ReconcileError::Task(e.to_string()))?;
            let this = self.clone();
            let entry = entry.clone();
            handles.push(tokio::task::spawn_blocking(move || {
                let _permit = permit;
                this.repair_entry(&entry, options)
            }));
        }

        let mut entries = Vec::with_capacity(handles.len());
        for handle in handles {
            entries.push(handle.await.map_err(|e| ReconcileError::Task(e.to_string()))?);
        }
        Ok(ReconciliationReport::new(entries))
    }

    fn repair_entry(&self, audited: &ReportEntry, options: RepairOptions) -> ReportEntry {
        let mut out = audited.clone();
        if audited.is_ok() || !options.fix {
            out.repair = RepairState::NotAttempted;
            return out;
        }

        let entry = &audited.entry;
        out.repair = self.locks.with_lock(&entry.path, || {
            // The project may have changed since the audit, or another entry
            // on this path may just have been repaired.
            let (current, _) = self.status_of(entry);
            match current {
                EntryStatus::Ok => RepairState::Skipped("already satisfied".to_string()),
                EntryStatus::Drifted if !options.force => {
                    RepairState::Skipped("drifted; rerun with --force to overwrite".to_string())
                }
                _ => match self.apply(entry, current) {
                    Ok(()) => RepairState::Repaired,
                    Err(message) => RepairState::Failed(message),
                },
            }
        });

        match &out.repair {
            RepairState::Repaired => info!(entry = %entry, "repaired manifest entry"),
            RepairState::Failed(message) => warn!(entry = %entry, %message, "repair failed"),
            RepairState::Skipped(reason) => warn!(entry = %entry, %reason, "repair skipped"),
            RepairState::NotAttempted => {}
        }
        out
    }

    fn apply(&self, entry: &ManifestEntry, current: EntryStatus) -> Result<(), String> {
        let path = entry.path.as_str();
        match &entry.check {
            EntryCheck::File { contents } => self
                .fs
                .write_file(path, contents.as_bytes())
                .map_err(|e| format!("cannot write {}: {}", path, e)),
            EntryCheck::Directory => self
                .fs
                .create_dir_all(path)
                .map_err(|e| format!("cannot create {}: {}", path, e)),
            EntryCheck::ConfigKey {
                key,
                schema,
                default,
            } => {
                let value = self
                    .resolver
                    .validate_named(schema, &Value::from(default.clone()))
                    .map_err(|e| format!("default for `{}` is invalid: {}", key, e))?
                    .to_json();

                // Keep the rest of the file. Replacing an unparseable file or
                // a non-object parent is only reached as a drifted entry,
                // which implies `force`.
                let replace = current == EntryStatus::Drifted;
                let mut json = if self.fs.exists(path) {
                    match read_json(self.fs.as_ref(), path) {
                        Ok(json) => json,
                        Err(_) if replace => empty_object(),
                        Err(message) => return Err(message),
                    }
                } else {
                    empty_object()
                };
                set_key(&mut json, key, value, replace)?;
                self.write_json(path, &json)
            }
            EntryCheck::PackageDependency { package, version } => {
                // An unparseable manifest is never rewritten, even with force
                let mut json = if self.fs.exists(path) {
                    read_json(self.fs.as_ref(), path)?
                } else {
                    empty_object()
                };
                let section = install_section(path);
                if lookup_key(&json, &format!("{}.{}", section, package)).is_none() {
                    let deps = json
                        .as_object_mut()
                        .ok_or_else(|| format!("{} is not a JSON object", path))?
                        .entry(section)
                        .or_insert_with(empty_object);
                    let deps = deps
                        .as_object_mut()
                        .ok_or_else(|| format!("`{}` in {} is not an object", section, path))?;
                    deps.insert(package.clone(), serde_json::Value::String(version.clone()));
                }
                self.write_json(path, &json)
            }
        }
    }

    fn write_json(&self, path: &str, json: &serde_json::Value) -> Result<(), String> {
        let mut text = serde_json::to_string_pretty(json).map_err(|e| e.to_string())?;
        text.push('\n');
        self.fs
            .write_file(path, text.as_bytes())
            .map_err(|e| format!("cannot write {}: {}", path, e))
    }
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// Set a dotted key, creating missing intermediate levels. A null level is
/// absent; any other non-object level is only replaced when `replace` is set.
fn set_key(
    json: &mut serde_json::Value,
    key: &str,
    value: serde_json::Value,
    replace: bool,
) -> Result<(), String> {
    let mut segments: Vec<&str> = key.split('.').collect();
    let Some(last) = segments.pop() else {
        return Ok(());
    };
    let mut current = json;
    let mut walked = String::new();
    for segment in segments {
        make_object(current, &walked, replace)?;
        current = match current {
            serde_json::Value::Object(map) => map.entry(segment).or_insert_with(empty_object),
            _ => return Err(format!("cannot set `{}`", key)),
        };
        if !walked.is_empty() {
            walked.push('.');
        }
        walked.push_str(segment);
    }
    make_object(current, &walked, replace)?;
    match current {
        serde_json::Value::Object(map) => {
            map.insert(last.to_string(), value);
            Ok(())
        }
        _ => Err(format!("cannot set `{}`", key)),
    }
}

fn make_object(value: &mut serde_json::Value, at: &str, replace: bool) -> Result<(), String> {
    if value.is_object() {
        return Ok(());
    }
    if !value.is_null() && !replace {
        let at = if at.is_empty() { "(root)" } else { at };
        return Err(format!(
            "`{}` holds a non-object value; rerun with --force to replace it",
            at
        ));
    }
    *value = empty_object();
    Ok(())
}
