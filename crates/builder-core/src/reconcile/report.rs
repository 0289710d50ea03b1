//! Reconciliation reports

use super::manifest::ManifestEntry;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Audit outcome for one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryStatus {
    Ok,
    Missing,
    /// Present but failing validation; only overwritten with `force`
    Drifted,
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntryStatus::Ok => "ok",
            EntryStatus::Missing => "missing",
            EntryStatus::Drifted => "drifted",
        })
    }
}

/// What repair did with one entry
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "kebab-case")]
pub enum RepairState {
    #[default]
    NotAttempted,
    Repaired,
    Failed(String),
    Skipped(String),
}

impl fmt::Display for RepairState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepairState::NotAttempted => f.write_str("-"),
            RepairState::Repaired => f.write_str("repaired"),
            RepairState::Failed(msg) => write!(f, "failed: {}", msg),
            RepairState::Skipped(reason) => write!(f, "skipped: {}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    #[serde(flatten)]
    pub entry: ManifestEntry,
    pub status: EntryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default)]
    pub repair: RepairState,
}

impl ReportEntry {
    pub fn is_ok(&self) -> bool {
        self.status == EntryStatus::Ok
    }
}

/// Per-entry audit results in manifest order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub entries: Vec<ReportEntry>,
}

impl ReconciliationReport {
    pub fn new(entries: Vec<ReportEntry>) -> Self {
        Self { entries }
    }

    /// Every required entry is ok
    pub fn is_satisfied(&self) -> bool {
        self.entries.iter().all(|e| e.is_ok() || !e.entry.required)
    }

    /// Every entry, optional ones included, is ok
    pub fn is_clean(&self) -> bool {
        self.entries.iter().all(ReportEntry::is_ok)
    }

    pub fn count(&self, status: EntryStatus) -> usize {
        self.entries.iter().filter(|e| e.status == status).count()
    }

    pub fn repaired(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.repair == RepairState::Repaired)
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.repair, RepairState::Failed(_)))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// One-line counts, e.g. `5 ok, 1 missing, 0 drifted`
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "{} ok, {} missing, {} drifted",
            self.count(EntryStatus::Ok),
            self.count(EntryStatus::Missing),
            self.count(EntryStatus::Drifted)
        );
        let repaired = self.repaired();
        if repaired > 0 {
            summary.push_str(&format!(", {} repaired", repaired));
        }
        let failed = self.failures().count();
        if failed > 0 {
            summary.push_str(&format!(", {} failed", failed));
        }
        summary
    }

    /// Colored table for terminals
    pub fn render_table(&self) -> String {
        let width = self
            .entries
            .iter()
            .map(|e| e.entry.to_string().len())
            .max()
            .unwrap_or(0)
            .max("ENTRY".len());

        let width = width + " (optional)".len();
        let header = format!(
            "{:<width$}  {:<18}  {:<8}  {}",
            "ENTRY",
            "KIND",
            "STATUS",
            "REPAIR",
            width = width
        );
        let mut out = format!("{}\n", header.bold());

        for e in &self.entries {
            let status = format!("{:<8}", e.status.to_string());
            let status = match e.status {
                EntryStatus::Ok => status.green(),
                EntryStatus::Missing if e.entry.required => status.red(),
                EntryStatus::Missing => status.yellow(),
                EntryStatus::Drifted => status.yellow(),
            };
            let repair = match &e.repair {
                RepairState::Repaired => e.repair.to_string().green(),
                RepairState::Failed(_) => e.repair.to_string().red(),
                RepairState::Skipped(_) => e.repair.to_string().yellow(),
                RepairState::NotAttempted => e.repair.to_string().dimmed(),
            };
            let name = if e.entry.required {
                e.entry.to_string()
            } else {
                format!("{} (optional)", e.entry)
            };
            out.push_str(&format!(
                "{:<width$}  {:<18}  {}  {}\n",
                name,
                e.entry.check.kind(),
                status,
                repair,
                width = width
            ));
            if let Some(detail) = &e.detail {
                if !e.is_ok() {
                    out.push_str(&format!("    {}\n", detail.dimmed()));
                }
            }
        }
        out
    }
}
