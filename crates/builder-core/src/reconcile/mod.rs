//! Installation state reconciler
//!
//! Audits a project against an [`InstallationManifest`] and repairs drift.
//! Auditing never mutates anything; repair is a separate, explicit step that
//! consumes an audit report.

mod audit;
pub mod catalog;
pub mod fs;
pub mod locks;
pub mod manifest;
mod repair;
pub mod report;

pub use catalog::ManifestCatalog;
pub use fs::{LocalFs, ProjectFs};
pub use manifest::{EntryCheck, InstallationManifest, ManifestEntry};
pub use repair::RepairOptions;
pub use report::{EntryStatus, ReconciliationReport, RepairState, ReportEntry};

use crate::schema::Resolver;
use locks::PathLocks;
use std::sync::Arc;

/// Default number of entries checked or repaired at once
pub const DEFAULT_JOBS: usize = 4;

/// Audits and repairs one project
///
/// Cloning is cheap; clones share the filesystem handle and path locks.
#[derive(Clone)]
pub struct Reconciler {
    fs: Arc<dyn ProjectFs>,
    resolver: Resolver,
    locks: Arc<PathLocks>,
    jobs: usize,
}

impl Reconciler {
    pub fn new(fs: Arc<dyn ProjectFs>, resolver: Resolver) -> Self {
        Self {
            fs,
            resolver,
            locks: Arc::new(PathLocks::new()),
            jobs: DEFAULT_JOBS,
        }
    }

    /// Bound on concurrent entry checks and repairs
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }
}

/// Reports from one audit / repair / re-audit cycle
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RecheckOutcome {
    pub audit: ReconciliationReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repair: Option<ReconciliationReport>,
    /// State of the project after the cycle
    #[serde(rename = "final")]
    pub final_report: ReconciliationReport,
}

impl RecheckOutcome {
    pub fn is_satisfied(&self) -> bool {
        self.final_report.is_satisfied()
    }
}

impl Reconciler {
    /// Audit, repair when `options.fix` is set, then audit again
    pub async fn recheck(
        &self,
        manifest: &InstallationManifest,
        options: RepairOptions,
    ) -> Result<RecheckOutcome, crate::error::ReconcileError> {
        let audit = self.audit_concurrent(manifest).await?;
        if !options.fix || audit.is_clean() {
            return Ok(RecheckOutcome {
                final_report: audit.clone(),
                audit,
                repair: None,
            });
        }

        let repair = self.repair_concurrent(&audit, options).await?;
        let final_report = self.audit_concurrent(manifest).await?;
        Ok(RecheckOutcome {
            audit,
            repair: Some(repair),
            final_report,
        })
    }
}
