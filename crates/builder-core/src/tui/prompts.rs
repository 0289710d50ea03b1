//! Charm-style recheck prompts using cliclack

use crate::reconcile::{
    EntryStatus, InstallationManifest, RecheckOutcome, ReconciliationReport, Reconciler,
    RepairOptions, RepairState,
};
use anyhow::Result;

/// Options for an interactive recheck
#[derive(Debug, Clone, Default)]
pub struct RecheckArgs {
    /// Repair missing entries
    pub fix: bool,

    /// Overwrite drifted entries without asking
    pub force: bool,

    /// Auto-confirm all prompts (non-interactive mode)
    pub yes: bool,
}

/// Audit a project, ask before repairing, then re-audit
pub async fn run_recheck(
    reconciler: &Reconciler,
    manifest: &InstallationManifest,
    args: RecheckArgs,
) -> Result<RecheckOutcome> {
    cliclack::intro("builder recheck")?;

    // Step 1: Audit
    let audit = audit_with_spinner(reconciler, manifest, "Checking installation...").await?;
    print_report(&audit);

    if audit.is_clean() {
        cliclack::outro("Everything is in place")?;
        return Ok(unchanged(audit));
    }

    if !args.fix {
        cliclack::log::info("Run with --fix to repair missing entries")?;
        cliclack::outro(audit.summary())?;
        return Ok(unchanged(audit));
    }

    // Step 2: Confirm repairs
    let to_repair = audit.entries.iter().filter(|e| !e.is_ok()).count();
    if !confirm(&format!("Repair {} entries?", to_repair), args.yes)? {
        cliclack::outro_cancel("Nothing was changed")?;
        return Ok(unchanged(audit));
    }

    let drifted = audit.count(EntryStatus::Drifted);
    let force = if drifted > 0 && !args.force {
        confirm_overwrite(drifted, args.yes)?
    } else {
        args.force
    };

    // Step 3: Repair
    let spinner = cliclack::spinner();
    spinner.start("Repairing...");
    let repair = match reconciler
        .repair_concurrent(&audit, RepairOptions { fix: true, force })
        .await
    {
        Ok(repair) => {
            spinner.stop(format!("Repaired {} of {} entries", repair.repaired(), to_repair));
            repair
        }
        Err(e) => {
            spinner.stop("Repair failed");
            return Err(e.into());
        }
    };

    for entry in &repair.entries {
        match &entry.repair {
            RepairState::Failed(message) => {
                cliclack::log::error(format!("{}: {}", entry.entry, message))?
            }
            RepairState::Skipped(reason) => {
                cliclack::log::warning(format!("{}: {}", entry.entry, reason))?
            }
            RepairState::Repaired | RepairState::NotAttempted => {}
        }
    }

    // Step 4: Re-audit
    let final_report = audit_with_spinner(reconciler, manifest, "Re-checking installation...").await?;
    if !final_report.is_clean() {
        print_report(&final_report);
    }

    let outcome = RecheckOutcome {
        audit,
        repair: Some(repair),
        final_report,
    };
    if outcome.is_satisfied() {
        cliclack::outro(format!("Installation is healthy ({})", outcome.final_report.summary()))?;
    } else {
        cliclack::outro_cancel(format!(
            "Installation still has problems ({})",
            outcome.final_report.summary()
        ))?;
    }
    Ok(outcome)
}

async fn audit_with_spinner(
    reconciler: &Reconciler,
    manifest: &InstallationManifest,
    message: &str,
) -> Result<ReconciliationReport> {
    let spinner = cliclack::spinner();
    spinner.start(message);
    match reconciler.audit_concurrent(manifest).await {
        Ok(report) => {
            spinner.stop(report.summary());
            Ok(report)
        }
        Err(e) => {
            spinner.stop("Check failed");
            Err(e.into())
        }
    }
}

fn confirm(prompt: &str, yes: bool) -> Result<bool> {
    // Auto-confirm with --yes flag
    if yes {
        return Ok(true);
    }
    Ok(cliclack::confirm(prompt).initial_value(true).interact()?)
}

fn confirm_overwrite(drifted: usize, yes: bool) -> Result<bool> {
    // --yes never implies --force; drifted entries hold local changes
    if yes {
        cliclack::log::warning(format!(
            "{} drifted entries left alone, rerun with --force to overwrite",
            drifted
        ))?;
        return Ok(false);
    }
    Ok(cliclack::confirm(format!(
        "{} entries were modified locally. Overwrite them?",
        drifted
    ))
    .initial_value(false)
    .interact()?)
}

fn print_report(report: &ReconciliationReport) {
    println!();
    print!("{}", report.render_table());
    println!();
}

fn unchanged(audit: ReconciliationReport) -> RecheckOutcome {
    RecheckOutcome {
        final_report: audit.clone(),
        audit,
        repair: None,
    }
}
