use jot_core::sync::DrainReport;

use crate::commands::common::{open_repository, AppPaths};
use crate::error::CliError;

pub async fn run_sync(paths: &AppPaths) -> Result<(), CliError> {
    let repo = open_repository(paths)?;
    if !repo.is_sync_enabled() {
        return Err(CliError::SyncNotConfigured);
    }

    let report = repo.drain_now().await?;
    for line in summarize_report(&report) {
        println!("{line}");
    }
    Ok(())
}

pub fn summarize_report(report: &DrainReport) -> Vec<String> {
    if report.interrupted {
        return vec![format!(
            "Sync interrupted: offline after {} change(s); pending changes stay queued",
            report.completed
        )];
    }

    let mut lines = vec![format!(
        "Sync completed: {} pushed, {} pulled",
        report.completed, report.pulled
    )];
    if report.conflicts > 0 {
        lines.push(format!(
            "{} conflict(s) need a decision; see `jot conflicts`",
            report.conflicts
        ));
    }
    if report.failed > 0 {
        lines.push(format!(
            "{} change(s) failed and stay queued; see `jot queue`",
            report.failed
        ));
    }
    if report.needs_attention > 0 {
        lines.push(format!(
            "{} change(s) exhausted automatic retries",
            report.needs_attention
        ));
    }
    lines
}
