//! Status command implementation.
use std::sync::Arc;

use anyhow::Result;

use crate::cli::GlobalOpts;
use crate::logging::{Logger, MemoryLog};
use crate::reconcile::{LinkReport, Mode, Outcome};

/// Run the status command: classify every declared link without touching
/// the filesystem.
///
/// # Errors
///
/// Returns an error if the root, environment, settings or rules file cannot
/// be loaded.
pub fn run(global: &GlobalOpts, log: &Arc<Logger>) -> Result<()> {
    let setup = super::CommandSetup::init(global, log.as_ref())?;
    let parsed = setup.load_rules(global, log.as_ref())?;

    // The reconciler's own warnings repeat what the table shows; keep them
    // for the log file only.
    let collected = Arc::new(MemoryLog::new());
    let report = setup
        .reconciler(global, None, collected.clone())
        .run(&parsed.rules, Mode::Status);
    for (_, msg) in collected.entries() {
        log.debug(&msg);
    }

    log.stage("Link status");
    for entry in &report.entries {
        let line = format_entry(entry);
        if matches!(
            entry.outcome,
            Outcome::ConflictReported { .. } | Outcome::Skipped { .. }
        ) {
            log.warn(&line);
        } else {
            log.info(&line);
        }
    }
    super::finish(report, parsed.errors.len(), log);
    Ok(())
}

/// One status line: a marker, the destination and what was found.
#[must_use]
pub fn format_entry(entry: &LinkReport) -> String {
    let marker = match entry.outcome {
        Outcome::AlreadyLinked => "✓",
        Outcome::NotLinked => "·",
        _ => "✗",
    };
    format!("{marker} {entry}")
}
