//! Unlink command implementation.
use std::sync::Arc;

use anyhow::Result;

use crate::cli::{GlobalOpts, UnlinkOpts};
use crate::logging::Logger;
use crate::reconcile::Mode;

/// Run the unlink command: remove every managed link the rules describe and
/// restore backups.
///
/// # Errors
///
/// Returns an error if the root, environment, settings or rules file cannot
/// be loaded.
pub fn run(
    global: &GlobalOpts,
    opts: &UnlinkOpts,
    verbose: bool,
    log: &Arc<Logger>,
) -> Result<()> {
    let setup = super::CommandSetup::init(global, log.as_ref())?;
    let parsed = setup.load_rules(global, log.as_ref())?;
    let reconciler = setup
        .reconciler(global, opts.backup_dir.as_deref(), log.clone())
        .with_progress(super::progress_for(verbose));

    log.stage(if global.dry_run {
        "Unlinking (dry run)"
    } else {
        "Unlinking"
    });
    let report = reconciler.run(&parsed.rules, Mode::Unlink);
    super::finish(report, parsed.errors.len(), log);
    Ok(())
}
