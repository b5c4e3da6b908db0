//! Link command implementation.
use std::sync::Arc;

use anyhow::Result;

use crate::cli::{GlobalOpts, LinkOpts};
use crate::config::ConflictMode;
use crate::logging::Logger;
use crate::reconcile::{ConflictPolicy, Fixed, Mode, NoProgress, PromptUser};

/// Run the link command.
///
/// # Errors
///
/// Returns an error if the root, environment, settings or rules file cannot
/// be loaded.  Per-rule failures are reported in the summary instead.
pub fn run(global: &GlobalOpts, opts: &LinkOpts, verbose: bool, log: &Arc<Logger>) -> Result<()> {
    let setup = super::CommandSetup::init(global, log.as_ref())?;
    let parsed = setup.load_rules(global, log.as_ref())?;

    let mode = conflict_mode(opts, setup.settings.link.on_conflict);
    log.debug(&format!("conflict handling: {mode:?}"));
    let progress = if mode == ConflictMode::Prompt {
        Arc::new(NoProgress)
    } else {
        super::progress_for(verbose)
    };
    let reconciler = setup
        .reconciler(global, opts.backup_dir.as_deref(), log.clone())
        .with_policy(policy_for(mode))
        .with_progress(progress);

    log.stage(if global.dry_run {
        "Linking (dry run)"
    } else {
        "Linking"
    });
    let report = reconciler.run(&parsed.rules, Mode::Link);
    super::finish(report, parsed.errors.len(), log);
    Ok(())
}

/// `--interactive` beats `--on-conflict`, which beats `[link] on_conflict`.
#[must_use]
pub fn conflict_mode(opts: &LinkOpts, configured: ConflictMode) -> ConflictMode {
    if opts.interactive {
        ConflictMode::Prompt
    } else {
        opts.on_conflict.unwrap_or(configured)
    }
}

fn policy_for(mode: ConflictMode) -> Arc<dyn ConflictPolicy> {
    match mode.decision() {
        Some(decision) => Arc::new(Fixed(decision)),
        None => Arc::new(PromptUser::stdio()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::Decision;

    #[test]
    fn settings_apply_without_flags() {
        assert_eq!(
            conflict_mode(&LinkOpts::default(), ConflictMode::Skip),
            ConflictMode::Skip
        );
    }

    #[test]
    fn flag_overrides_settings() {
        let opts = LinkOpts {
            on_conflict: Some(ConflictMode::Overwrite),
            ..LinkOpts::default()
        };
        assert_eq!(
            conflict_mode(&opts, ConflictMode::Skip),
            ConflictMode::Overwrite
        );
    }

    #[test]
    fn interactive_means_prompt() {
        let opts = LinkOpts {
            interactive: true,
            ..LinkOpts::default()
        };
        assert_eq!(
            conflict_mode(&opts, ConflictMode::Backup),
            ConflictMode::Prompt
        );
    }

    #[test]
    fn fixed_modes_build_fixed_policies() {
        let policy = policy_for(ConflictMode::Overwrite);
        assert_eq!(format!("{policy:?}"), format!("{:?}", Fixed(Decision::Overwrite)));
    }
}
