//! Shellenv command implementation.
//!
//! Meant to be `eval`ed from a shell rc file, so only shell code goes to
//! stdout; all logging goes to stderr.
use std::io::Write as _;
use std::sync::Arc;

use anyhow::{Context as _, Result};

use crate::cli::{GlobalOpts, ShellenvOpts};
use crate::exec::{SystemExecutor, running_as_root};
use crate::logging::Logger;
use crate::session::{Module, Session};

/// Run the shellenv command.
///
/// # Errors
///
/// Returns an error if the root, environment or settings cannot be loaded,
/// or if writing to stdout fails.  A missing rules file only disables the
/// link check.
pub fn run(global: &GlobalOpts, opts: &ShellenvOpts, log: &Arc<Logger>) -> Result<()> {
    let setup = super::CommandSetup::init(global, log.as_ref())?;
    let modules = requested_modules(opts);

    let rules = if modules.contains(&Module::LinkCheck) {
        match setup.load_rules(global, log.as_ref()) {
            Ok(parsed) => parsed.rules,
            Err(e) => {
                log.warn(&format!("link check disabled: {e:#}"));
                Vec::new()
            }
        }
    } else {
        Vec::new()
    };

    let entries = setup.catalog();
    let as_root = entries.iter().any(|e| e.run_as.is_some())
        && running_as_root(&SystemExecutor::new());

    let mut session = Session::new(
        &setup.root,
        setup.env.clone(),
        setup.cache_manager(log.clone())?,
        setup.settings.cache.clone(),
    )
    .with_rules(rules)
    .with_entries(entries)
    .with_running_as_root(as_root)
    .with_log(log.clone());

    let mut out = std::io::stdout().lock();
    session
        .init_all(&modules, &mut out)
        .context("writing shell code")?;
    out.flush().context("writing shell code")?;
    Ok(())
}

/// The modules to emit: those given with `--module`, or all of them.
#[must_use]
pub fn requested_modules(opts: &ShellenvOpts) -> Vec<Module> {
    if opts.modules.is_empty() {
        Module::ALL.to_vec()
    } else {
        opts.modules.clone()
    }
}
