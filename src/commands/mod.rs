//! Subcommand implementations and the setup they share.
pub mod cache;
pub mod completions;
pub mod link;
pub mod shellenv;
pub mod status;
pub mod unlink;
pub mod version;

use std::ffi::OsString;
use std::io::IsTerminal as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};

use crate::cache::{CacheEntry, CacheManager, DEFAULT_NAMESPACE, presets};
use crate::cli::GlobalOpts;
use crate::config::{DEFAULT_RULES_FILE, SETTINGS_FILE, Settings};
use crate::env::Environment;
use crate::error::EnvironmentError;
use crate::logging::{Log, Logger};
use crate::platform::Platform;
use crate::reconcile::{NoProgress, Progress, Reconciler, Report, TerminalProgress};
use crate::resources::BackupLocation;
use crate::rules::{self, ParsedRules};

/// Shared state produced by the common command setup sequence.
///
/// Encapsulates root resolution, environment capture and settings loading
/// so that each command does not have to repeat the boilerplate.
#[derive(Debug)]
pub struct CommandSetup {
    /// Canonical jsh root.
    pub root: PathBuf,
    /// Detected platform.
    pub platform: Platform,
    /// Captured user environment.
    pub env: Environment,
    /// Settings from `jsh.toml`, or the defaults.
    pub settings: Settings,
}

impl CommandSetup {
    /// Resolve the root, read the environment and load `jsh.toml`.
    ///
    /// # Errors
    ///
    /// Returns an error if the root directory cannot be determined, `HOME`
    /// is unset, or the settings file fails to parse.
    pub fn init(global: &GlobalOpts, log: &dyn Log) -> Result<Self> {
        let platform = Platform::detect();
        let root = resolve_root(global)?;
        let env = Environment::from_process(platform.os)?;
        log.debug(&format!("root: {}", root.display()));
        log.debug(&format!("platform: {}", platform.os));

        let settings_path = root.join(SETTINGS_FILE);
        let settings = Settings::load(&root)
            .with_context(|| format!("loading {}", settings_path.display()))?;

        let warnings = settings.validate();
        if !warnings.is_empty() {
            log.warn(&format!(
                "found {} configuration warning(s):",
                warnings.len()
            ));
            for warning in &warnings {
                log.warn(&format!("  {warning}"));
            }
        }

        Ok(Self {
            root,
            platform,
            env,
            settings,
        })
    }

    /// The rules file: `--rules`, else the settings' `rules` under the root.
    #[must_use]
    pub fn rules_path(&self, global: &GlobalOpts) -> PathBuf {
        global
            .rules
            .clone()
            .unwrap_or_else(|| self.settings.rules_path(&self.root))
    }

    /// Read and parse the rules file.  Invalid lines are warned about and
    /// counted; they never abort the run.
    ///
    /// # Errors
    ///
    /// Returns [`EnvironmentError::RulesUnreadable`] if the file cannot be
    /// read.
    pub fn load_rules(&self, global: &GlobalOpts, log: &dyn Log) -> Result<ParsedRules> {
        let path = self.rules_path(global);
        let text = std::fs::read_to_string(&path).map_err(|source| {
            EnvironmentError::RulesUnreadable {
                path: path.clone(),
                source,
            }
        })?;
        let parsed = rules::parse(&text);
        for error in &parsed.errors {
            log.warn(&format!("{}: {error}", path.display()));
        }
        log.debug(&format!(
            "{} rules loaded from {}",
            parsed.rules.len(),
            path.display()
        ));
        Ok(parsed)
    }

    /// Backup placement: `--backup-dir`, else `[link] backup_dir`, else next
    /// to the original.
    #[must_use]
    pub fn backup_location(&self, backup_dir: Option<&Path>) -> BackupLocation {
        backup_dir
            .map(Path::to_path_buf)
            .or_else(|| {
                self.settings
                    .link
                    .backup_dir
                    .as_deref()
                    .map(|dir| PathBuf::from(self.env.expand(dir)))
            })
            .map_or(BackupLocation::Sibling, BackupLocation::Directory)
    }

    /// A reconciler wired to this setup.
    #[must_use]
    pub fn reconciler(
        &self,
        global: &GlobalOpts,
        backup_dir: Option<&Path>,
        log: Arc<dyn Log>,
    ) -> Reconciler {
        Reconciler::new(&self.root, self.env.clone())
            .with_log(log)
            .with_backup_location(self.backup_location(backup_dir))
            .with_dry_run(global.dry_run)
    }

    /// Root of the cache: `[cache] dir`, else `$XDG_CACHE_HOME/jsh`.
    #[must_use]
    pub fn cache_root(&self) -> PathBuf {
        self.settings.cache.dir.as_deref().map_or_else(
            || self.env.xdg_cache().join("jsh"),
            |dir| PathBuf::from(self.env.expand(dir)),
        )
    }

    /// The command cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespace is not a valid directory name.
    pub fn cache_manager(&self, log: Arc<dyn Log>) -> Result<CacheManager> {
        Ok(CacheManager::new(self.cache_root(), DEFAULT_NAMESPACE)?.with_log(log))
    }

    /// Every known cache entry.
    #[must_use]
    pub fn catalog(&self) -> Vec<CacheEntry> {
        presets::catalog(&self.settings.cache, &self.env, Path::exists)
    }
}

/// A progress line on stderr when it is a terminal and nothing else is
/// being printed at the same time.
#[must_use]
pub fn progress_for(verbose: bool) -> Arc<dyn Progress> {
    if !verbose && std::io::stderr().is_terminal() {
        Arc::new(TerminalProgress::new())
    } else {
        Arc::new(NoProgress)
    }
}

/// Print the end-of-run summary for a reconciliation batch.
pub fn finish(mut report: Report, invalid_rules: usize, log: &Logger) {
    report.invalid_rules = invalid_rules;
    log.print_summary(&report.summary());
}

/// Resolve the jsh root directory from CLI arguments or auto-detection.
///
/// # Errors
///
/// Returns an error if the root directory cannot be determined or doesn't exist.
pub fn resolve_root(global: &GlobalOpts) -> Result<PathBuf> {
    Ok(locate_root(
        global.root.as_deref(),
        std::env::var_os("JSH_ROOT"),
        std::env::current_exe().ok().as_deref(),
        std::env::current_dir().ok(),
    )?)
}

/// Root resolution order: explicit root, `$JSH_ROOT`, an ancestor of the
/// executable holding the rules or settings file, the current directory if
/// it holds one of them.
///
/// # Errors
///
/// Returns [`EnvironmentError::RootMissing`] if an explicit root does not
/// exist, or [`EnvironmentError::RootNotFound`] if nothing matches.
pub fn locate_root(
    explicit: Option<&Path>,
    env_root: Option<OsString>,
    exe: Option<&Path>,
    cwd: Option<PathBuf>,
) -> Result<PathBuf, EnvironmentError> {
    let given = explicit
        .map(Path::to_path_buf)
        .or_else(|| env_root.filter(|v| !v.is_empty()).map(PathBuf::from));
    if let Some(root) = given {
        if !root.is_dir() {
            return Err(EnvironmentError::RootMissing(root));
        }
        return Ok(dunce::canonicalize(&root).unwrap_or(root));
    }

    let is_root =
        |dir: &Path| dir.join(DEFAULT_RULES_FILE).is_file() || dir.join(SETTINGS_FILE).is_file();

    if let Some(parent) = exe.and_then(Path::parent) {
        // target/release/jsh → repo root, bin/jsh → repo root
        for candidate in [parent.join("../.."), parent.join("..")] {
            if is_root(&candidate) {
                return Ok(dunce::canonicalize(&candidate).unwrap_or(candidate));
            }
        }
    }

    cwd.filter(|dir| is_root(dir))
        .ok_or(EnvironmentError::RootNotFound)
}
