//! Converge filesystem symlinks to the declared rules.
//!
//! The [`Reconciler`] walks each rule's `(source, destination)` pairs and
//! links, unlinks or inspects them.  Every pair is handled independently:
//! a failure is logged, recorded as a [`SkipReason`] and the batch moves
//! on.
pub mod policy;
pub mod progress;
pub mod report;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use policy::{AlwaysBackup, Conflict, ConflictPolicy, Decision, Fixed, PromptUser};
pub use progress::{NoProgress, Progress, TerminalProgress};
pub use report::{LinkReport, Outcome, Report, SkipReason, Summary};

use crate::env::Environment;
use crate::logging::{Log, NullLog};
use crate::operations::{EntryKind, FileSystemOps, SystemFileSystemOps};
use crate::resources::symlink::{is_managed, normalize_lexically, resolve_link};
use crate::resources::{BackupLocation, LinkStatus, SymlinkResource};
use crate::rules::{Rule, RuleKind};

/// What a reconciliation pass does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Create missing links, resolving conflicts through the policy.
    Link,
    /// Remove managed links and restore backups.
    Unlink,
    /// Classify every destination without modifying anything.
    Status,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Link => f.write_str("link"),
            Self::Unlink => f.write_str("unlink"),
            Self::Status => f.write_str("status"),
        }
    }
}

/// Applies rules against the filesystem.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use std::sync::Arc;
/// use jsh_cli::env::Environment;
/// use jsh_cli::platform::Os;
/// use jsh_cli::reconcile::{Mode, Reconciler};
/// use jsh_cli::rules::parse;
///
/// let env = Environment::new("/home/u", Os::Linux);
/// let reconciler = Reconciler::new(Path::new("/opt/jsh"), env).with_dry_run(true);
/// let parsed = parse("file .gitconfig\n");
/// let report = reconciler.run(&parsed.rules, Mode::Link);
/// println!("{}", report.summary());
/// ```
pub struct Reconciler {
    root: PathBuf,
    env: Environment,
    fs: Arc<dyn FileSystemOps>,
    policy: Arc<dyn ConflictPolicy>,
    log: Arc<dyn Log>,
    progress: Arc<dyn Progress>,
    backups: BackupLocation,
    dry_run: bool,
}

impl fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("root", &self.root)
            .field("env", &self.env)
            .field("policy", &self.policy)
            .field("backups", &self.backups)
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Create a reconciler for the tool root `root`.
    ///
    /// `root` is canonicalised when it exists so the managed-link check
    /// compares like with like.  Defaults: real filesystem, always back up,
    /// sibling backups, no logging, no progress, live run.
    #[must_use]
    pub fn new(root: &Path, env: Environment) -> Self {
        let root = dunce::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
        Self {
            root,
            env,
            fs: Arc::new(SystemFileSystemOps),
            policy: Arc::new(AlwaysBackup),
            log: Arc::new(NullLog),
            progress: Arc::new(NoProgress),
            backups: BackupLocation::default(),
            dry_run: false,
        }
    }

    /// Use `fs` for every filesystem call.
    #[must_use]
    pub fn with_fs(mut self, fs: Arc<dyn FileSystemOps>) -> Self {
        self.fs = fs;
        self
    }

    /// Resolve conflicts with `policy`.
    #[must_use]
    pub fn with_policy(mut self, policy: Arc<dyn ConflictPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Log through `log`.
    #[must_use]
    pub fn with_log(mut self, log: Arc<dyn Log>) -> Self {
        self.log = log;
        self
    }

    /// Report progress to `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn Progress>) -> Self {
        self.progress = progress;
        self
    }

    /// Place backups at `location`.
    #[must_use]
    pub fn with_backup_location(mut self, location: BackupLocation) -> Self {
        self.backups = location;
        self
    }

    /// Log mutating steps instead of performing them.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// The (canonical) tool root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reconcile every rule in order.
    #[must_use]
    pub fn run(&self, rules: &[Rule], mode: Mode) -> Report {
        let active: Vec<&Rule> = rules
            .iter()
            .filter(|r| r.platform.matches(self.env.os))
            .collect();
        self.progress.begin(active.len());
        let mut report = Report::default();
        for rule in active {
            self.progress.step(&rule.to_string());
            report.entries.extend(self.reconcile(rule, mode));
        }
        self.progress.finish();
        report
    }

    /// Reconcile one rule.
    ///
    /// Returns no entries when the rule does not apply to this platform;
    /// otherwise one entry per `(source, destination)` pair.
    #[must_use]
    pub fn reconcile(&self, rule: &Rule, mode: Mode) -> Vec<LinkReport> {
        if !rule.platform.matches(self.env.os) {
            self.log.debug(&format!(
                "skipping '{rule}': not applicable on {}",
                self.env.os
            ));
            return Vec::new();
        }
        let report = |source: PathBuf, destination: PathBuf, outcome: Outcome| LinkReport {
            rule: rule.clone(),
            source,
            destination,
            outcome,
        };

        let source = self.root.join(rule.source_path());
        if rule.source_escapes_root() {
            self.log.warn(&format!(
                "'{rule}': source {} is outside the tool root",
                source.display()
            ));
            let destination = self.env.destination(&rule.destination, &source);
            return vec![report(source, destination, Outcome::skipped(SkipReason::SourceMissing))];
        }
        let destination = self.env.destination(&rule.destination, &source);
        for name in self.env.unknown_variables(&rule.destination) {
            self.log.warn(&format!(
                "'{rule}': unknown variable {name} left as written in {}",
                destination.display()
            ));
        }

        if rule.kind != RuleKind::Children {
            let outcome = self.reconcile_pair(&source, &destination, mode);
            return vec![report(source, destination, outcome)];
        }

        let pairs = self.children_pairs(&source, &destination, mode);
        if pairs.is_empty() {
            if mode != Mode::Unlink && self.fs.is_dir(&source) {
                self.log
                    .debug(&format!("'{rule}': source directory is empty"));
                return Vec::new();
            }
            let outcome = if mode == Mode::Unlink {
                Outcome::NotLinked
            } else {
                self.log.warn(&format!(
                    "source directory does not exist: {}",
                    source.display()
                ));
                Outcome::skipped(SkipReason::SourceMissing)
            };
            return vec![report(source, destination, outcome)];
        }
        pairs
            .into_iter()
            .map(|(child_src, child_dest)| {
                let outcome = self.reconcile_pair(&child_src, &child_dest, mode);
                report(child_src, child_dest, outcome)
            })
            .collect()
    }

    /// Pairs for a `children` rule, sorted by destination.
    ///
    /// In unlink mode, managed links in `dest_dir` that point into
    /// `source_dir` are included even if their source has since been
    /// removed from the tool root.
    fn children_pairs(
        &self,
        source_dir: &Path,
        dest_dir: &Path,
        mode: Mode,
    ) -> Vec<(PathBuf, PathBuf)> {
        let mut pairs = BTreeMap::new();
        if self.fs.is_dir(source_dir) {
            match self.fs.read_dir(source_dir) {
                Ok(children) => {
                    for child in children {
                        if let Some(name) = child.file_name() {
                            let dest = dest_dir.join(name);
                            pairs.insert(dest, child);
                        }
                    }
                }
                Err(e) => self.log.warn(&format!(
                    "cannot list {}: {e}",
                    source_dir.display()
                )),
            }
        }
        if mode == Mode::Unlink {
            let source_root = normalize_lexically(source_dir);
            for link in self.fs.read_dir(dest_dir).unwrap_or_default() {
                if pairs.contains_key(&link) || !is_managed(&*self.fs, &link, &self.root) {
                    continue;
                }
                let points_into_source = resolve_link(&*self.fs, &link)
                    .is_some_and(|target| target.starts_with(&source_root));
                if points_into_source && let Some(name) = link.file_name() {
                    let source = source_dir.join(name);
                    pairs.insert(link, source);
                }
            }
        }
        pairs.into_iter().map(|(dest, src)| (src, dest)).collect()
    }

    fn reconcile_pair(&self, source: &Path, destination: &Path, mode: Mode) -> Outcome {
        let link = SymlinkResource::new(source.to_path_buf(), destination.to_path_buf());
        match mode {
            Mode::Link => self.link(&link),
            Mode::Unlink => self.unlink(&link),
            Mode::Status => self.status(&link),
        }
    }

    fn link(&self, link: &SymlinkResource) -> Outcome {
        let fs = &*self.fs;
        let dest = &link.destination;
        if !link.source_exists(fs) {
            self.log.warn(&format!(
                "source does not exist: {}",
                link.source.display()
            ));
            return Outcome::skipped(SkipReason::SourceMissing);
        }
        let kind = match fs.entry_kind(dest) {
            Ok(kind) => kind,
            Err(e) => {
                self.log
                    .warn(&format!("cannot inspect {}: {e}", dest.display()));
                return Outcome::skipped(SkipReason::LinkFailed(e.to_string()));
            }
        };
        let Some(kind) = kind else {
            return self.create(link, Outcome::Linked);
        };
        if kind == EntryKind::Symlink && link.points_to_source(fs) {
            self.log
                .debug(&format!("already linked: {}", link.description()));
            return Outcome::AlreadyLinked;
        }
        if let Some(outcome) = self.check_inside_root(link) {
            return outcome;
        }
        match kind {
            EntryKind::Symlink => {
                if self.dry_run {
                    self.log
                        .dry_run(&format!("would replace link {}", dest.display()));
                } else if let Err(e) = link.remove_link(fs) {
                    self.log.warn(&e.to_string());
                    return Outcome::skipped(SkipReason::RemoveFailed(e.to_string()));
                }
                self.create(link, Outcome::Linked)
            }
            kind => {
                let conflict = Conflict {
                    destination: dest.clone(),
                    source: link.source.clone(),
                    kind,
                };
                match self.policy.decide(&conflict) {
                    Decision::Skip => {
                        self.log.info(&format!("skipped: {conflict}"));
                        Outcome::skipped(SkipReason::Declined)
                    }
                    Decision::Backup => self.back_up_and_link(link),
                    Decision::Overwrite => self.overwrite_and_link(link),
                }
            }
        }
    }

    /// Where the entry at `dest` physically lives once symlinked parent
    /// directories are resolved.
    fn physical_location(&self, dest: &Path) -> Option<PathBuf> {
        let parent = self.fs.canonicalize(dest.parent()?).ok()?;
        Some(parent.join(dest.file_name()?))
    }

    /// Guard for destinations reached through a symlink into the tool root.
    ///
    /// The source itself counts as already linked; anything else inside the
    /// root is never backed up, overwritten or replaced.
    fn check_inside_root(&self, link: &SymlinkResource) -> Option<Outcome> {
        let physical = self.physical_location(&link.destination)?;
        let source = self
            .fs
            .canonicalize(&link.source)
            .unwrap_or_else(|_| link.source.clone());
        if physical == source {
            self.log.debug(&format!(
                "already linked through a parent directory: {}",
                link.description()
            ));
            return Some(Outcome::AlreadyLinked);
        }
        if physical.starts_with(&self.root) {
            self.log.warn(&format!(
                "{} resolves into the tool root ({}), leaving it alone",
                link.destination.display(),
                physical.display()
            ));
            return Some(Outcome::skipped(SkipReason::InsideRoot));
        }
        None
    }

    fn back_up_and_link(&self, link: &SymlinkResource) -> Outcome {
        let fs = &*self.fs;
        let dest = &link.destination;
        let home = &self.env.home;
        if self.dry_run {
            let Some(backup) = self.backups.next_free(fs, dest, home) else {
                self.log
                    .warn(&format!("no free backup slot for {}", dest.display()));
                return Outcome::skipped(SkipReason::BackupFailed(
                    "all backup slots are taken".to_string(),
                ));
            };
            self.log.dry_run(&format!(
                "would back up {} to {}",
                dest.display(),
                backup.display()
            ));
            return self.create(link, Outcome::BackedUpAndLinked { backup });
        }
        let backup = match self.backups.back_up(fs, dest, home) {
            Ok(backup) => backup,
            Err(e) => {
                self.log.warn(&e.to_string());
                return Outcome::skipped(SkipReason::BackupFailed(e.to_string()));
            }
        };
        self.log.info(&format!(
            "backed up {} to {}",
            dest.display(),
            backup.display()
        ));
        let outcome = self.create(
            link,
            Outcome::BackedUpAndLinked {
                backup: backup.clone(),
            },
        );
        if matches!(outcome, Outcome::Skipped { .. }) && fs.move_path(&backup, dest).is_ok() {
            self.log
                .info(&format!("restored {} after failed link", dest.display()));
        }
        outcome
    }

    fn overwrite_and_link(&self, link: &SymlinkResource) -> Outcome {
        let dest = &link.destination;
        if self.dry_run {
            self.log.dry_run(&format!("would delete {}", dest.display()));
        } else if let Err(e) = self.fs.remove_all(dest) {
            self.log
                .warn(&format!("cannot remove {}: {e}", dest.display()));
            return Outcome::skipped(SkipReason::RemoveFailed(e.to_string()));
        }
        self.create(link, Outcome::Overwritten)
    }

    /// Create the link, returning `success` or a `LinkFailed` skip.
    fn create(&self, link: &SymlinkResource, success: Outcome) -> Outcome {
        if self.dry_run {
            self.log.dry_run(&format!("would link {}", link.description()));
            return success;
        }
        match link.create(&*self.fs) {
            Ok(()) => {
                self.log.info(&format!("linked {}", link.description()));
                success
            }
            Err(e) => {
                self.log.warn(&e.to_string());
                Outcome::skipped(SkipReason::LinkFailed(e.to_string()))
            }
        }
    }

    fn unlink(&self, link: &SymlinkResource) -> Outcome {
        let fs = &*self.fs;
        let dest = &link.destination;
        if !is_managed(fs, dest, &self.root) {
            self.log
                .debug(&format!("not a managed link: {}", dest.display()));
            return Outcome::NotLinked;
        }
        if self.dry_run {
            self.log
                .dry_run(&format!("would remove link {}", dest.display()));
            let primary = self.backups.primary_path(dest, &self.env.home);
            let restored = matches!(fs.entry_kind(&primary), Ok(Some(_))).then_some(primary);
            if let Some(backup) = &restored {
                self.log
                    .dry_run(&format!("would restore {}", backup.display()));
            }
            return Outcome::Unlinked { restored };
        }
        if let Err(e) = link.remove_link(fs) {
            self.log.warn(&e.to_string());
            return Outcome::skipped(SkipReason::RemoveFailed(e.to_string()));
        }
        self.log.info(&format!("unlinked {}", dest.display()));
        let restored = match self.backups.restore(fs, dest, &self.env.home) {
            Ok(restored) => restored,
            Err(e) => {
                self.log.warn(&e.to_string());
                None
            }
        };
        if let Some(backup) = &restored {
            self.log.info(&format!(
                "restored {} from {}",
                dest.display(),
                backup.display()
            ));
        }
        Outcome::Unlinked { restored }
    }

    fn status(&self, link: &SymlinkResource) -> Outcome {
        let fs = &*self.fs;
        if !link.source_exists(fs) {
            self.log.warn(&format!(
                "source does not exist: {}",
                link.source.display()
            ));
            return Outcome::skipped(SkipReason::SourceMissing);
        }
        match link.status(fs, &self.root) {
            Ok(LinkStatus::Linked) => Outcome::AlreadyLinked,
            Ok(LinkStatus::Absent) => Outcome::NotLinked,
            Ok(status) => {
                if let Some(outcome) = self.check_inside_root(link) {
                    return outcome;
                }
                self.log.warn(&format!(
                    "{} {}",
                    link.destination.display(),
                    status.describe()
                ));
                Outcome::ConflictReported { status }
            }
            Err(e) => {
                self.log.warn(&format!(
                    "cannot inspect {}: {e}",
                    link.destination.display()
                ));
                Outcome::skipped(SkipReason::LinkFailed(e.to_string()))
            }
        }
    }
}
