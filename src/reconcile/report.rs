//! Per-entry outcomes and the batch summary.
use std::fmt;
use std::path::PathBuf;

use crate::resources::LinkStatus;
use crate::rules::Rule;

/// Why an entry was left alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The source does not exist under the tool root.
    SourceMissing,
    /// The conflict policy chose to skip.
    Declined,
    /// Moving the destination to its backup failed.
    BackupFailed(String),
    /// Removing the destination failed.
    RemoveFailed(String),
    /// Creating the symlink failed.
    LinkFailed(String),
    /// The destination resolves to a path inside the tool root.
    InsideRoot,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SourceMissing => f.write_str("source missing"),
            Self::Declined => f.write_str("declined"),
            Self::BackupFailed(msg) => write!(f, "backup failed: {msg}"),
            Self::RemoveFailed(msg) => write!(f, "remove failed: {msg}"),
            Self::LinkFailed(msg) => write!(f, "link failed: {msg}"),
            Self::InsideRoot => f.write_str("destination is inside the tool root"),
        }
    }
}

/// What happened (or, in dry-run, would happen) to one destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The destination already pointed at the source.
    AlreadyLinked,
    /// A new symlink was created.
    Linked,
    /// The previous occupant was moved to `backup`, then linked.
    BackedUpAndLinked {
        /// Where the previous occupant now lives.
        backup: PathBuf,
    },
    /// The previous occupant was deleted, then linked.
    Overwritten,
    /// Nothing was changed.
    Skipped {
        /// Why.
        reason: SkipReason,
    },
    /// Status mode: the destination is not what it should be.
    ConflictReported {
        /// What was found.
        status: LinkStatus,
    },
    /// A managed symlink was removed.
    Unlinked {
        /// Backup moved back into place, if any.
        restored: Option<PathBuf>,
    },
    /// Unlink or status found nothing managed at the destination.
    NotLinked,
}

impl Outcome {
    /// Skip with `reason`.
    #[must_use]
    pub const fn skipped(reason: SkipReason) -> Self {
        Self::Skipped { reason }
    }

    /// Whether this outcome changed the filesystem.
    #[must_use]
    pub const fn is_change(&self) -> bool {
        matches!(
            self,
            Self::Linked | Self::BackedUpAndLinked { .. } | Self::Overwritten | Self::Unlinked { .. }
        )
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyLinked => f.write_str("already linked"),
            Self::Linked => f.write_str("linked"),
            Self::BackedUpAndLinked { backup } => {
                write!(f, "linked (backup at {})", backup.display())
            }
            Self::Overwritten => f.write_str("linked (overwrote existing)"),
            Self::Skipped { reason } => write!(f, "skipped ({reason})"),
            Self::ConflictReported { status } => write!(f, "conflict ({})", status.describe()),
            Self::Unlinked { restored: None } => f.write_str("unlinked"),
            Self::Unlinked {
                restored: Some(path),
            } => write!(f, "unlinked (restored {})", path.display()),
            Self::NotLinked => f.write_str("not linked"),
        }
    }
}

/// Outcome for one `(source, destination)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkReport {
    /// Rule that produced this pair.
    pub rule: Rule,
    /// Absolute source path.
    pub source: PathBuf,
    /// Absolute destination path.
    pub destination: PathBuf,
    /// What happened.
    pub outcome: Outcome,
}

impl fmt::Display for LinkReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.destination.display(), self.outcome)
    }
}

/// Counts per outcome for a whole batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    /// New links created.
    pub linked: usize,
    /// Links already in place.
    pub already_linked: usize,
    /// Links created after backing up the occupant.
    pub backed_up: usize,
    /// Links created after deleting the occupant.
    pub overwritten: usize,
    /// Entries skipped for any reason.
    pub skipped: usize,
    /// Status-mode conflicts.
    pub conflicts: usize,
    /// Managed links removed.
    pub unlinked: usize,
    /// Backups restored while unlinking.
    pub restored: usize,
    /// Destinations with nothing managed.
    pub not_linked: usize,
    /// Rule lines rejected by the parser.
    pub invalid_rules: usize,
}

impl Summary {
    /// Count `outcome`.
    pub fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::AlreadyLinked => self.already_linked += 1,
            Outcome::Linked => self.linked += 1,
            Outcome::BackedUpAndLinked { .. } => self.backed_up += 1,
            Outcome::Overwritten => self.overwritten += 1,
            Outcome::Skipped { .. } => self.skipped += 1,
            Outcome::ConflictReported { .. } => self.conflicts += 1,
            Outcome::Unlinked { restored } => {
                self.unlinked += 1;
                if restored.is_some() {
                    self.restored += 1;
                }
            }
            Outcome::NotLinked => self.not_linked += 1,
        }
    }

    /// Whether anything deserves the user's attention.
    #[must_use]
    pub const fn has_problems(&self) -> bool {
        self.skipped > 0 || self.conflicts > 0 || self.invalid_rules > 0
    }

    fn fields(&self) -> [(usize, &'static str); 10] {
        [
            (self.linked, "linked"),
            (self.already_linked, "already linked"),
            (self.backed_up, "backed up"),
            (self.overwritten, "overwritten"),
            (self.skipped, "skipped"),
            (self.conflicts, "conflicts"),
            (self.unlinked, "unlinked"),
            (self.restored, "restored"),
            (self.not_linked, "not linked"),
            (self.invalid_rules, "invalid rules"),
        ]
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .fields()
            .iter()
            .filter(|(count, _)| *count > 0)
            .map(|(count, label)| format!("{count} {label}"))
            .collect();
        if parts.is_empty() {
            f.write_str("nothing to do")
        } else {
            f.write_str(&parts.join(", "))
        }
    }
}

/// Result of a whole batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    /// One entry per reconciled pair, in rule order.
    pub entries: Vec<LinkReport>,
    /// Rule lines rejected by the parser, counted in the summary.
    pub invalid_rules: usize,
}

impl Report {
    /// Aggregate counts.
    #[must_use]
    pub fn summary(&self) -> Summary {
        let mut summary = Summary {
            invalid_rules: self.invalid_rules,
            ..Summary::default()
        };
        for entry in &self.entries {
            summary.record(&entry.outcome);
        }
        summary
    }

    /// Entries whose outcome is a status-mode conflict.
    pub fn conflicts(&self) -> impl Iterator<Item = &LinkReport> {
        self.entries
            .iter()
            .filter(|e| matches!(e.outcome, Outcome::ConflictReported { .. }))
    }
}
