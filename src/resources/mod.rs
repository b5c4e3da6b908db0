//! Filesystem primitives the reconciler is built from: symlink state
//! classification, link creation/removal and backups.
pub mod backup;
pub mod symlink;

use std::path::PathBuf;

pub use backup::{BACKUP_SUFFIX, BackupLocation};
pub use symlink::SymlinkResource;

use crate::operations::EntryKind;

/// Observed state of a destination relative to the source it should link to.
///
/// # Examples
///
/// ```
/// use jsh_cli::resources::LinkStatus;
///
/// assert!(!LinkStatus::Linked.needs_change());
/// assert!(LinkStatus::Absent.needs_change());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkStatus {
    /// The destination is a symlink resolving to the source.
    Linked,
    /// The destination is a symlink, but to something else.
    WrongTarget {
        /// Raw link target as stored in the symlink.
        target: PathBuf,
        /// Whether the target still lies inside the tool root.
        managed: bool,
    },
    /// The destination exists and is not a symlink.
    NotSymlink {
        /// What occupies the destination.
        kind: EntryKind,
    },
    /// Nothing exists at the destination.
    Absent,
}

impl LinkStatus {
    /// Whether linking would modify the destination.
    #[must_use]
    pub const fn needs_change(&self) -> bool {
        !matches!(self, Self::Linked)
    }

    /// Short human-readable description.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Linked => "linked".to_string(),
            Self::WrongTarget { target, managed } => {
                let owner = if *managed { "managed" } else { "foreign" };
                format!("points to {} ({owner})", target.display())
            }
            Self::NotSymlink { kind } => format!("is {kind}"),
            Self::Absent => "absent".to_string(),
        }
    }
}
