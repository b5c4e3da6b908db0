//! Symlink resource: one `(source, destination)` pair.
use std::io;
use std::path::{Component, Path, PathBuf};

use super::LinkStatus;
use crate::error::ReconcileError;
use crate::operations::{EntryKind, FileSystemOps};

/// A symlink that should exist at `destination` pointing to `source`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymlinkResource {
    /// What the symlink points to (inside the tool root).
    pub source: PathBuf,
    /// Where the symlink lives.
    pub destination: PathBuf,
}

impl SymlinkResource {
    /// Create a new symlink resource.
    #[must_use]
    pub const fn new(source: PathBuf, destination: PathBuf) -> Self {
        Self {
            source,
            destination,
        }
    }

    /// Human-readable description.
    #[must_use]
    pub fn description(&self) -> String {
        format!("{} -> {}", self.destination.display(), self.source.display())
    }

    /// Whether the source exists (a dangling source symlink counts as absent).
    #[must_use]
    pub fn source_exists(&self, fs: &dyn FileSystemOps) -> bool {
        fs.exists(&self.source)
    }

    /// Whether the destination symlink already resolves to the source.
    ///
    /// Compares the raw link target first, then the canonical forms of both
    /// sides, so relative links and symlinked parents are recognised.
    #[must_use]
    pub fn points_to_source(&self, fs: &dyn FileSystemOps) -> bool {
        let Ok(raw) = fs.read_link(&self.destination) else {
            return false;
        };
        if raw == self.source {
            return true;
        }
        match (
            fs.canonicalize(&self.destination),
            fs.canonicalize(&self.source),
        ) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }

    /// Classify the destination without modifying anything.
    ///
    /// # Errors
    ///
    /// Returns an error if the destination's metadata cannot be read.
    pub fn status(&self, fs: &dyn FileSystemOps, root: &Path) -> io::Result<LinkStatus> {
        Ok(match fs.entry_kind(&self.destination)? {
            None => LinkStatus::Absent,
            Some(EntryKind::Symlink) => {
                if self.points_to_source(fs) {
                    LinkStatus::Linked
                } else {
                    LinkStatus::WrongTarget {
                        target: fs.read_link(&self.destination)?,
                        managed: is_managed(fs, &self.destination, root),
                    }
                }
            }
            Some(kind) => LinkStatus::NotSymlink { kind },
        })
    }

    /// Create missing parent directories, then the symlink.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::LinkFailed`] if either step fails.
    pub fn create(&self, fs: &dyn FileSystemOps) -> Result<(), ReconcileError> {
        let link_failed = |source| ReconcileError::LinkFailed {
            path: self.destination.clone(),
            source,
        };
        if let Some(parent) = self.destination.parent() {
            fs.create_dir_all(parent).map_err(link_failed)?;
        }
        fs.symlink(&self.source, &self.destination)
            .map_err(link_failed)
    }

    /// Remove the symlink at the destination.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::RemoveFailed`] if removal fails.
    pub fn remove_link(&self, fs: &dyn FileSystemOps) -> Result<(), ReconcileError> {
        fs.remove_link(&self.destination)
            .map_err(|source| ReconcileError::RemoveFailed {
                path: self.destination.clone(),
                source,
            })
    }
}

/// Resolve the final target of the symlink at `link`.
///
/// Uses full canonicalisation when the chain resolves.  For dangling links
/// the stored target is joined onto the link's directory and normalised
/// lexically, so `..` segments still cannot smuggle a path into the root.
#[must_use]
pub fn resolve_link(fs: &dyn FileSystemOps, link: &Path) -> Option<PathBuf> {
    if let Ok(resolved) = fs.canonicalize(link) {
        return Some(resolved);
    }
    let raw = fs.read_link(link).ok()?;
    let joined = if raw.is_absolute() {
        raw
    } else {
        link.parent().unwrap_or_else(|| Path::new("/")).join(raw)
    };
    Some(normalize_lexically(&joined))
}

/// Whether `link` is a symlink whose resolved target lies inside `root`.
///
/// `root` must already be canonical.  This is the only ownership signal:
/// nothing outside the root is ever considered managed.
#[must_use]
pub fn is_managed(fs: &dyn FileSystemOps, link: &Path, root: &Path) -> bool {
    if !matches!(fs.entry_kind(link), Ok(Some(EntryKind::Symlink))) {
        return false;
    }
    resolve_link(fs, link).is_some_and(|target| target.starts_with(root))
}

/// Collapse `.` and `..` components without touching the filesystem.
#[must_use]
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}
