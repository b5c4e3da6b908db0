//! Filesystem operation abstractions for dependency injection.
//!
//! Provides the [`FileSystemOps`] trait so the reconciler can be exercised
//! against injected failures (permission errors, immutable files) without
//! needing a privileged test environment.  Production code uses
//! [`SystemFileSystemOps`].

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// What occupies a path, without following a final symlink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A regular file.
    File,
    /// A real directory.
    Directory,
    /// A symbolic link (possibly dangling).
    Symlink,
    /// Anything else (socket, fifo, device).
    Other,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => f.write_str("a regular file"),
            Self::Directory => f.write_str("a directory"),
            Self::Symlink => f.write_str("a symlink"),
            Self::Other => f.write_str("a special file"),
        }
    }
}

/// Abstraction over the filesystem calls made while reconciling links.
///
/// Implement this trait to wrap [`SystemFileSystemOps`] with injected
/// failures in tests.
pub trait FileSystemOps: Send + Sync + fmt::Debug {
    /// Kind of entry at `path` (not following a final symlink), `None` if
    /// nothing is there.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata cannot be read for reasons other
    /// than absence.
    fn entry_kind(&self, path: &Path) -> io::Result<Option<EntryKind>>;

    /// Returns `true` if `path` exists, following symlinks.
    fn exists(&self, path: &Path) -> bool;

    /// Returns `true` if `path` is a directory, following symlinks.
    fn is_dir(&self, path: &Path) -> bool;

    /// Read the target of the symlink at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` is not a symlink or cannot be read.
    fn read_link(&self, path: &Path) -> io::Result<PathBuf>;

    /// Resolve `path` to an absolute path with all symlinks followed.
    ///
    /// # Errors
    ///
    /// Returns an error if any component does not exist.
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;

    /// Immediate children of the directory at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` cannot be read as a directory.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;

    /// Create `path` and any missing ancestors.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be created.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Create a symlink at `link` pointing to `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the link cannot be created.
    fn symlink(&self, target: &Path, link: &Path) -> io::Result<()>;

    /// Remove the symlink at `path` (never its target).
    ///
    /// # Errors
    ///
    /// Returns an error if removal fails.
    fn remove_link(&self, path: &Path) -> io::Result<()>;

    /// Remove the file or directory tree at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if removal fails.
    fn remove_all(&self, path: &Path) -> io::Result<()>;

    /// Move `from` to `to`, crossing filesystems if necessary.
    ///
    /// # Errors
    ///
    /// Returns an error if the move fails; `from` is left in place.
    fn move_path(&self, from: &Path, to: &Path) -> io::Result<()>;
}

/// Production [`FileSystemOps`] implementation that delegates to [`std::fs`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemFileSystemOps;

impl FileSystemOps for SystemFileSystemOps {
    fn entry_kind(&self, path: &Path) -> io::Result<Option<EntryKind>> {
        match std::fs::symlink_metadata(path) {
            Ok(meta) => {
                let ft = meta.file_type();
                Ok(Some(if ft.is_symlink() {
                    EntryKind::Symlink
                } else if ft.is_dir() {
                    EntryKind::Directory
                } else if ft.is_file() {
                    EntryKind::File
                } else {
                    EntryKind::Other
                }))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        std::fs::read_link(path)
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        dunce::canonicalize(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        std::fs::read_dir(path)?
            .map(|e| e.map(|entry| entry.path()))
            .collect()
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn symlink(&self, target: &Path, link: &Path) -> io::Result<()> {
        #[cfg(unix)]
        {
            std::os::unix::fs::symlink(target, link)
        }
        #[cfg(not(unix))]
        {
            let _ = (target, link);
            Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "symlinks are only supported on Unix",
            ))
        }
    }

    fn remove_link(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }

    fn remove_all(&self, path: &Path) -> io::Result<()> {
        let meta = std::fs::symlink_metadata(path)?;
        if meta.is_dir() {
            std::fs::remove_dir_all(path)
        } else {
            std::fs::remove_file(path)
        }
    }

    fn move_path(&self, from: &Path, to: &Path) -> io::Result<()> {
        match std::fs::rename(from, to) {
            Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                copy_tree(from, to)?;
                self.remove_all(from)
            }
            other => other,
        }
    }
}

/// Copy a file or directory tree, preserving symlinks as symlinks.
fn copy_tree(from: &Path, to: &Path) -> io::Result<()> {
    let meta = std::fs::symlink_metadata(from)?;
    if meta.file_type().is_symlink() {
        let target = std::fs::read_link(from)?;
        return SystemFileSystemOps.symlink(&target, to);
    }
    if meta.is_dir() {
        std::fs::create_dir_all(to)?;
        for entry in std::fs::read_dir(from)? {
            let entry = entry?;
            copy_tree(&entry.path(), &to.join(entry.file_name()))?;
        }
        return Ok(());
    }
    std::fs::copy(from, to).map(|_| ())
}
