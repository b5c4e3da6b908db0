//! Backup placement for destinations that must make way for a link.
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::ReconcileError;
use crate::operations::FileSystemOps;

/// Suffix appended to a destination's name to form its backup name.
pub const BACKUP_SUFFIX: &str = "-backup";

/// Highest numbered backup slot tried once the primary slot is taken.
const MAX_BACKUP_SLOTS: u32 = 99;

/// Where backups are placed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BackupLocation {
    /// Next to the destination: `<dest>-backup`.
    #[default]
    Sibling,
    /// Under a dedicated directory, mirroring the destination's path
    /// relative to `$HOME`.
    Directory(PathBuf),
}

impl BackupLocation {
    /// The primary backup path for `destination`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::path::{Path, PathBuf};
    /// use jsh_cli::resources::BackupLocation;
    ///
    /// let home = Path::new("/home/u");
    /// assert_eq!(
    ///     BackupLocation::Sibling.primary_path(Path::new("/home/u/.zshrc"), home),
    ///     PathBuf::from("/home/u/.zshrc-backup")
    /// );
    /// assert_eq!(
    ///     BackupLocation::Directory("/b".into()).primary_path(Path::new("/home/u/.config/nvim"), home),
    ///     PathBuf::from("/b/.config/nvim-backup")
    /// );
    /// ```
    #[must_use]
    pub fn primary_path(&self, destination: &Path, home: &Path) -> PathBuf {
        match self {
            Self::Sibling => append_suffix(destination, BACKUP_SUFFIX),
            Self::Directory(dir) => {
                let relative = destination
                    .strip_prefix(home)
                    .ok()
                    .filter(|rel| !rel.as_os_str().is_empty())
                    .map_or_else(
                        || {
                            destination
                                .file_name()
                                .map_or_else(PathBuf::new, PathBuf::from)
                        },
                        Path::to_path_buf,
                    );
                append_suffix(&dir.join(relative), BACKUP_SUFFIX)
            }
        }
    }

    /// First backup path not already occupied: the primary path, then
    /// `<primary>.1` through `<primary>.99`.
    ///
    /// Existing backups are never overwritten; `None` means every slot is
    /// taken.
    #[must_use]
    pub fn next_free(
        &self,
        fs: &dyn FileSystemOps,
        destination: &Path,
        home: &Path,
    ) -> Option<PathBuf> {
        let primary = self.primary_path(destination, home);
        std::iter::once(primary.clone())
            .chain((1..=MAX_BACKUP_SLOTS).map(|n| append_suffix(&primary, &format!(".{n}"))))
            .find(|candidate| !occupied(fs, candidate))
    }

    /// Move `destination` into the next free backup slot.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::BackupMoveFailed`] if no slot is free, the
    /// backup's parent cannot be created, or the move fails.  On error the
    /// destination is left untouched.
    pub fn back_up(
        &self,
        fs: &dyn FileSystemOps,
        destination: &Path,
        home: &Path,
    ) -> Result<PathBuf, ReconcileError> {
        let backup = self
            .next_free(fs, destination, home)
            .ok_or_else(|| ReconcileError::BackupMoveFailed {
                path: destination.to_path_buf(),
                backup: self.primary_path(destination, home),
                source: std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "all backup slots are taken",
                ),
            })?;
        let failed = |source| ReconcileError::BackupMoveFailed {
            path: destination.to_path_buf(),
            backup: backup.clone(),
            source,
        };
        if let Some(parent) = backup.parent() {
            fs.create_dir_all(parent).map_err(failed)?;
        }
        fs.move_path(destination, &backup).map_err(failed)?;
        Ok(backup)
    }

    /// The primary backup path if [`restore`](Self::restore) would move it
    /// back: it exists and the destination is free.
    #[must_use]
    pub fn restorable(
        &self,
        fs: &dyn FileSystemOps,
        destination: &Path,
        home: &Path,
    ) -> Option<PathBuf> {
        let primary = self.primary_path(destination, home);
        (occupied(fs, &primary) && !occupied(fs, destination)).then_some(primary)
    }

    /// Move the primary backup back to `destination` if one exists and the
    /// destination is free.  Returns the restored backup's path.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::BackupMoveFailed`] if the move fails.
    pub fn restore(
        &self,
        fs: &dyn FileSystemOps,
        destination: &Path,
        home: &Path,
    ) -> Result<Option<PathBuf>, ReconcileError> {
        let Some(primary) = self.restorable(fs, destination, home) else {
            return Ok(None);
        };
        fs.move_path(&primary, destination)
            .map_err(|source| ReconcileError::BackupMoveFailed {
                path: primary.clone(),
                backup: destination.to_path_buf(),
                source,
            })?;
        Ok(Some(primary))
    }
}

fn occupied(fs: &dyn FileSystemOps, path: &Path) -> bool {
    // Unreadable metadata counts as taken so nothing is clobbered.
    fs.entry_kind(path).map_or(true, |kind| kind.is_some())
}

fn append_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut raw = OsString::from(path.as_os_str());
    raw.push(suffix);
    PathBuf::from(raw)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::operations::SystemFileSystemOps;

    #[test]
    fn sibling_primary_path() {
        assert_eq!(
            BackupLocation::Sibling.primary_path(Path::new("/h/.config/nvim"), Path::new("/h")),
            PathBuf::from("/h/.config/nvim-backup")
        );
    }

    #[test]
    fn directory_mirrors_home_relative_path() {
        let loc = BackupLocation::Directory(PathBuf::from("/backups"));
        assert_eq!(
            loc.primary_path(Path::new("/h/.config/git/config"), Path::new("/h")),
            PathBuf::from("/backups/.config/git/config-backup")
        );
    }

    #[test]
    fn directory_outside_home_uses_file_name() {
        let loc = BackupLocation::Directory(PathBuf::from("/backups"));
        assert_eq!(
            loc.primary_path(Path::new("/etc/thing"), Path::new("/h")),
            PathBuf::from("/backups/thing-backup")
        );
    }

    #[test]
    fn next_free_skips_taken_slots() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join(".zshrc");
        std::fs::write(dir.path().join(".zshrc-backup"), "old").unwrap();
        std::fs::write(dir.path().join(".zshrc-backup.1"), "older").unwrap();

        let free = BackupLocation::Sibling
            .next_free(&SystemFileSystemOps, &dest, dir.path())
            .unwrap();
        assert_eq!(free, dir.path().join(".zshrc-backup.2"));
    }

    #[test]
    fn back_up_moves_and_preserves_existing_backup() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join(".zshrc");
        std::fs::write(&dest, "current").unwrap();
        std::fs::write(dir.path().join(".zshrc-backup"), "previous").unwrap();

        let backup = BackupLocation::Sibling
            .back_up(&SystemFileSystemOps, &dest, dir.path())
            .unwrap();

        assert!(!dest.exists());
        assert_eq!(std::fs::read_to_string(&backup).unwrap(), "current");
        assert_eq!(
            std::fs::read_to_string(dir.path().join(".zshrc-backup")).unwrap(),
            "previous"
        );
    }

    #[test]
    fn back_up_into_directory_creates_parents() {
        let home = tempfile::tempdir().unwrap();
        let store = tempfile::tempdir().unwrap();
        let dest = home.path().join(".config/nvim");
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(dest.join("init.lua"), "x").unwrap();

        let loc = BackupLocation::Directory(store.path().to_path_buf());
        let backup = loc
            .back_up(&SystemFileSystemOps, &dest, home.path())
            .unwrap();

        assert_eq!(backup, store.path().join(".config/nvim-backup"));
        assert!(backup.join("init.lua").exists());
    }

    #[test]
    fn restore_moves_primary_back() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join(".zshrc");
        std::fs::write(dir.path().join(".zshrc-backup"), "original").unwrap();

        let restored = BackupLocation::Sibling
            .restore(&SystemFileSystemOps, &dest, dir.path())
            .unwrap();

        assert_eq!(restored, Some(dir.path().join(".zshrc-backup")));
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "original");
    }

    #[test]
    fn restore_without_backup_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join(".zshrc");
        let restored = BackupLocation::Sibling
            .restore(&SystemFileSystemOps, &dest, dir.path())
            .unwrap();
        assert_eq!(restored, None);
    }

    #[test]
    fn restore_never_overwrites_destination() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join(".zshrc");
        std::fs::write(&dest, "new").unwrap();
        std::fs::write(dir.path().join(".zshrc-backup"), "old").unwrap();

        let restored = BackupLocation::Sibling
            .restore(&SystemFileSystemOps, &dest, dir.path())
            .unwrap();

        assert_eq!(restored, None);
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "new");
    }
}
