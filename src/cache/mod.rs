//! TTL and invalidation-key cache for expensive subprocess output.
//!
//! Each entry lives in two files under `<root>/<namespace>/`:
//!
//! ```text
//! <key>               raw payload; its mtime is the entry's age
//! <key>.invalidation  marker last seen from the entry's probe (optional)
//! ```
//!
//! An entry is served only while it is fresh: the payload exists, its age
//! does not exceed the TTL, and the probe (if any) still reports the stored
//! marker.  Stale entries are regenerated; if regeneration fails the source
//! is invoked directly and the on-disk entry is left alone.  A command that
//! timed out is not invoked a second time.
pub mod presets;
pub mod source;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde::Serialize;

use crate::error::{CacheError, ExecError};
use crate::logging::{Log, NullLog};

pub use presets::{CacheEntry, ProbeSpec};
pub use source::{
    CacheSource, CommandSource, GitHeadProbe, InvalidationProbe, ModifiedProbe, SourceError,
};

/// Namespace holding command output.
pub const DEFAULT_NAMESPACE: &str = "commands";

/// File name suffix of an entry's marker file.
pub const MARKER_SUFFIX: &str = ".invalidation";

/// Check that `key` can be used as a cache file name.
///
/// # Errors
///
/// Returns [`CacheError::InvalidKey`] unless the key is non-empty, uses only
/// ASCII letters, digits, `.`, `_` and `-`, does not start with `.` and
/// does not end with the marker suffix.
///
/// # Examples
///
/// ```
/// use jsh_cli::cache::validate_key;
///
/// assert!(validate_key("brew_shellenv").is_ok());
/// assert!(validate_key("../etc/passwd").is_err());
/// ```
pub fn validate_key(key: &str) -> Result<(), CacheError> {
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-');
    if key.is_empty()
        || key.starts_with('.')
        || key.ends_with(MARKER_SUFFIX)
        || !key.chars().all(allowed)
    {
        return Err(CacheError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Source of the current time.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current wall-clock time.
    fn now(&self) -> SystemTime;
}

/// The system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// A clock stopped at a fixed instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub SystemTime);

impl Clock for FixedClock {
    fn now(&self) -> SystemTime {
        self.0
    }
}

/// Read-only view of one cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStatus {
    /// Cache key.
    pub key: String,
    /// Payload path.
    pub path: PathBuf,
    /// Whether the payload exists.
    pub exists: bool,
    /// Age of the payload in seconds, `None` when absent.
    pub age: Option<u64>,
    /// TTL in seconds.
    pub ttl: u64,
    /// Whether the entry would be served without regeneration.
    pub valid: bool,
    /// Stored invalidation marker.
    pub marker: Option<String>,
}

/// File-backed cache for one namespace.
#[derive(Clone)]
pub struct CacheManager {
    dir: PathBuf,
    clock: Arc<dyn Clock>,
    log: Arc<dyn Log>,
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("dir", &self.dir)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl CacheManager {
    /// Cache stored in `<root>/<namespace>`.  The directory is created on
    /// the first write.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidKey`] if `namespace` is not a valid
    /// file name.
    pub fn new(root: impl AsRef<Path>, namespace: &str) -> Result<Self, CacheError> {
        validate_key(namespace)?;
        Ok(Self {
            dir: root.as_ref().join(namespace),
            clock: Arc::new(SystemClock),
            log: Arc::new(NullLog),
        })
    }

    /// Use `clock` as the source of `now`.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Report regeneration problems to `log`.
    #[must_use]
    pub fn with_log(mut self, log: Arc<dyn Log>) -> Self {
        self.log = log;
        self
    }

    /// Namespace directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Payload path of `key`.
    #[must_use]
    pub fn payload_path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    fn marker_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}{MARKER_SUFFIX}"))
    }

    /// Return the cached payload for `key`, regenerating it from `source`
    /// when stale.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidKey`] for a bad key, or
    /// [`CacheError::GeneratorFailure`] when both regeneration and the
    /// direct invocation fail, or when regeneration timed out.
    pub fn get_or_regenerate(
        &self,
        key: &str,
        ttl: Duration,
        probe: Option<&dyn InvalidationProbe>,
        source: &dyn CacheSource,
    ) -> Result<String, CacheError> {
        validate_key(key)?;
        let current = probe.and_then(|p| self.probe_marker(key, p));

        if self.is_fresh(key, ttl, probe.is_some(), current.as_deref())
            && let Ok(payload) = fs::read_to_string(self.payload_path(key))
        {
            self.log.debug(&format!("cache hit: {key}"));
            return Ok(payload);
        }

        self.log
            .debug(&format!("regenerating {key} from {}", source.describe()));
        match source.generate() {
            Ok(payload) => {
                if let Err(e) = self.store(key, &payload, current.as_deref()) {
                    self.log.warn(&format!("cannot cache {key}: {e}"));
                }
                Ok(payload)
            }
            Err(e) if matches!(e.downcast_ref::<ExecError>(), Some(ExecError::TimedOut { .. })) => {
                self.log.warn(&format!(
                    "regenerating {key} failed ({e}); not running it again"
                ));
                Err(CacheError::GeneratorFailure {
                    key: key.to_string(),
                    source: e,
                })
            }
            Err(e) => {
                self.log.warn(&format!(
                    "regenerating {key} failed ({e}); running {} directly",
                    source.describe()
                ));
                source
                    .direct()
                    .map_err(|source| CacheError::GeneratorFailure {
                        key: key.to_string(),
                        source,
                    })
            }
        }
    }

    /// Remove the payload and marker of `key`.  Returns whether a payload
    /// was removed.
    ///
    /// # Errors
    ///
    /// Returns an error for a bad key or if an existing file cannot be
    /// removed.
    pub fn invalidate(&self, key: &str) -> Result<bool, CacheError> {
        validate_key(key)?;
        let removed = remove_if_present(&self.payload_path(key))?;
        remove_if_present(&self.marker_path(key))?;
        Ok(removed)
    }

    /// Describe `key` without touching the cache.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidKey`] for a bad key.
    pub fn status(
        &self,
        key: &str,
        ttl: Duration,
        probe: Option<&dyn InvalidationProbe>,
    ) -> Result<CacheStatus, CacheError> {
        validate_key(key)?;
        let path = self.payload_path(key);
        let age = self.age(&path);
        let current = probe.and_then(|p| p.current().ok());
        Ok(CacheStatus {
            key: key.to_string(),
            exists: age.is_some(),
            age,
            ttl: ttl.as_secs(),
            valid: self.is_fresh(key, ttl, probe.is_some(), current.as_deref()),
            marker: self.stored_marker(key),
            path,
        })
    }

    /// Keys with a payload in this namespace, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if the directory exists but cannot be
    /// listed.
    pub fn keys(&self) -> Result<Vec<String>, CacheError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(CacheError::Io {
                    path: self.dir.clone(),
                    source,
                });
            }
        };
        let mut keys: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|name| validate_key(name).is_ok())
            .collect();
        keys.sort();
        Ok(keys)
    }

    /// Write `payload` and `marker` for `key`.  A `None` marker removes any
    /// stored one.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if a file cannot be written.
    pub fn store(&self, key: &str, payload: &str, marker: Option<&str>) -> Result<(), CacheError> {
        validate_key(key)?;
        fs::create_dir_all(&self.dir).map_err(|source| CacheError::Io {
            path: self.dir.clone(),
            source,
        })?;
        self.write_atomic(key, &self.payload_path(key), payload)?;
        let marker_path = self.marker_path(key);
        match marker {
            Some(marker) => self.write_atomic(key, &marker_path, marker),
            None => remove_if_present(&marker_path).map(|_| ()),
        }
    }

    fn write_atomic(&self, key: &str, path: &Path, contents: &str) -> Result<(), CacheError> {
        let name = path
            .file_name()
            .map_or_else(|| key.to_string(), |n| n.to_string_lossy().into_owned());
        let tmp = self
            .dir
            .join(format!(".{name}.tmp.{}", std::process::id()));
        let io_err = |source| CacheError::Io {
            path: path.to_path_buf(),
            source,
        };
        fs::write(&tmp, contents).map_err(io_err)?;
        fs::rename(&tmp, path).map_err(|source| {
            fs::remove_file(&tmp).ok();
            io_err(source)
        })
    }

    fn probe_marker(&self, key: &str, probe: &dyn InvalidationProbe) -> Option<String> {
        match probe.current() {
            Ok(marker) => Some(marker),
            Err(e) => {
                self.log
                    .debug(&format!("invalidation probe for {key} failed: {e}"));
                None
            }
        }
    }

    fn stored_marker(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.marker_path(key)).ok()
    }

    /// Age in whole seconds; a future mtime counts as zero.
    fn age(&self, path: &Path) -> Option<u64> {
        let modified = fs::metadata(path).ok()?.modified().ok()?;
        Some(
            self.clock
                .now()
                .duration_since(modified)
                .map_or(0, |d| d.as_secs()),
        )
    }

    fn is_fresh(&self, key: &str, ttl: Duration, probed: bool, current: Option<&str>) -> bool {
        let Some(age) = self.age(&self.payload_path(key)) else {
            return false;
        };
        if age > ttl.as_secs() {
            return false;
        }
        !probed || self.stored_marker(key).as_deref() == current
    }
}

fn remove_if_present(path: &Path) -> Result<bool, CacheError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(CacheError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}
