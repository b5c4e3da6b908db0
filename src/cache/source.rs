//! Payload producers and invalidation probes.
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use crate::exec::{Executor, Principal, SystemExecutor};

/// Error type produced by sources and probes.
pub type SourceError = Box<dyn std::error::Error + Send + Sync>;

/// Produces the payload for a cache entry.
pub trait CacheSource {
    /// Short description for log messages.
    fn describe(&self) -> String;

    /// Produce the payload to be cached.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be produced.
    fn generate(&self) -> Result<String, SourceError>;

    /// Produce the payload without caching it; used when [`generate`]
    /// failed for any reason other than a timeout.  Defaults to a second
    /// `generate` attempt.
    ///
    /// [`generate`]: CacheSource::generate
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be produced.
    fn direct(&self) -> Result<String, SourceError> {
        self.generate()
    }
}

impl<F> CacheSource for F
where
    F: Fn() -> Result<String, SourceError>,
{
    fn describe(&self) -> String {
        "closure".to_string()
    }

    fn generate(&self) -> Result<String, SourceError> {
        self()
    }
}

/// Runs a program and caches its standard output.
#[derive(Debug, Clone)]
pub struct CommandSource {
    program: String,
    args: Vec<String>,
    executor: Arc<dyn Executor>,
}

impl CommandSource {
    /// Run `command` (program followed by arguments) through `executor`.
    ///
    /// Returns `None` for an empty command.
    #[must_use]
    pub fn new(command: &[String], executor: Arc<dyn Executor>) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
            executor,
        })
    }

    /// Run `command` as a real subprocess bounded by `timeout`, as
    /// `principal`.
    #[must_use]
    pub fn system(command: &[String], timeout: Duration, principal: Principal) -> Option<Self> {
        let executor = SystemExecutor::new()
            .with_timeout(timeout)
            .as_principal(principal);
        Self::new(command, Arc::new(executor))
    }
}

impl CacheSource for CommandSource {
    fn describe(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn generate(&self) -> Result<String, SourceError> {
        Ok(self.executor.run(&self.program, &self.args)?.stdout)
    }
}

/// Yields a token identifying the current state of something a cached
/// payload depends on.  A changed token makes the entry stale.
pub trait InvalidationProbe {
    /// Current token.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be observed; the cache then
    /// treats the marker as absent.
    fn current(&self) -> Result<String, SourceError>;
}

impl<F> InvalidationProbe for F
where
    F: Fn() -> Result<String, SourceError>,
{
    fn current(&self) -> Result<String, SourceError> {
        self()
    }
}

/// HEAD commit id of a git repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHeadProbe {
    repo: PathBuf,
}

impl GitHeadProbe {
    /// Probe the repository at `repo`.
    #[must_use]
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self { repo: repo.into() }
    }
}

impl InvalidationProbe for GitHeadProbe {
    fn current(&self) -> Result<String, SourceError> {
        let repo = git2::Repository::open(&self.repo)?;
        let commit = repo.head()?.peel_to_commit()?;
        Ok(commit.id().to_string())
    }
}

/// Modification time of a file, in whole seconds since the epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifiedProbe {
    path: PathBuf,
}

impl ModifiedProbe {
    /// Probe the file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl InvalidationProbe for ModifiedProbe {
    fn current(&self) -> Result<String, SourceError> {
        let modified = std::fs::metadata(&self.path)?.modified()?;
        let secs = modified.duration_since(UNIX_EPOCH)?.as_secs();
        Ok(secs.to_string())
    }
}
