//! Domain-specific error types for jsh.
//!
//! Internal modules return typed errors (e.g. [`CacheError`],
//! [`ExecError`]) while command handlers at the CLI boundary convert them to
//! [`anyhow::Error`] via the standard `?` operator.
//!
//! # Error hierarchy
//!
//! ```text
//! JshError
//! ├── Environment(EnvironmentError) — fatal: root/home cannot be determined
//! ├── Rule(RuleSyntaxError)         — one invalid DSL line (recoverable)
//! ├── Reconcile(ReconcileError)     — one symlink pair (recoverable)
//! ├── Cache(CacheError)             — cache entry access (recoverable)
//! └── Exec(ExecError)               — subprocess failures
//! ```
//!
//! Only [`EnvironmentError`] aborts a run.  Everything else is caught at the
//! rule or cache-entry boundary, logged, and turned into a skip.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type.
#[derive(Error, Debug)]
pub enum JshError {
    /// The environment is not usable (fatal).
    #[error(transparent)]
    Environment(#[from] EnvironmentError),

    /// A rule line failed to parse.
    #[error("invalid rule: {0}")]
    Rule(#[from] RuleSyntaxError),

    /// A symlink pair could not be reconciled.
    #[error("reconcile error: {0}")]
    Reconcile(#[from] ReconcileError),

    /// A cache entry could not be produced.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// A subprocess failed.
    #[error("exec error: {0}")]
    Exec(#[from] ExecError),
}

/// Fatal preconditions: the run cannot proceed without these.
#[derive(Error, Debug)]
pub enum EnvironmentError {
    /// No root directory was given and none could be detected.
    #[error("cannot determine jsh root. Use --root or set JSH_ROOT")]
    RootNotFound,

    /// The configured root directory does not exist.
    #[error("jsh root does not exist: {}", .0.display())]
    RootMissing(PathBuf),

    /// `$HOME` is not set.
    #[error("HOME environment variable is not set")]
    HomeUnset,

    /// The rules file exists but cannot be read.
    #[error("cannot read rules file {}: {source}", path.display())]
    RulesUnreadable {
        /// Path of the rules file.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
}

/// A rule DSL line that does not parse.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line}: {kind}")]
pub struct RuleSyntaxError {
    /// 1-based line number.
    pub line: usize,
    /// What was wrong with the line.
    pub kind: RuleSyntaxErrorKind,
}

/// The individual ways a rule line can be malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleSyntaxErrorKind {
    /// The first token is not `file`, `dir` or `children`.
    UnknownType(String),
    /// No source path follows the type.
    MissingSource,
    /// `@tag` names an unsupported platform.
    UnknownPlatform(String),
    /// `->` is present but nothing follows it.
    EmptyDestination,
    /// More than one `->` on a line.
    MultipleArrows,
    /// `@tag` appears somewhere other than the end of the line.
    MisplacedPlatform(String),
    /// The source is absolute or climbs out of the tool root with `..`.
    SourceOutsideRoot(String),
}

impl fmt::Display for RuleSyntaxErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownType(t) => {
                write!(f, "unknown rule type '{t}' (expected file, dir or children)")
            }
            Self::MissingSource => write!(f, "missing source path"),
            Self::UnknownPlatform(p) => {
                write!(f, "unknown platform '@{p}' (expected all, macos or linux)")
            }
            Self::EmptyDestination => write!(f, "empty destination after '->'"),
            Self::MultipleArrows => write!(f, "more than one '->'"),
            Self::MisplacedPlatform(p) => {
                write!(f, "platform tag '@{p}' must be the last token")
            }
            Self::SourceOutsideRoot(src) => {
                write!(f, "source '{src}' must be a path inside the jsh root")
            }
        }
    }
}

/// Failures reconciling a single `(source, destination)` pair.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// The rule's source does not exist under the tool root.
    #[error("source does not exist: {}", .0.display())]
    SourceMissing(PathBuf),

    /// The destination exists and is not the expected symlink.
    #[error("{} exists and is {kind}", path.display())]
    DestinationConflict {
        /// Destination path.
        path: PathBuf,
        /// Human-readable kind of the existing entry.
        kind: String,
    },

    /// The existing destination could not be moved aside.
    #[error("cannot move {} to {}: {source}", path.display(), backup.display())]
    BackupMoveFailed {
        /// Destination path.
        path: PathBuf,
        /// Intended backup path.
        backup: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The existing destination could not be removed.
    #[error("cannot remove {}: {source}", path.display())]
    RemoveFailed {
        /// Destination path.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The symlink could not be created.
    #[error("cannot create link {}: {source}", path.display())]
    LinkFailed {
        /// Destination path.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
}

/// Failures producing a cache entry.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The key contains characters that are not allowed in a file name.
    #[error("invalid cache key '{0}': use letters, digits, '.', '_' or '-'")]
    InvalidKey(String),

    /// Both the cached regeneration and the direct invocation failed.
    #[error("cannot produce '{key}': {source}")]
    GeneratorFailure {
        /// Cache key.
        key: String,
        /// Error from the direct invocation.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Reading or writing a cache file failed.
    #[error("cache I/O on {}: {source}", path.display())]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
}

/// Subprocess failures.
#[derive(Error, Debug)]
pub enum ExecError {
    /// The program could not be started.
    #[error("failed to execute {program}: {source}")]
    Spawn {
        /// Program name.
        program: String,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The program ran longer than its allowed time and was killed.
    #[error("{program} timed out after {timeout_secs}s")]
    TimedOut {
        /// Program name.
        program: String,
        /// Timeout that was exceeded.
        timeout_secs: u64,
    },

    /// The program exited with a non-zero status.
    #[error("{program} failed (exit {code}): {stderr}")]
    Failed {
        /// Program name.
        program: String,
        /// Exit code, `-1` if terminated by a signal.
        code: i32,
        /// Captured standard error, trimmed.
        stderr: String,
    },
}
