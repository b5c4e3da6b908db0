//! Structured logger with dry-run awareness and run summary.
use std::path::PathBuf;

use super::subscriber::{DRY_RUN_TARGET, STAGE_TARGET};
use super::types::Log;
use crate::reconcile::Summary;

/// Implement the methods of [`Log`] by delegating to inherent methods of
/// the same name on the implementing type.
macro_rules! forward_log_methods {
    ($($method:ident),+ $(,)?) => {
        $(
            fn $method(&self, msg: &str) {
                self.$method(msg);
            }
        )+
    };
}

/// [`Log`] backend emitting `tracing` events for the subscriber installed
/// by [`init_subscriber`](super::init_subscriber).
///
/// `log_file` is only remembered for the run summary; the file itself is
/// written by the subscriber.
#[derive(Debug, Default)]
pub struct Logger {
    log_file: Option<PathBuf>,
}

impl Logger {
    /// Create a logger whose summary points at `log_file`.
    #[must_use]
    pub const fn new(log_file: Option<PathBuf>) -> Self {
        Self { log_file }
    }

    /// Return the log file path, if available.
    #[must_use]
    pub const fn log_path(&self) -> Option<&PathBuf> {
        self.log_file.as_ref()
    }

    /// Log an error message.
    pub fn error(&self, msg: &str) {
        tracing::error!("{msg}");
    }

    /// Log a warning message.
    pub fn warn(&self, msg: &str) {
        tracing::warn!("{msg}");
    }

    /// Log a stage header (major section).
    pub fn stage(&self, msg: &str) {
        tracing::info!(target: STAGE_TARGET, "{msg}");
    }

    /// Log an informational message.
    pub fn info(&self, msg: &str) {
        tracing::info!("{msg}");
    }

    /// Log a debug message (suppressed on console unless verbose; always
    /// written to the log file).
    pub fn debug(&self, msg: &str) {
        tracing::debug!("{msg}");
    }

    /// Log a dry-run action message.
    pub fn dry_run(&self, msg: &str) {
        tracing::info!(target: DRY_RUN_TARGET, "{msg}");
    }

    /// Print the end-of-run summary.
    pub fn print_summary(&self, summary: &Summary) {
        self.stage("Summary");
        let color = if summary.has_problems() {
            "\x1b[33m"
        } else {
            "\x1b[32m"
        };
        self.info(&format!("{color}{summary}\x1b[0m"));
        if let Some(path) = &self.log_file {
            self.info(&format!("\x1b[2mlog: {}\x1b[0m", path.display()));
        }
    }
}

impl Log for Logger {
    forward_log_methods!(stage, info, debug, warn, error, dry_run);
}
