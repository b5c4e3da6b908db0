//! In-memory [`Log`] backend.
use std::sync::Mutex;

use super::types::{Log, LogLevel};

/// Collects log messages in memory instead of emitting them.
///
/// Used by tests and by quiet callers (the shell start-up link check) that
/// decide afterwards what, if anything, to show.
#[derive(Debug, Default)]
pub struct MemoryLog {
    entries: Mutex<Vec<(LogLevel, String)>>,
}

impl MemoryLog {
    /// Create an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, level: LogLevel, msg: &str) {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((level, msg.to_string()));
    }

    /// Snapshot of every collected message in order.
    #[must_use]
    pub fn entries(&self) -> Vec<(LogLevel, String)> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Messages collected at `level`.
    #[must_use]
    pub fn messages(&self, level: LogLevel) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, msg)| msg)
            .collect()
    }

    /// Forward every collected message to `target`, in order.
    pub fn replay(&self, target: &dyn Log) {
        for (level, msg) in self.entries() {
            target.log(level, &msg);
        }
    }
}

impl Log for MemoryLog {
    fn stage(&self, msg: &str) {
        self.push(LogLevel::Stage, msg);
    }
    fn info(&self, msg: &str) {
        self.push(LogLevel::Info, msg);
    }
    fn debug(&self, msg: &str) {
        self.push(LogLevel::Debug, msg);
    }
    fn warn(&self, msg: &str) {
        self.push(LogLevel::Warn, msg);
    }
    fn error(&self, msg: &str) {
        self.push(LogLevel::Error, msg);
    }
    fn dry_run(&self, msg: &str) {
        self.push(LogLevel::DryRun, msg);
    }
}
