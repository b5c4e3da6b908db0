//! Core logging types: the [`Log`] trait and message levels.

/// Severity/kind of a logged message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Stage header (major section).
    Stage,
    /// Informational message.
    Info,
    /// Debug detail.
    Debug,
    /// Warning about a skipped or degraded entry.
    Warn,
    /// Error.
    Error,
    /// Action that would have been taken outside dry-run mode.
    DryRun,
}

/// Abstraction over logging backends.
///
/// [`Logger`](super::logger::Logger) emits through `tracing`;
/// [`MemoryLog`](super::memory::MemoryLog) collects messages so callers
/// can inspect or replay them.  Reconciler and cache code log through this
/// trait without knowing which backend is in use.
pub trait Log: Send + Sync {
    /// Log a stage header (major section).
    fn stage(&self, msg: &str);
    /// Log an informational message.
    fn info(&self, msg: &str);
    /// Log a debug message (may be suppressed on console).
    fn debug(&self, msg: &str);
    /// Log a warning message.
    fn warn(&self, msg: &str);
    /// Log an error message.
    fn error(&self, msg: &str);
    /// Log a dry-run action message.
    fn dry_run(&self, msg: &str);

    /// Log `msg` at `level`.
    fn log(&self, level: LogLevel, msg: &str) {
        match level {
            LogLevel::Stage => self.stage(msg),
            LogLevel::Info => self.info(msg),
            LogLevel::Debug => self.debug(msg),
            LogLevel::Warn => self.warn(msg),
            LogLevel::Error => self.error(msg),
            LogLevel::DryRun => self.dry_run(msg),
        }
    }
}

/// A [`Log`] that discards everything.  The default sink for library
/// types until a real logger is injected.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLog;

impl Log for NullLog {
    fn stage(&self, _msg: &str) {}
    fn info(&self, _msg: &str) {}
    fn debug(&self, _msg: &str) {}
    fn warn(&self, _msg: &str) {}
    fn error(&self, _msg: &str) {}
    fn dry_run(&self, _msg: &str) {}
}
