//! Optional progress reporting for long reconciliation batches.
use std::fmt;
use std::io::Write as _;
use std::sync::Mutex;

/// Receives progress notifications while a batch runs.
pub trait Progress: Send + Sync + fmt::Debug {
    /// A batch of `total` rules is starting.
    fn begin(&self, total: usize);
    /// The rule described by `label` is being processed.
    fn step(&self, label: &str);
    /// The batch is complete.
    fn finish(&self);
}

/// Progress sink that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn begin(&self, _total: usize) {}
    fn step(&self, _label: &str) {}
    fn finish(&self) {}
}

#[derive(Debug, Default)]
struct Counter {
    done: usize,
    total: usize,
    drawn: bool,
}

/// Single-line status on stderr, truncated to the terminal width.
///
/// The line never wraps, so clearing it is a carriage return plus an
/// erase-line sequence.
#[derive(Debug, Default)]
pub struct TerminalProgress {
    counter: Mutex<Counter>,
}

impl TerminalProgress {
    /// Create a progress line.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Terminal width in columns, 80 when stderr is not a terminal.
fn terminal_columns() -> usize {
    terminal_size::terminal_size_of(std::io::stderr())
        .map_or(80, |(terminal_size::Width(w), _)| usize::from(w))
}

/// Fit `text` into `width` characters, ending with `…` when cut.
fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut out: String = text.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

impl Progress for TerminalProgress {
    fn begin(&self, total: usize) {
        let mut counter = self
            .counter
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *counter = Counter {
            done: 0,
            total,
            drawn: false,
        };
    }

    fn step(&self, label: &str) {
        let mut counter = self
            .counter
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        counter.done += 1;
        let line = format!("[{}/{}] {label}", counter.done, counter.total);
        let line = truncate(&line, terminal_columns().saturating_sub(4));
        let mut err = std::io::stderr().lock();
        write!(err, "\r\x1b[K  \x1b[2m▹ {line}\x1b[0m").ok();
        err.flush().ok();
        counter.drawn = true;
    }

    fn finish(&self) {
        let mut counter = self
            .counter
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if counter.drawn {
            let mut err = std::io::stderr().lock();
            write!(err, "\r\x1b[K").ok();
            err.flush().ok();
            counter.drawn = false;
        }
    }
}
