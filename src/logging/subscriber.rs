//! `tracing` subscriber: coloured console layer plus the persistent log
//! file.
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::Level;

use super::utils::{previous_log_path, strip_ansi, utc_datetime, utc_time};

/// Event target for stage headers.
pub(super) const STAGE_TARGET: &str = "jsh::stage";

/// Event target for dry-run actions.
pub(super) const DRY_RUN_TARGET: &str = "jsh::dry_run";

/// Console and file settings for [`init_subscriber`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogConfig {
    /// Show debug events on the console.
    pub verbose: bool,
    /// Console shows only warnings and errors, on stderr, prefixed with
    /// `jsh:`.  For commands whose stdout is consumed by a shell.
    pub quiet: bool,
    /// Persistent log file; `None` disables file logging.
    pub file: Option<PathBuf>,
    /// Command name written into the log file header.
    pub command: String,
}

#[derive(Default)]
struct MessageExtractor {
    message: String,
}

impl tracing::field::Visit for MessageExtractor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }
}

fn message_of(event: &tracing::Event<'_>) -> String {
    let mut extractor = MessageExtractor::default();
    event.record(&mut extractor);
    extractor.message
}

/// Appends every event to the log file, timestamped and without ANSI codes.
#[derive(Debug)]
pub(super) struct FileLayer {
    file: Mutex<fs::File>,
}

impl FileLayer {
    /// Start a fresh log at `path`, keeping the previous run's log as
    /// `<path>.1`.  Returns `None` if the file cannot be created.
    pub(super) fn open(path: &Path, command: &str) -> Option<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).ok()?;
        }
        if path.exists() {
            fs::rename(path, previous_log_path(path)).ok();
        }
        let header = format!(
            "# jsh {} {command} started {}\n",
            crate::commands::version::version(),
            utc_datetime(),
        );
        fs::write(path, header).ok()?;
        let file = fs::OpenOptions::new().append(true).open(path).ok()?;
        Some(Self {
            file: Mutex::new(file),
        })
    }
}

/// One log file line for an event.
fn file_line(level: Level, target: &str, msg: &str, ts: &str) -> String {
    let msg = strip_ansi(msg);
    let tag = match (level, target) {
        (Level::INFO, STAGE_TARGET) => return format!("{ts} ==> {msg}"),
        (Level::INFO, DRY_RUN_TARGET) => "dry-run",
        (Level::ERROR, _) => "error",
        (Level::WARN, _) => "warn",
        (Level::DEBUG | Level::TRACE, _) => "debug",
        _ => "info",
    };
    format!("{ts} {tag:<7} {msg}")
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for FileLayer {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let metadata = event.metadata();
        let line = file_line(
            *metadata.level(),
            metadata.target(),
            &message_of(event),
            &utc_time(),
        );
        if let Ok(mut f) = self.file.lock() {
            writeln!(f, "{line}").ok();
        }
    }
}

/// One console line for an event.
fn console_line(level: Level, target: &str, msg: &str, quiet: bool) -> String {
    if quiet {
        let tag = match level {
            Level::ERROR => "error: ",
            Level::WARN => "warning: ",
            _ => "",
        };
        return format!("jsh: {tag}{msg}");
    }
    match (level, target) {
        (Level::ERROR, _) => format!("\x1b[31merror:\x1b[0m {msg}"),
        (Level::WARN, _) => format!("\x1b[33mwarning:\x1b[0m {msg}"),
        (Level::INFO, STAGE_TARGET) => format!("\x1b[1;34m==>\x1b[0m \x1b[1m{msg}\x1b[0m"),
        (Level::INFO, DRY_RUN_TARGET) => format!("  \x1b[33m[dry run]\x1b[0m {msg}"),
        (Level::INFO, _) => format!("  {msg}"),
        _ => format!("  \x1b[2m{msg}\x1b[0m"),
    }
}

struct ConsoleFormat {
    quiet: bool,
}

impl<S, N> tracing_subscriber::fmt::FormatEvent<S, N> for ConsoleFormat
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: tracing_subscriber::fmt::format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let metadata = event.metadata();
        let line = console_line(
            *metadata.level(),
            metadata.target(),
            &message_of(event),
            self.quiet,
        );
        writeln!(writer, "{line}")
    }
}

/// Install the global subscriber.  Call once, before any logging.
///
/// Warnings and errors always go to stderr.  Info goes to stdout except in
/// quiet mode, where the console is limited to warnings (debug with
/// `verbose`) so stdout carries only what the command prints itself.  The
/// log file, when configured, records everything from debug up.
pub fn init_subscriber(config: &LogConfig) {
    use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt as _};
    use tracing_subscriber::{
        Layer as _, filter::LevelFilter, fmt, layer::SubscriberExt as _,
        util::SubscriberInitExt as _,
    };

    let console_level = match (config.verbose, config.quiet) {
        (true, _) => LevelFilter::DEBUG,
        (false, true) => LevelFilter::WARN,
        (false, false) => LevelFilter::INFO,
    };
    let make_writer = if config.quiet {
        BoxMakeWriter::new(std::io::stderr)
    } else {
        BoxMakeWriter::new(
            std::io::stderr
                .with_max_level(Level::WARN)
                .and(std::io::stdout.with_min_level(Level::INFO)),
        )
    };
    let console_layer = fmt::layer()
        .event_format(ConsoleFormat {
            quiet: config.quiet,
        })
        .with_writer(make_writer)
        .with_filter(console_level);

    let file_layer = config
        .file
        .as_deref()
        .and_then(|path| FileLayer::open(path, &config.command))
        .map(|layer| layer.with_filter(LevelFilter::DEBUG));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn quiet_console_lines_are_prefixed_and_plain() {
        insta::assert_snapshot!(
            console_line(Level::WARN, "jsh_cli", "skipping brew_shellenv: timed out", true),
            @"jsh: warning: skipping brew_shellenv: timed out"
        );
        assert_eq!(
            console_line(Level::DEBUG, "jsh_cli", "cache hit: env", true),
            "jsh: cache hit: env"
        );
    }

    #[test]
    fn console_marks_stages_and_dry_runs() {
        let stage = console_line(Level::INFO, STAGE_TARGET, "Linking", false);
        assert_eq!(strip_ansi(&stage), "==> Linking");
        let dry = console_line(Level::INFO, DRY_RUN_TARGET, "would link a", false);
        assert_eq!(strip_ansi(&dry), "  [dry run] would link a");
        let warn = console_line(Level::WARN, "jsh_cli", "source missing", false);
        assert_eq!(strip_ansi(&warn), "warning: source missing");
    }

    #[test]
    fn file_lines_are_tagged_and_stripped() {
        insta::assert_snapshot!(
            [
                file_line(Level::INFO, STAGE_TARGET, "Linking", "12:00:00"),
                file_line(Level::INFO, "jsh_cli", "\x1b[32mlinked\x1b[0m", "12:00:01"),
                file_line(Level::WARN, "jsh_cli", "conflict", "12:00:02"),
                file_line(Level::DEBUG, "jsh_cli", "detail", "12:00:03"),
                file_line(Level::INFO, DRY_RUN_TARGET, "would link", "12:00:04"),
            ]
            .join("\n"),
            @r"
        12:00:00 ==> Linking
        12:00:01 info    linked
        12:00:02 warn    conflict
        12:00:03 debug   detail
        12:00:04 dry-run would link
        "
        );
    }

    #[test]
    fn opening_rotates_previous_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jsh").join("link.log");
        drop(FileLayer::open(&path, "link").unwrap());
        fs::write(&path, "old run\n").unwrap();

        drop(FileLayer::open(&path, "link").unwrap());

        assert_eq!(
            fs::read_to_string(previous_log_path(&path)).unwrap(),
            "old run\n"
        );
        let current = fs::read_to_string(&path).unwrap();
        assert!(current.starts_with("# jsh "), "{current}");
        assert!(current.contains(" link started "), "{current}");
    }
}
