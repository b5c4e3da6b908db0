//! Logging: the [`Log`] seam, its `tracing` backend and in-memory
//! collector, and the console/file subscriber.

mod logger;
mod memory;
mod subscriber;
mod types;
mod utils;

pub use logger::Logger;
pub use memory::MemoryLog;
pub use subscriber::{LogConfig, init_subscriber};
pub use types::{Log, LogLevel, NullLog};
pub use utils::log_file_path;

/// A [`Logger`] writing to a temporary log file through a thread-local
/// subscriber.  Keep the guard alive for the duration of the test.
#[cfg(test)]
#[allow(clippy::expect_used)]
pub(crate) fn isolated_logger() -> (Logger, tempfile::TempDir, tracing::dispatcher::DefaultGuard) {
    use tracing_subscriber::{Layer as _, filter::LevelFilter, layer::SubscriberExt as _};

    let tmp = tempfile::tempdir().expect("create temp dir");
    let path = tmp.path().join("test.log");
    let file_layer = subscriber::FileLayer::open(&path, "test").expect("open log file");
    let subscriber =
        tracing_subscriber::registry().with(file_layer.with_filter(LevelFilter::DEBUG));
    let guard = tracing::dispatcher::set_default(&tracing::Dispatch::new(subscriber));
    (Logger::new(Some(path)), tmp, guard)
}
