//! Log file placement, ANSI stripping and timestamps.
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::env::Environment;

/// Log file for `command`: `<xdg cache>/jsh/<command>.log`.
#[must_use]
pub fn log_file_path(env: &Environment, command: &str) -> PathBuf {
    env.xdg_cache().join("jsh").join(format!("{command}.log"))
}

/// Where the previous run's log is kept: `<command>.log.1`.
pub(super) fn previous_log_path(path: &Path) -> PathBuf {
    let mut raw = OsString::from(path.as_os_str());
    raw.push(".1");
    PathBuf::from(raw)
}

/// Remove CSI escape sequences (colours, cursor movement, erase) and bare
/// two-byte escapes.
pub(super) fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\x1b' {
            out.push(c);
            continue;
        }
        if chars.next() == Some('[') {
            for inner in chars.by_ref() {
                if ('@'..='~').contains(&inner) {
                    break;
                }
            }
        }
    }
    out
}

/// `YYYY-MM-DD HH:MM:SS` in UTC.
pub(super) fn utc_datetime() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// `HH:MM:SS` in UTC.
pub(super) fn utc_time() -> String {
    chrono::Utc::now().format("%H:%M:%S").to_string()
}
