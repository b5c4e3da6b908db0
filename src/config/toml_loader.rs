//! TOML settings file loading.
use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

/// Load the TOML file at `path` into `T`.
///
/// A missing file is treated as empty, so `T` must be deserializable from
/// an empty table (`#[serde(default)]`).
///
/// # Errors
///
/// Returns an error naming `path` if it exists but cannot be read, is not
/// valid TOML, or contains keys `T` rejects.
pub fn load_config<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
        Err(e) => {
            return Err(e).with_context(|| format!("cannot read {}", path.display()));
        }
    };
    toml::from_str(&content).with_context(|| format!("invalid settings in {}", path.display()))
}
