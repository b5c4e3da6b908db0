//! Semantic checks on loaded settings that serde cannot express.
use std::collections::HashSet;

use super::{SETTINGS_FILE, Settings};
use crate::cache::validate_key;

/// A validation warning detected while loading settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    /// The configuration source (e.g., `jsh.toml`).
    pub source: String,
    /// The specific item that triggered the warning.
    pub item: String,
    /// Human-readable warning message.
    pub message: String,
}

impl ValidationWarning {
    /// Create a warning.
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        item: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            item: item.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}: {}", self.source, self.item, self.message)
    }
}

impl Settings {
    /// Check cache entries for problems.  Entries that fail a check are
    /// ignored by the cache catalog; the warnings say why.
    #[must_use]
    pub fn validate(&self) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();
        let mut seen = HashSet::new();
        for entry in &self.cache.entries {
            let item = format!("cache entry '{}'", entry.key);
            if let Err(e) = validate_key(&entry.key) {
                warnings.push(ValidationWarning::new(SETTINGS_FILE, &item, e.to_string()));
            }
            if entry.command.is_empty() {
                warnings.push(ValidationWarning::new(SETTINGS_FILE, &item, "command is empty"));
            }
            if !seen.insert(entry.key.as_str()) {
                warnings.push(ValidationWarning::new(
                    SETTINGS_FILE,
                    &item,
                    "duplicate key; only the first entry is used",
                ));
            }
        }
        warnings
    }
}
