//! Settings file (`jsh.toml`) model and loader.
//!
//! ```toml
//! rules = "links.rules"
//!
//! [link]
//! on_conflict = "backup"
//! backup_dir = "~/.local/share/jsh/backups"
//!
//! [cache]
//! ttl = 86400
//! timeout = 10
//!
//! [[cache.entries]]
//! key = "rustup_completions"
//! kind = "completion"
//! command = ["rustup", "completions", "zsh"]
//! invalidate = { modified = "~/.cargo/bin/rustup" }
//! ```
pub mod toml_loader;
pub mod validation;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub use toml_loader::load_config;
pub use validation::ValidationWarning;

use crate::reconcile::Decision;

/// Settings file name, relative to the tool root.
pub const SETTINGS_FILE: &str = "jsh.toml";

/// Default rules file name, relative to the tool root.
pub const DEFAULT_RULES_FILE: &str = "links.rules";

/// Default cache TTL in seconds (one day).
pub const DEFAULT_CACHE_TTL_SECS: u64 = 86_400;

/// Default subprocess timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Top-level settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Rules file, relative to the tool root unless absolute.
    pub rules: String,
    /// Link reconciliation settings.
    pub link: LinkSettings,
    /// Command cache settings.
    pub cache: CacheSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rules: DEFAULT_RULES_FILE.to_string(),
            link: LinkSettings::default(),
            cache: CacheSettings::default(),
        }
    }
}

impl Settings {
    /// Load `<root>/jsh.toml`, or defaults when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(root: &Path) -> Result<Self> {
        load_config(&root.join(SETTINGS_FILE))
    }

    /// Absolute path of the rules file.
    #[must_use]
    pub fn rules_path(&self, root: &Path) -> PathBuf {
        root.join(&self.rules)
    }
}

/// What `link` does with a real file or directory in the way.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ConflictMode {
    /// Move it aside.
    #[default]
    Backup,
    /// Leave it.
    Skip,
    /// Delete it.
    Overwrite,
    /// Ask on the terminal.
    Prompt,
}

impl ConflictMode {
    /// The fixed decision for non-interactive modes, `None` for `Prompt`.
    #[must_use]
    pub const fn decision(self) -> Option<Decision> {
        match self {
            Self::Backup => Some(Decision::Backup),
            Self::Skip => Some(Decision::Skip),
            Self::Overwrite => Some(Decision::Overwrite),
            Self::Prompt => None,
        }
    }
}

/// `[link]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinkSettings {
    /// Conflict handling.
    pub on_conflict: ConflictMode,
    /// Backup directory; backups go next to the original when unset.
    pub backup_dir: Option<String>,
}

/// `[cache]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSettings {
    /// Default TTL in seconds.
    pub ttl: u64,
    /// Subprocess timeout in seconds.
    pub timeout: u64,
    /// Cache root; `$XDG_CACHE_HOME/jsh` when unset.
    pub dir: Option<String>,
    /// Declared cache entries.
    pub entries: Vec<CacheEntrySettings>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_CACHE_TTL_SECS,
            timeout: DEFAULT_TIMEOUT_SECS,
            dir: None,
            entries: Vec::new(),
        }
    }
}

impl CacheSettings {
    /// Default TTL as a duration.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl)
    }

    /// Subprocess timeout as a duration.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

/// What a cached snippet is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SnippetKind {
    /// Environment setup (`brew shellenv`).
    Environment,
    /// Completion definitions.
    Completion,
}

impl fmt::Display for SnippetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Environment => f.write_str("environment"),
            Self::Completion => f.write_str("completion"),
        }
    }
}

/// One `[[cache.entries]]` item.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheEntrySettings {
    /// Cache key (file name).
    pub key: String,
    /// Snippet kind.
    pub kind: SnippetKind,
    /// Program and arguments.
    pub command: Vec<String>,
    /// Optional invalidation probe.
    #[serde(default)]
    pub invalidate: Option<ProbeSettings>,
    /// Run the command as this user when jsh itself runs as root.
    #[serde(default)]
    pub run_as: Option<String>,
    /// TTL override in seconds.
    #[serde(default)]
    pub ttl: Option<u64>,
}

/// Invalidation probe declaration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeSettings {
    /// HEAD commit of the git repository at this path.
    GitHead(String),
    /// Modification time of this file.
    Modified(String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(dir.path()).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.rules, "links.rules");
        assert_eq!(settings.cache.ttl, 86_400);
        assert_eq!(settings.cache.timeout, 10);
        assert_eq!(settings.link.on_conflict, ConflictMode::Backup);
    }

    #[test]
    fn full_settings_file() {
        let text = r#"
rules = "conf/links.rules"

[link]
on_conflict = "prompt"
backup_dir = "~/.local/share/jsh/backups"

[cache]
ttl = 3600
timeout = 5
dir = "/custom/cache"

[[cache.entries]]
key = "rustup_completions"
kind = "completion"
command = ["rustup", "completions", "zsh"]
invalidate = { modified = "/home/u/.cargo/bin/rustup" }

[[cache.entries]]
key = "tool_env"
kind = "environment"
command = ["tool", "env"]
invalidate = { git_head = "/opt/tool" }
run_as = "linuxbrew"
ttl = 60
"#;
        let settings: Settings = toml::from_str(text).unwrap();
        assert_eq!(settings.rules, "conf/links.rules");
        assert_eq!(settings.link.on_conflict, ConflictMode::Prompt);
        assert_eq!(settings.cache.ttl(), Duration::from_secs(3600));
        assert_eq!(settings.cache.entries.len(), 2);
        let first = &settings.cache.entries[0];
        assert_eq!(first.kind, SnippetKind::Completion);
        assert_eq!(
            first.invalidate,
            Some(ProbeSettings::Modified("/home/u/.cargo/bin/rustup".into()))
        );
        let second = &settings.cache.entries[1];
        assert_eq!(second.run_as.as_deref(), Some("linuxbrew"));
        assert_eq!(second.ttl, Some(60));
        assert_eq!(
            second.invalidate,
            Some(ProbeSettings::GitHead("/opt/tool".into()))
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<Settings>("[link]\nconflict = \"skip\"\n").is_err());
        assert!(toml::from_str::<Settings>("extra = 1\n").is_err());
    }

    #[test]
    fn unknown_conflict_mode_is_rejected() {
        assert!(toml::from_str::<Settings>("[link]\non_conflict = \"delete\"\n").is_err());
    }

    #[test]
    fn conflict_mode_decisions() {
        assert_eq!(ConflictMode::Skip.decision(), Some(Decision::Skip));
        assert_eq!(ConflictMode::Prompt.decision(), None);
    }

    #[test]
    fn rules_path_is_relative_to_root() {
        let settings = Settings::default();
        assert_eq!(
            settings.rules_path(Path::new("/opt/jsh")),
            PathBuf::from("/opt/jsh/links.rules")
        );
    }
}
