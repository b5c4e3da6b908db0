//! The cache catalog: settings-declared entries plus built-in presets.
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::source::{CommandSource, GitHeadProbe, InvalidationProbe, ModifiedProbe};
use super::{CacheManager, validate_key};
use crate::config::{CacheSettings, ProbeSettings, SnippetKind};
use crate::env::Environment;
use crate::error::CacheError;
use crate::exec::Principal;
use crate::platform::Os;

/// Key of the built-in Homebrew environment entry.
pub const BREW_SHELLENV_KEY: &str = "brew_shellenv";

/// User owning a shared Linuxbrew installation.
const LINUXBREW_USER: &str = "linuxbrew";

/// Shared Linuxbrew prefix.
const LINUXBREW_PREFIX: &str = "/home/linuxbrew/.linuxbrew";

/// How an entry detects that its payload is outdated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeSpec {
    /// HEAD commit of a git repository.
    GitHead(PathBuf),
    /// Modification time of a file.
    Modified(PathBuf),
}

impl ProbeSpec {
    /// Build the probe.
    #[must_use]
    pub fn probe(&self) -> Box<dyn InvalidationProbe> {
        match self {
            Self::GitHead(repo) => Box::new(GitHeadProbe::new(repo)),
            Self::Modified(path) => Box::new(ModifiedProbe::new(path)),
        }
    }
}

/// One cacheable command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Cache key.
    pub key: String,
    /// What the snippet is used for.
    pub kind: SnippetKind,
    /// Program followed by its arguments.
    pub command: Vec<String>,
    /// Invalidation probe.
    pub probe: Option<ProbeSpec>,
    /// User to run as when jsh runs as root.
    pub run_as: Option<String>,
    /// TTL override.
    pub ttl: Option<Duration>,
}

impl CacheEntry {
    /// Return the payload for this entry, regenerating it when stale.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the key is invalid, the command is empty,
    /// or the command fails both through the cache and directly.
    pub fn fetch(
        &self,
        cache: &CacheManager,
        settings: &CacheSettings,
        running_as_root: bool,
    ) -> Result<String, CacheError> {
        let principal = Principal::for_run_as(self.run_as.as_deref(), running_as_root);
        let source = CommandSource::system(&self.command, settings.timeout(), principal)
            .ok_or_else(|| CacheError::GeneratorFailure {
                key: self.key.clone(),
                source: "command is empty".into(),
            })?;
        let probe = self.probe.as_ref().map(ProbeSpec::probe);
        cache.get_or_regenerate(
            &self.key,
            self.ttl(settings),
            probe.as_deref(),
            &source,
        )
    }

    /// Effective TTL under `settings`.
    #[must_use]
    pub fn ttl(&self, settings: &CacheSettings) -> Duration {
        self.ttl.unwrap_or_else(|| settings.ttl())
    }
}

/// Locate a Homebrew installation for `env`'s platform.
///
/// `exists` decides whether a path is present, so detection can be tested
/// without touching the real filesystem.
#[must_use]
pub fn detect_brew(env: &Environment, exists: impl Fn(&Path) -> bool) -> Option<CacheEntry> {
    let candidates = match env.os {
        Os::MacOs => vec![PathBuf::from("/opt/homebrew"), PathBuf::from("/usr/local")],
        Os::Linux => vec![PathBuf::from(LINUXBREW_PREFIX), env.home.join(".linuxbrew")],
    };
    let prefix = candidates
        .into_iter()
        .find(|prefix| exists(&prefix.join("bin").join("brew")))?;

    // Homebrew's own checkout lives in `<prefix>/Homebrew` on Intel macOS
    // and in the prefix itself elsewhere.
    let nested = prefix.join("Homebrew");
    let repo = if exists(&nested.join(".git")) {
        nested
    } else {
        prefix.clone()
    };

    Some(CacheEntry {
        key: BREW_SHELLENV_KEY.to_string(),
        kind: SnippetKind::Environment,
        command: vec![
            prefix.join("bin").join("brew").to_string_lossy().into_owned(),
            "shellenv".to_string(),
        ],
        probe: Some(ProbeSpec::GitHead(repo)),
        run_as: (prefix == Path::new(LINUXBREW_PREFIX)).then(|| LINUXBREW_USER.to_string()),
        ttl: None,
    })
}

/// Every entry jsh knows about: the Homebrew preset (if installed) followed
/// by the entries declared in settings.
///
/// Entries with an invalid key or an empty command are dropped, and only
/// the first entry for a key is kept.  `Settings::validate` reports both.
#[must_use]
pub fn catalog(
    settings: &CacheSettings,
    env: &Environment,
    exists: impl Fn(&Path) -> bool,
) -> Vec<CacheEntry> {
    let declared = settings.entries.iter().map(|entry| CacheEntry {
        key: entry.key.clone(),
        kind: entry.kind,
        command: entry.command.clone(),
        probe: entry.invalidate.as_ref().map(|probe| match probe {
            ProbeSettings::GitHead(path) => ProbeSpec::GitHead(PathBuf::from(env.expand(path))),
            ProbeSettings::Modified(path) => ProbeSpec::Modified(PathBuf::from(env.expand(path))),
        }),
        run_as: entry.run_as.clone(),
        ttl: entry.ttl.map(Duration::from_secs),
    });

    let mut entries = Vec::<CacheEntry>::new();
    for entry in detect_brew(env, exists).into_iter().chain(declared) {
        if validate_key(&entry.key).is_err()
            || entry.command.is_empty()
            || entries.iter().any(|e| e.key == entry.key)
        {
            continue;
        }
        entries.push(entry);
    }
    entries
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::config::CacheEntrySettings;

    fn present(paths: &[&str]) -> impl Fn(&Path) -> bool {
        let set: HashSet<PathBuf> = paths.iter().map(PathBuf::from).collect();
        move |p: &Path| set.contains(p)
    }

    fn declared(key: &str, command: &[&str]) -> CacheEntrySettings {
        CacheEntrySettings {
            key: key.to_string(),
            kind: SnippetKind::Completion,
            command: command.iter().map(ToString::to_string).collect(),
            invalidate: None,
            run_as: None,
            ttl: None,
        }
    }

    #[test]
    fn apple_silicon_brew() {
        let env = Environment::new("/Users/u", Os::MacOs);
        let entry = detect_brew(&env, present(&["/opt/homebrew/bin/brew"])).unwrap();
        assert_eq!(entry.key, "brew_shellenv");
        assert_eq!(entry.kind, SnippetKind::Environment);
        assert_eq!(entry.command, ["/opt/homebrew/bin/brew", "shellenv"]);
        assert_eq!(
            entry.probe,
            Some(ProbeSpec::GitHead(PathBuf::from("/opt/homebrew")))
        );
        assert_eq!(entry.run_as, None);
    }

    #[test]
    fn intel_brew_probes_nested_repository() {
        let env = Environment::new("/Users/u", Os::MacOs);
        let entry = detect_brew(
            &env,
            present(&["/usr/local/bin/brew", "/usr/local/Homebrew/.git"]),
        )
        .unwrap();
        assert_eq!(
            entry.probe,
            Some(ProbeSpec::GitHead(PathBuf::from("/usr/local/Homebrew")))
        );
    }

    #[test]
    fn shared_linuxbrew_runs_as_linuxbrew() {
        let env = Environment::new("/home/u", Os::Linux);
        let entry = detect_brew(&env, present(&["/home/linuxbrew/.linuxbrew/bin/brew"])).unwrap();
        assert_eq!(entry.run_as.as_deref(), Some("linuxbrew"));
    }

    #[test]
    fn personal_linuxbrew() {
        let env = Environment::new("/home/u", Os::Linux);
        let entry = detect_brew(&env, present(&["/home/u/.linuxbrew/bin/brew"])).unwrap();
        assert_eq!(entry.command[0], "/home/u/.linuxbrew/bin/brew");
        assert_eq!(entry.run_as, None);
    }

    #[test]
    fn macos_prefixes_ignored_on_linux() {
        let env = Environment::new("/home/u", Os::Linux);
        assert!(detect_brew(&env, present(&["/opt/homebrew/bin/brew"])).is_none());
    }

    #[test]
    fn catalog_keeps_valid_first_entries() {
        let env = Environment::new("/home/u", Os::Linux);
        let settings = CacheSettings {
            entries: vec![
                declared("rustup", &["rustup", "completions", "zsh"]),
                declared("bad/key", &["x"]),
                declared("empty", &[]),
                declared("rustup", &["other"]),
                declared("brew_shellenv", &["fake"]),
            ],
            ..CacheSettings::default()
        };
        let entries = catalog(&settings, &env, present(&["/home/u/.linuxbrew/bin/brew"]));
        let keys: Vec<&str> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, ["brew_shellenv", "rustup"]);
        assert_eq!(entries[1].command, ["rustup", "completions", "zsh"]);
        assert_eq!(entries[0].command[0], "/home/u/.linuxbrew/bin/brew");
    }

    #[test]
    fn catalog_expands_probe_paths() {
        let env = Environment::new("/home/u", Os::Linux);
        let mut entry = declared("rustup", &["rustup", "completions", "zsh"]);
        entry.invalidate = Some(ProbeSettings::Modified("$HOME/.cargo/bin/rustup".into()));
        entry.ttl = Some(60);
        let settings = CacheSettings {
            entries: vec![entry],
            ..CacheSettings::default()
        };
        let entries = catalog(&settings, &env, |_| false);
        assert_eq!(
            entries[0].probe,
            Some(ProbeSpec::Modified(PathBuf::from("/home/u/.cargo/bin/rustup")))
        );
        assert_eq!(entries[0].ttl(&settings), Duration::from_secs(60));
    }

    #[test]
    fn ttl_defaults_to_settings() {
        let entry = CacheEntry {
            key: "k".into(),
            kind: SnippetKind::Completion,
            command: vec!["true".into()],
            probe: None,
            run_as: None,
            ttl: None,
        };
        assert_eq!(
            entry.ttl(&CacheSettings::default()),
            Duration::from_secs(86_400)
        );
    }

    #[cfg(unix)]
    #[test]
    fn fetch_runs_command_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheManager::new(dir.path(), "commands").unwrap();
        let entry = CacheEntry {
            key: "hello".into(),
            kind: SnippetKind::Environment,
            command: vec!["echo".into(), "export HELLO=1".into()],
            probe: None,
            run_as: None,
            ttl: None,
        };
        let out = entry
            .fetch(&cache, &CacheSettings::default(), false)
            .unwrap();
        assert_eq!(out, "export HELLO=1\n");
        assert_eq!(
            std::fs::read_to_string(cache.payload_path("hello")).unwrap(),
            "export HELLO=1\n"
        );
    }
}
