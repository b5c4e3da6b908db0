//! User environment: home directory, XDG locations and destination variable
//! expansion.
use std::path::{Path, PathBuf};

use crate::error::EnvironmentError;
use crate::platform::Os;

/// Paths derived from the user's environment.
///
/// Captured once by the composition root and passed down, so nothing below
/// the command layer reads process environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    /// `$HOME`.
    pub home: PathBuf,
    /// `$XDG_CONFIG_HOME`, if set and non-empty.
    pub xdg_config_home: Option<PathBuf>,
    /// `$XDG_CACHE_HOME`, if set and non-empty.
    pub xdg_cache_home: Option<PathBuf>,
    /// Operating system family (affects the VS Code user directory).
    pub os: Os,
}

impl Environment {
    /// Create an environment with only a home directory.
    #[must_use]
    pub fn new(home: impl Into<PathBuf>, os: Os) -> Self {
        Self {
            home: home.into(),
            xdg_config_home: None,
            xdg_cache_home: None,
            os,
        }
    }

    /// Read the environment of the current process.
    ///
    /// # Errors
    ///
    /// Returns [`EnvironmentError::HomeUnset`] if `$HOME` is unset or empty.
    pub fn from_process(os: Os) -> Result<Self, EnvironmentError> {
        let home = non_empty_var("HOME").ok_or(EnvironmentError::HomeUnset)?;
        Ok(Self {
            home,
            xdg_config_home: non_empty_var("XDG_CONFIG_HOME"),
            xdg_cache_home: non_empty_var("XDG_CACHE_HOME"),
            os,
        })
    }

    /// Set `$XDG_CONFIG_HOME`.
    #[must_use]
    pub fn with_xdg_config_home(mut self, dir: impl Into<PathBuf>) -> Self {
        self.xdg_config_home = Some(dir.into());
        self
    }

    /// Set `$XDG_CACHE_HOME`.
    #[must_use]
    pub fn with_xdg_cache_home(mut self, dir: impl Into<PathBuf>) -> Self {
        self.xdg_cache_home = Some(dir.into());
        self
    }

    /// `$XDG_CONFIG_HOME`, defaulting to `$HOME/.config`.
    #[must_use]
    pub fn xdg_config(&self) -> PathBuf {
        self.xdg_config_home
            .clone()
            .unwrap_or_else(|| self.home.join(".config"))
    }

    /// `$XDG_CACHE_HOME`, defaulting to `$HOME/.cache`.
    #[must_use]
    pub fn xdg_cache(&self) -> PathBuf {
        self.xdg_cache_home
            .clone()
            .unwrap_or_else(|| self.home.join(".cache"))
    }

    /// The VS Code user settings directory for this OS.
    #[must_use]
    pub fn vscode_user(&self) -> PathBuf {
        match self.os {
            Os::MacOs => self
                .home
                .join("Library")
                .join("Application Support")
                .join("Code")
                .join("User"),
            Os::Linux => self.xdg_config().join("Code").join("User"),
        }
    }

    /// Value of a supported variable, by exact name.
    fn variable(&self, name: &str) -> Option<PathBuf> {
        match name {
            "HOME" => Some(self.home.clone()),
            "XDG_CONFIG" | "XDG_CONFIG_HOME" => Some(self.xdg_config()),
            "VSCODE_USER" => Some(self.vscode_user()),
            _ => None,
        }
    }

    /// Expand the supported variables in a destination string.
    ///
    /// Each `$NAME` reference is read up to the end of its identifier (or
    /// the closing brace of `${NAME}`) and replaced only on an exact name
    /// match, so `$HOMEBREW_PREFIX` is never half-consumed by `$HOME`.
    /// Unknown variables are left as written.
    #[must_use]
    pub fn expand(&self, raw: &str) -> String {
        let mut out = String::with_capacity(raw.len());
        let mut rest = raw;
        while let Some(pos) = rest.find('$') {
            let (before, tail) = rest.split_at(pos);
            out.push_str(before);
            let tail = tail.strip_prefix('$').unwrap_or(tail);
            let value = variable_ref(tail)
                .and_then(|(name, len)| Some((self.variable(name)?, len)));
            if let Some((value, len)) = value {
                out.push_str(&value.to_string_lossy());
                rest = tail.get(len..).unwrap_or_default();
            } else {
                out.push('$');
                rest = tail;
            }
        }
        out.push_str(rest);

        if let Some(rest) = out.strip_prefix("~/") {
            out = self.home.join(rest).to_string_lossy().into_owned();
        } else if out == "~" {
            out = self.home.to_string_lossy().into_owned();
        }
        out
    }

    /// Variable references in `raw` that [`expand`](Self::expand) leaves
    /// as written.
    #[must_use]
    pub fn unknown_variables(&self, raw: &str) -> Vec<String> {
        raw.split('$')
            .skip(1)
            .filter_map(variable_ref)
            .filter(|(name, _)| self.variable(name).is_none())
            .map(|(name, _)| format!("${name}"))
            .collect()
    }

    /// Resolve a raw rule destination to an absolute path.
    ///
    /// An empty destination means `$HOME/<basename of source>`; a
    /// destination still relative after expansion is taken relative to
    /// `$HOME`.  That includes one starting with an unknown variable:
    /// `$NOPE/x` becomes `$HOME/$NOPE/x`, which callers should report
    /// using [`unknown_variables`](Self::unknown_variables).
    #[must_use]
    pub fn destination(&self, raw: &str, source: &Path) -> PathBuf {
        if raw.is_empty() {
            return source
                .file_name()
                .map_or_else(|| self.home.clone(), |name| self.home.join(name));
        }
        let expanded = PathBuf::from(self.expand(raw));
        if expanded.is_absolute() {
            expanded
        } else {
            self.home.join(expanded)
        }
    }
}

/// The variable name at the start of `tail` (the text after a `$`) and the
/// length of the reference: `NAME` or `{NAME}`.
fn variable_ref(tail: &str) -> Option<(&str, usize)> {
    let is_ident = |c: char| c.is_ascii_alphanumeric() || c == '_';
    if let Some(braced) = tail.strip_prefix('{') {
        let end = braced.find('}')?;
        let name = braced.get(..end)?;
        return (!name.is_empty() && name.chars().all(is_ident)).then_some((name, end + 2));
    }
    let end = tail.find(|c: char| !is_ident(c)).unwrap_or(tail.len());
    let name = tail.get(..end)?;
    (!name.is_empty()).then_some((name, end))
}

fn non_empty_var(name: &str) -> Option<PathBuf> {
    std::env::var_os(name)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}
