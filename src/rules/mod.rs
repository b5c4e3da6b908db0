//! Symlink rule DSL: rule records, tokenizer and parser.
//!
//! One rule per line:
//!
//! ```text
//! file .gitconfig
//! dir nvim -> $XDG_CONFIG/nvim
//! children .config -> $XDG_CONFIG @linux
//! ```
pub mod lexer;
pub mod parser;

use std::fmt;
use std::path::{Component, Path};
use std::str::FromStr;

pub use parser::{ParsedRules, parse};

use crate::platform::Os;

/// How a rule's source maps onto the filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// Link one path.
    File,
    /// Link a whole directory as a single symlink.
    Directory,
    /// Link every immediate child of the source directory individually.
    Children,
}

impl RuleKind {
    /// The DSL keyword for this kind.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Directory => "dir",
            Self::Children => "children",
        }
    }
}

impl FromStr for RuleKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(Self::File),
            "dir" => Ok(Self::Directory),
            "children" => Ok(Self::Children),
            _ => Err(()),
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Platform filter attached to a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RulePlatform {
    /// Applies everywhere.
    #[default]
    All,
    /// macOS only.
    MacOs,
    /// Linux only.
    Linux,
}

impl RulePlatform {
    /// Whether a rule with this filter participates on `os`.
    #[must_use]
    pub const fn matches(self, os: Os) -> bool {
        match self {
            Self::All => true,
            Self::MacOs => matches!(os, Os::MacOs),
            Self::Linux => matches!(os, Os::Linux),
        }
    }
}

impl FromStr for RulePlatform {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "macos" => Ok(Self::MacOs),
            "linux" => Ok(Self::Linux),
            _ => Err(()),
        }
    }
}

impl fmt::Display for RulePlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::MacOs => f.write_str("macos"),
            Self::Linux => f.write_str("linux"),
        }
    }
}

/// One declared symlink intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// File, directory or children.
    pub kind: RuleKind,
    /// Source path relative to the tool root.
    pub source: String,
    /// Raw destination; may contain unexpanded variables, empty for the
    /// default (`$HOME/<basename>`).
    pub destination: String,
    /// Platform filter.
    pub platform: RulePlatform,
    /// 1-based line in the rules text.
    pub line: usize,
}

impl Rule {
    /// Build a rule programmatically (line 0).
    #[must_use]
    pub fn new(kind: RuleKind, source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            kind,
            source: source.into(),
            destination: destination.into(),
            platform: RulePlatform::All,
            line: 0,
        }
    }

    /// Restrict the rule to one platform.
    #[must_use]
    pub const fn on(mut self, platform: RulePlatform) -> Self {
        self.platform = platform;
        self
    }

    /// The source as a path.
    #[must_use]
    pub fn source_path(&self) -> &Path {
        Path::new(&self.source)
    }

    /// Whether the source is absolute or leaves the tool root through
    /// `..` components.
    #[must_use]
    pub fn source_escapes_root(&self) -> bool {
        let mut depth = 0_usize;
        for component in self.source_path().components() {
            match component {
                Component::Normal(_) => depth += 1,
                Component::CurDir => {}
                Component::ParentDir => match depth.checked_sub(1) {
                    Some(d) => depth = d,
                    None => return true,
                },
                Component::RootDir | Component::Prefix(_) => return true,
            }
        }
        false
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.source)?;
        if !self.destination.is_empty() {
            write!(f, " -> {}", self.destination)?;
        }
        if self.platform != RulePlatform::All {
            write!(f, " @{}", self.platform)?;
        }
        Ok(())
    }
}
