//! Operating system family detection.
use std::fmt;

/// Operating system family.  Everything that is not macOS is treated as
/// Linux.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    /// macOS (Darwin).
    MacOs,
    /// Linux and other Unix-like systems.
    Linux,
}

impl Os {
    /// Map a `std::env::consts::OS` value to a family.
    #[must_use]
    pub fn from_target(name: &str) -> Self {
        if name == "macos" {
            Self::MacOs
        } else {
            Self::Linux
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MacOs => f.write_str("macos"),
            Self::Linux => f.write_str("linux"),
        }
    }
}

/// The platform jsh is running on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    /// Operating system family.
    pub os: Os,
}

impl Platform {
    /// The platform of this process.
    #[must_use]
    pub fn detect() -> Self {
        Self::new(Os::from_target(std::env::consts::OS))
    }

    /// A platform with an explicit OS family.
    #[must_use]
    pub const fn new(os: Os) -> Self {
        Self { os }
    }
}
