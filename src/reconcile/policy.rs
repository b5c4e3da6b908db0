//! Conflict policies: what to do when a real file or directory occupies a
//! link destination.
use std::fmt;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Mutex;

use crate::operations::EntryKind;

/// Resolution for one conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Leave the destination alone.
    Skip,
    /// Move the destination to its backup location, then link.
    Backup,
    /// Delete the destination, then link.
    Overwrite,
}

impl FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "skip" => Ok(Self::Skip),
            "backup" => Ok(Self::Backup),
            "overwrite" => Ok(Self::Overwrite),
            other => Err(format!(
                "unknown conflict decision '{other}' (expected skip, backup or overwrite)"
            )),
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skip => f.write_str("skip"),
            Self::Backup => f.write_str("backup"),
            Self::Overwrite => f.write_str("overwrite"),
        }
    }
}

/// A destination occupied by something that is not a symlink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    /// Path the link should occupy.
    pub destination: PathBuf,
    /// Path the link would point to.
    pub source: PathBuf,
    /// What currently occupies the destination.
    pub kind: EntryKind,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} is {}", self.destination.display(), self.kind)
    }
}

/// Decides how to resolve a [`Conflict`].
pub trait ConflictPolicy: Send + Sync + fmt::Debug {
    /// Choose a resolution.
    fn decide(&self, conflict: &Conflict) -> Decision;
}

/// Always back up.  The default for non-interactive runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysBackup;

impl ConflictPolicy for AlwaysBackup {
    fn decide(&self, _conflict: &Conflict) -> Decision {
        Decision::Backup
    }
}

/// Apply the same decision to every conflict.
#[derive(Debug, Clone, Copy)]
pub struct Fixed(pub Decision);

impl ConflictPolicy for Fixed {
    fn decide(&self, _conflict: &Conflict) -> Decision {
        self.0
    }
}

#[derive(Debug)]
struct PromptState<R, W> {
    input: R,
    output: W,
    sticky: Option<Decision>,
}

/// Ask the user on `output`, read the answer from `input`.
///
/// Answers: `s` skip, `b` backup, `o` overwrite.  An upper-case answer
/// applies to every remaining conflict.  EOF or unreadable input means skip.
#[derive(Debug)]
pub struct PromptUser<R, W> {
    state: Mutex<PromptState<R, W>>,
}

impl<R: BufRead, W: Write> PromptUser<R, W> {
    /// Create a prompt over the given streams.
    pub const fn new(input: R, output: W) -> Self {
        Self {
            state: Mutex::new(PromptState {
                input,
                output,
                sticky: None,
            }),
        }
    }
}

impl PromptUser<std::io::BufReader<std::io::Stdin>, std::io::Stderr> {
    /// Prompt on stderr, read from stdin.
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(std::io::BufReader::new(std::io::stdin()), std::io::stderr())
    }
}

fn parse_answer(answer: &str) -> Option<(Decision, bool)> {
    let decision = match answer.to_ascii_lowercase().as_str() {
        "s" | "skip" => Decision::Skip,
        "b" | "backup" => Decision::Backup,
        "o" | "overwrite" => Decision::Overwrite,
        _ => return None,
    };
    let for_all = answer.chars().next().is_some_and(char::is_uppercase);
    Some((decision, for_all))
}

impl<R, W> ConflictPolicy for PromptUser<R, W>
where
    R: BufRead + Send + fmt::Debug,
    W: Write + Send + fmt::Debug,
{
    fn decide(&self, conflict: &Conflict) -> Decision {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(decision) = state.sticky {
            return decision;
        }
        loop {
            let _ = write!(
                state.output,
                "{conflict}. [s]kip, [b]ackup, [o]verwrite (upper-case for all)? "
            );
            let _ = state.output.flush();
            let mut line = String::new();
            match state.input.read_line(&mut line) {
                Ok(0) | Err(_) => return Decision::Skip,
                Ok(_) => {}
            }
            if let Some((decision, for_all)) = parse_answer(line.trim()) {
                if for_all {
                    state.sticky = Some(decision);
                }
                return decision;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn conflict() -> Conflict {
        Conflict {
            destination: PathBuf::from("/home/u/.zshrc"),
            source: PathBuf::from("/opt/jsh/.zshrc"),
            kind: EntryKind::File,
        }
    }

    #[test]
    fn decision_parses_and_displays() {
        for d in [Decision::Skip, Decision::Backup, Decision::Overwrite] {
            assert_eq!(d.to_string().parse::<Decision>(), Ok(d));
        }
        assert!("delete".parse::<Decision>().is_err());
    }

    #[test]
    fn always_backup_and_fixed() {
        assert_eq!(AlwaysBackup.decide(&conflict()), Decision::Backup);
        assert_eq!(
            Fixed(Decision::Overwrite).decide(&conflict()),
            Decision::Overwrite
        );
    }

    #[test]
    fn prompt_reads_one_answer_per_conflict() {
        let prompt = PromptUser::new(Cursor::new("b\ns\n"), Vec::new());
        assert_eq!(prompt.decide(&conflict()), Decision::Backup);
        assert_eq!(prompt.decide(&conflict()), Decision::Skip);
    }

    #[test]
    fn prompt_reasks_on_garbage() {
        let prompt = PromptUser::new(Cursor::new("what\no\n"), Vec::new());
        assert_eq!(prompt.decide(&conflict()), Decision::Overwrite);
    }

    #[test]
    fn uppercase_answer_applies_to_all() {
        let prompt = PromptUser::new(Cursor::new("O\n"), Vec::new());
        assert_eq!(prompt.decide(&conflict()), Decision::Overwrite);
        assert_eq!(prompt.decide(&conflict()), Decision::Overwrite);
    }

    #[test]
    fn eof_means_skip() {
        let prompt = PromptUser::new(Cursor::new(""), Vec::new());
        assert_eq!(prompt.decide(&conflict()), Decision::Skip);
    }

    #[test]
    fn prompt_mentions_destination() {
        let prompt = PromptUser::new(Cursor::new("s\n"), Vec::new());
        prompt.decide(&conflict());
        let state = prompt.state.into_inner().unwrap();
        let written = String::from_utf8(state.output).unwrap();
        assert_eq!(
            written.trim_end(),
            "/home/u/.zshrc is a regular file. [s]kip, [b]ackup, [o]verwrite (upper-case for all)?"
        );
    }
}
