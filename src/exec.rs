//! Subprocess execution behind the [`Executor`] seam.
use std::fmt;
use std::io::Read;
use std::process::{Command, ExitStatus, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::ExecError;

/// How often a running child is polled while a timeout is armed.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Result of a command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecResult {
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
    /// Whether the process exited with status 0.
    pub success: bool,
    /// Exit code, `None` if terminated by a signal.
    pub code: Option<i32>,
}

impl From<Output> for ExecResult {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
        }
    }
}

/// Who a subprocess runs as.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Principal {
    /// The current user.
    #[default]
    Current,
    /// Another user via `sudo -H -u <user> env K=V ...`.
    Delegate {
        /// Target user name.
        user: String,
        /// Extra environment passed through `env`.
        env: Vec<(String, String)>,
    },
}

impl Principal {
    /// Delegate to `user` with no extra environment.
    #[must_use]
    pub fn delegate(user: impl Into<String>) -> Self {
        Self::Delegate {
            user: user.into(),
            env: Vec::new(),
        }
    }

    /// The principal for an entry declaring `run_as`.
    ///
    /// Delegation only applies when the current process runs as root;
    /// otherwise the command runs as the current user.
    #[must_use]
    pub fn for_run_as(run_as: Option<&str>, running_as_root: bool) -> Self {
        match run_as {
            Some(user) if running_as_root => Self::delegate(user),
            _ => Self::Current,
        }
    }

    /// The program and argument vector to actually spawn.
    ///
    /// # Examples
    ///
    /// ```
    /// use jsh_cli::exec::Principal;
    ///
    /// let (program, args) = Principal::delegate("linuxbrew")
    ///     .wrap("brew", &["shellenv".to_string()]);
    /// assert_eq!(program, "sudo");
    /// assert_eq!(args, ["-H", "-u", "linuxbrew", "env", "brew", "shellenv"]);
    /// ```
    #[must_use]
    pub fn wrap(&self, program: &str, args: &[String]) -> (String, Vec<String>) {
        match self {
            Self::Current => (program.to_string(), args.to_vec()),
            Self::Delegate { user, env } => {
                let mut argv = vec![
                    "-H".to_string(),
                    "-u".to_string(),
                    user.clone(),
                    "env".to_string(),
                ];
                argv.extend(env.iter().map(|(k, v)| format!("{k}={v}")));
                argv.push(program.to_string());
                argv.extend(args.iter().cloned());
                ("sudo".to_string(), argv)
            }
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Current => f.write_str("current user"),
            Self::Delegate { user, .. } => write!(f, "user '{user}'"),
        }
    }
}

/// Runs external programs.
#[cfg_attr(test, mockall::automock)]
pub trait Executor: Send + Sync + fmt::Debug {
    /// Run a program and return its output.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError`] if the program cannot be started, times out or
    /// exits non-zero.
    fn run(&self, program: &str, args: &[String]) -> Result<ExecResult, ExecError>;

    /// Run a program, returning its output even when it exits non-zero.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError`] if the program cannot be started or times out.
    fn run_unchecked(&self, program: &str, args: &[String]) -> Result<ExecResult, ExecError>;

    /// Check if a program is available on `PATH`.
    fn which(&self, program: &str) -> bool;
}

/// Production [`Executor`] spawning real processes.
#[derive(Debug, Clone, Default)]
pub struct SystemExecutor {
    timeout: Option<Duration>,
    principal: Principal,
}

impl SystemExecutor {
    /// Executor without a timeout, running as the current user.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill children that run longer than `timeout`.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Run every command as `principal`.
    #[must_use]
    pub fn as_principal(mut self, principal: Principal) -> Self {
        self.principal = principal;
        self
    }

    fn execute(&self, program: &str, args: &[String]) -> Result<ExecResult, ExecError> {
        let (spawn_program, argv) = self.principal.wrap(program, args);
        let mut child = Command::new(&spawn_program)
            .args(&argv)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ExecError::Spawn {
                program: program.to_string(),
                source,
            })?;

        // Drain both pipes concurrently so a chatty child cannot block on a
        // full pipe while we wait for it.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let status = match self.timeout {
            None => child.wait(),
            Some(limit) => wait_with_timeout(&mut child, limit).ok_or_else(|| {
                ExecError::TimedOut {
                    program: program.to_string(),
                    timeout_secs: limit.as_secs(),
                }
            })?,
        }
        .map_err(|source| ExecError::Spawn {
            program: program.to_string(),
            source,
        })?;

        Ok(ExecResult {
            stdout: collect(stdout),
            stderr: collect(stderr),
            success: status.success(),
            code: status.code(),
        })
    }
}

/// Poll `child` until it exits or `limit` elapses.  Returns `None` after
/// killing a child that ran out of time.
fn wait_with_timeout(
    child: &mut std::process::Child,
    limit: Duration,
) -> Option<std::io::Result<ExitStatus>> {
    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Some(Ok(status)),
            Ok(None) if start.elapsed() >= limit => {
                child.kill().ok();
                child.wait().ok();
                return None;
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => return Some(Err(e)),
        }
    }
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).ok();
        buf
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

impl Executor for SystemExecutor {
    fn run(&self, program: &str, args: &[String]) -> Result<ExecResult, ExecError> {
        let result = self.execute(program, args)?;
        if !result.success {
            return Err(ExecError::Failed {
                program: program.to_string(),
                code: result.code.unwrap_or(-1),
                stderr: result.stderr.trim().to_string(),
            });
        }
        Ok(result)
    }

    fn run_unchecked(&self, program: &str, args: &[String]) -> Result<ExecResult, ExecError> {
        self.execute(program, args)
    }

    fn which(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

/// Whether the current process runs as root, asked via `id -u`.
#[must_use]
pub fn running_as_root(executor: &dyn Executor) -> bool {
    executor
        .run("id", &["-u".to_string()])
        .is_ok_and(|r| r.stdout.trim() == "0")
}
