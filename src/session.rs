//! Shell start-up composition root.
//!
//! A [`Session`] owns everything `jsh shellenv` needs and emits shell code
//! for the requested [`Module`]s.  Each module is set up at most once per
//! process; the [`Initialized`] set records which ones already ran.
use std::collections::BTreeSet;
use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::{CacheEntry, CacheManager};
use crate::config::{CacheSettings, SnippetKind};
use crate::env::Environment;
use crate::logging::{Log, MemoryLog, NullLog};
use crate::reconcile::{Mode, Reconciler};
use crate::rules::Rule;

/// A unit of shell start-up work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, clap::ValueEnum)]
pub enum Module {
    /// Cached environment snippets (`brew shellenv`, ...).
    Environment,
    /// Cached completion definitions.
    Completions,
    /// Warn on stderr when declared links are in conflict.
    LinkCheck,
}

impl Module {
    /// Every module, in emission order.
    pub const ALL: [Self; 3] = [Self::Environment, Self::Completions, Self::LinkCheck];
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Environment => f.write_str("environment"),
            Self::Completions => f.write_str("completions"),
            Self::LinkCheck => f.write_str("link-check"),
        }
    }
}

/// Modules that have already been set up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Initialized(BTreeSet<Module>);

impl Initialized {
    /// Whether `module` already ran.
    #[must_use]
    pub fn contains(&self, module: Module) -> bool {
        self.0.contains(&module)
    }

    /// Record `module`; returns `false` if it was already recorded.
    pub fn mark(&mut self, module: Module) -> bool {
        self.0.insert(module)
    }

    /// Recorded modules in emission order.
    pub fn iter(&self) -> impl Iterator<Item = Module> + '_ {
        self.0.iter().copied()
    }
}

/// Owns the state shared by the shell start-up modules.
pub struct Session {
    root: PathBuf,
    env: Environment,
    rules: Vec<Rule>,
    cache: CacheManager,
    cache_settings: CacheSettings,
    entries: Vec<CacheEntry>,
    running_as_root: bool,
    log: Arc<dyn Log>,
    initialized: Initialized,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("root", &self.root)
            .field("entries", &self.entries.len())
            .field("initialized", &self.initialized)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a session for the tool root `root`.
    #[must_use]
    pub fn new(
        root: impl Into<PathBuf>,
        env: Environment,
        cache: CacheManager,
        cache_settings: CacheSettings,
    ) -> Self {
        Self {
            root: root.into(),
            env,
            rules: Vec::new(),
            cache,
            cache_settings,
            entries: Vec::new(),
            running_as_root: false,
            log: Arc::new(NullLog),
            initialized: Initialized::default(),
        }
    }

    /// Rules checked by [`Module::LinkCheck`].
    #[must_use]
    pub fn with_rules(mut self, rules: Vec<Rule>) -> Self {
        self.rules = rules;
        self
    }

    /// Cache entries emitted by the snippet modules.
    #[must_use]
    pub fn with_entries(mut self, entries: Vec<CacheEntry>) -> Self {
        self.entries = entries;
        self
    }

    /// Whether jsh runs as root (enables `run_as` delegation).
    #[must_use]
    pub const fn with_running_as_root(mut self, running_as_root: bool) -> Self {
        self.running_as_root = running_as_root;
        self
    }

    /// Log through `log`.
    #[must_use]
    pub fn with_log(mut self, log: Arc<dyn Log>) -> Self {
        self.log = log;
        self
    }

    /// Modules set up so far.
    #[must_use]
    pub const fn initialized(&self) -> &Initialized {
        &self.initialized
    }

    /// Set up every module in `modules`, in emission order regardless of
    /// the order given.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `out` fails.
    pub fn init_all(&mut self, modules: &[Module], out: &mut dyn Write) -> io::Result<()> {
        for module in Module::ALL {
            if modules.contains(&module) {
                self.init(module, out)?;
            }
        }
        Ok(())
    }

    /// Set up `module` unless it already ran.  Returns whether it ran now.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `out` fails.
    pub fn init(&mut self, module: Module, out: &mut dyn Write) -> io::Result<bool> {
        if !self.initialized.mark(module) {
            self.log.debug(&format!("{module} already initialized"));
            return Ok(false);
        }
        match module {
            Module::Environment => self.emit_snippets(SnippetKind::Environment, out)?,
            Module::Completions => self.emit_snippets(SnippetKind::Completion, out)?,
            Module::LinkCheck => self.check_links(out)?,
        }
        Ok(true)
    }

    fn emit_snippets(&self, kind: SnippetKind, out: &mut dyn Write) -> io::Result<()> {
        for entry in self.entries.iter().filter(|e| e.kind == kind) {
            match entry.fetch(&self.cache, &self.cache_settings, self.running_as_root) {
                Ok(payload) => {
                    self.log.debug(&format!("emitting {kind} snippet {}", entry.key));
                    out.write_all(payload.as_bytes())?;
                    if !payload.is_empty() && !payload.ends_with('\n') {
                        out.write_all(b"\n")?;
                    }
                }
                Err(e) => self.log.warn(&format!("skipping {}: {e}", entry.key)),
            }
        }
        Ok(())
    }

    fn check_links(&self, out: &mut dyn Write) -> io::Result<()> {
        let collected = Arc::new(MemoryLog::new());
        let report = Reconciler::new(&self.root, self.env.clone())
            .with_log(collected.clone())
            .run(&self.rules, Mode::Status);
        for (_, msg) in collected.entries() {
            self.log.debug(&msg);
        }
        let conflicts = report.conflicts().count();
        if conflicts > 0 {
            let noun = if conflicts == 1 { "conflict" } else { "conflicts" };
            writeln!(
                out,
                "echo 'jsh: {conflicts} link {noun}; run jsh status for details' >&2"
            )?;
        }
        Ok(())
    }
}
