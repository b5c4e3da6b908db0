//! Command-line interface definitions.
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::ConflictMode;
use crate::session::Module;

/// Top-level CLI entry point for the shell environment manager.
#[derive(Parser, Debug)]
#[command(
    name = "jsh",
    about = "Personal shell environment manager: dotfile links and cached shell setup",
    version
)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Options shared by every subcommand.
    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Parser, Debug, Clone, Default)]
pub struct GlobalOpts {
    /// Preview changes without applying
    #[arg(short = 'd', long, global = true)]
    pub dry_run: bool,

    /// Override the jsh root directory
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Override the rules file
    #[arg(long, global = true)]
    pub rules: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the declared symlinks
    Link(LinkOpts),
    /// Remove managed symlinks and restore backups
    Unlink(UnlinkOpts),
    /// Show the state of every declared symlink
    Status,
    /// Inspect or manage cached command output
    Cache(CacheOpts),
    /// Print shell code for the start-up modules
    Shellenv(ShellenvOpts),
    /// Print a completion script for jsh
    Completions(CompletionsOpts),
    /// Print version information
    Version,
}

/// Options for the `link` subcommand.
#[derive(Parser, Debug, Clone, Default)]
pub struct LinkOpts {
    /// Ask what to do with each conflicting file
    #[arg(short, long, conflicts_with = "on_conflict")]
    pub interactive: bool,

    /// What to do with files in the way (overrides jsh.toml)
    #[arg(long, value_enum)]
    pub on_conflict: Option<ConflictMode>,

    /// Directory for backups (default: next to the original)
    #[arg(long)]
    pub backup_dir: Option<PathBuf>,
}

/// Options for the `unlink` subcommand.
#[derive(Parser, Debug, Clone, Default)]
pub struct UnlinkOpts {
    /// Directory backups were placed in
    #[arg(long)]
    pub backup_dir: Option<PathBuf>,
}

/// Options for the `cache` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct CacheOpts {
    /// Cache action to run.
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache actions.  An empty key list means every known key.
#[derive(Subcommand, Debug, Clone)]
pub enum CacheAction {
    /// Show age and validity of cache entries
    Status {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
        /// Keys to show
        keys: Vec<String>,
    },
    /// Delete cache entries
    Clear {
        /// Keys to delete
        keys: Vec<String>,
    },
    /// Regenerate cache entries now
    Refresh {
        /// Keys to regenerate
        keys: Vec<String>,
    },
}

/// Options for the `shellenv` subcommand.
#[derive(Parser, Debug, Clone, Default)]
pub struct ShellenvOpts {
    /// Modules to emit (default: all)
    #[arg(short, long = "module", value_enum)]
    pub modules: Vec<Module>,
}

/// Options for the `completions` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct CompletionsOpts {
    /// Target shell
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::unreachable
)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_link_defaults() {
        let cli = Cli::parse_from(["jsh", "link"]);
        assert!(
            matches!(&cli.command, Command::Link(_)),
            "Expected Link command"
        );
        if let Command::Link(opts) = cli.command {
            assert!(!opts.interactive);
            assert_eq!(opts.on_conflict, None);
            assert_eq!(opts.backup_dir, None);
        }
    }

    #[test]
    fn parse_link_on_conflict() {
        let cli = Cli::parse_from(["jsh", "link", "--on-conflict", "overwrite"]);
        assert!(
            matches!(&cli.command, Command::Link(_)),
            "Expected Link command"
        );
        if let Command::Link(opts) = cli.command {
            assert_eq!(opts.on_conflict, Some(ConflictMode::Overwrite));
        }
    }

    #[test]
    fn interactive_conflicts_with_on_conflict() {
        let result = Cli::try_parse_from(["jsh", "link", "-i", "--on-conflict", "skip"]);
        assert!(result.is_err());
    }

    #[test]
    fn parse_link_backup_dir() {
        let cli = Cli::parse_from(["jsh", "link", "--backup-dir", "/tmp/b"]);
        if let Command::Link(opts) = cli.command {
            assert_eq!(opts.backup_dir, Some(PathBuf::from("/tmp/b")));
        } else {
            unreachable!("expected Link command");
        }
    }

    #[test]
    fn parse_dry_run_short() {
        let cli = Cli::parse_from(["jsh", "-d", "unlink"]);
        assert!(cli.global.dry_run);
        assert!(matches!(cli.command, Command::Unlink(_)));
    }

    #[test]
    fn parse_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["jsh", "status", "--root", "/opt/jsh", "--rules", "r.rules"]);
        assert_eq!(cli.global.root, Some(PathBuf::from("/opt/jsh")));
        assert_eq!(cli.global.rules, Some(PathBuf::from("r.rules")));
        assert!(matches!(cli.command, Command::Status));
    }

    #[test]
    fn parse_cache_status_json() {
        let cli = Cli::parse_from(["jsh", "cache", "status", "--json", "brew_shellenv"]);
        let Command::Cache(opts) = cli.command else {
            unreachable!("expected Cache command");
        };
        let CacheAction::Status { json, keys } = opts.action else {
            unreachable!("expected status action");
        };
        assert!(json);
        assert_eq!(keys, vec!["brew_shellenv"]);
    }

    #[test]
    fn parse_cache_clear_all() {
        let cli = Cli::parse_from(["jsh", "cache", "clear"]);
        let Command::Cache(opts) = cli.command else {
            unreachable!("expected Cache command");
        };
        assert!(matches!(opts.action, CacheAction::Clear { ref keys } if keys.is_empty()));
    }

    #[test]
    fn parse_shellenv_modules() {
        let cli = Cli::parse_from(["jsh", "shellenv", "-m", "link-check", "--module", "environment"]);
        let Command::Shellenv(opts) = cli.command else {
            unreachable!("expected Shellenv command");
        };
        assert_eq!(opts.modules, vec![Module::LinkCheck, Module::Environment]);
    }

    #[test]
    fn parse_completions() {
        let cli = Cli::parse_from(["jsh", "completions", "zsh"]);
        assert!(matches!(
            cli.command,
            Command::Completions(CompletionsOpts {
                shell: clap_complete::Shell::Zsh
            })
        ));
    }

    #[test]
    fn parse_version() {
        let cli = Cli::parse_from(["jsh", "version"]);
        assert!(matches!(cli.command, Command::Version));
    }

    #[test]
    fn parse_verbose() {
        let cli = Cli::parse_from(["jsh", "-v", "status"]);
        assert!(cli.verbose);
    }
}
