//! `jsh` command-line entry point.
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use jsh_cli::cli::{self, CacheAction, Command};
use jsh_cli::commands;
use jsh_cli::env::Environment;
use jsh_cli::logging::{self, LogConfig, Logger};
use jsh_cli::platform::Platform;

/// Log file name (without extension) for a subcommand.
const fn log_name(command: &Command) -> &'static str {
    match command {
        Command::Link(_) => "link",
        Command::Unlink(_) => "unlink",
        Command::Status => "status",
        Command::Cache(opts) => match opts.action {
            CacheAction::Status { .. } => "cache-status",
            CacheAction::Clear { .. } => "cache-clear",
            CacheAction::Refresh { .. } => "cache-refresh",
        },
        Command::Shellenv(_) => "shellenv",
        Command::Completions(_) | Command::Version => "jsh",
    }
}

fn main() -> Result<()> {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = cli::Cli::parse();

    match args.command {
        Command::Version => {
            commands::version::run();
            return Ok(());
        }
        Command::Completions(ref opts) => {
            commands::completions::run(opts);
            return Ok(());
        }
        _ => {}
    }

    let name = log_name(&args.command);
    let quiet = matches!(
        args.command,
        Command::Shellenv(_)
            | Command::Cache(cli::CacheOpts {
                action: CacheAction::Status { json: true, .. }
            })
    );
    // Without $HOME there is nowhere to log to; the command itself reports
    // the missing variable.
    let log_file = Environment::from_process(Platform::detect().os)
        .ok()
        .map(|env| logging::log_file_path(&env, name));
    logging::init_subscriber(&LogConfig {
        verbose: args.verbose,
        quiet,
        file: log_file.clone(),
        command: name.to_string(),
    });
    let log = Arc::new(Logger::new(log_file));

    match args.command {
        Command::Link(ref opts) => commands::link::run(&args.global, opts, args.verbose, &log),
        Command::Unlink(ref opts) => commands::unlink::run(&args.global, opts, args.verbose, &log),
        Command::Status => commands::status::run(&args.global, &log),
        Command::Cache(ref opts) => commands::cache::run(&args.global, opts, &log),
        Command::Shellenv(ref opts) => commands::shellenv::run(&args.global, opts, &log),
        Command::Completions(_) | Command::Version => Ok(()),
    }
}
