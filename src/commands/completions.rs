//! Command: print a shell completion script for jsh.
use std::io::Write;

use clap::CommandFactory as _;

use crate::cli::{Cli, CompletionsOpts};

/// Write the completion script for the requested shell to stdout.
pub fn run(opts: &CompletionsOpts) {
    generate(opts.shell, &mut std::io::stdout());
}

/// Write the completion script for `shell` to `out`.
pub fn generate(shell: clap_complete::Shell, out: &mut dyn Write) {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "jsh", out);
}
