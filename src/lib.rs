//! Personal shell environment manager.
//!
//! Keeps a home directory's dotfile symlinks in line with a small rules
//! file, and caches the output of slow shell start-up commands
//! (`brew shellenv`, completion generators) so new shells open quickly.
//!
//! The public API is organised into these layers:
//!
//! - **[`rules`]**: lex and parse the link rule DSL
//! - **[`reconcile`]**: converge symlinks to the rules (`link`, `unlink`, `status`)
//! - **[`resources`]**: single-link state and backup placement
//! - **[`cache`]**: TTL and invalidation-key cache for command output
//! - **[`session`]**: shell start-up composition root
//! - **[`commands`]**: top-level subcommand orchestration
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod cache;
pub mod cli;
pub mod commands;
pub mod config;
pub mod env;
pub mod error;
pub mod exec;
pub mod logging;
pub mod operations;
pub mod platform;
pub mod reconcile;
pub mod resources;
pub mod rules;
pub mod session;
