//! Reconciler scenarios over an in-memory filesystem rooted at
//! `/opt/tool` with `$HOME=/home/u`.
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]

mod common;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use common::{MemFs, Node, outcomes};
use jsh_cli::env::Environment;
use jsh_cli::operations::FileSystemOps;
use jsh_cli::platform::Os;
use jsh_cli::reconcile::{Mode, Outcome, Reconciler, SkipReason};
use jsh_cli::rules::parse;

fn reconciler(fs: &Arc<MemFs>, os: Os) -> Reconciler {
    Reconciler::new(Path::new("/opt/tool"), Environment::new("/home/u", os)).with_fs(fs.clone())
}

fn config_tree() -> MemFs {
    MemFs::new()
        .with_dir("/home/u")
        .with_file("/opt/tool/.config/nvim/init.lua", "vim.o.number = true")
        .with_file("/opt/tool/.config/git/config", "[user]")
}

#[test]
fn file_rule_links_into_home() {
    let fs = Arc::new(
        MemFs::new()
            .with_dir("/home/u")
            .with_file("/opt/tool/.gitconfig", "[core]"),
    );

    let report = reconciler(&fs, Os::Linux).run(&parse("file .gitconfig\n").rules, Mode::Link);

    assert_eq!(report.entries.len(), 1);
    assert_eq!(
        report.entries[0].destination,
        PathBuf::from("/home/u/.gitconfig")
    );
    assert_eq!(report.entries[0].outcome, Outcome::Linked);
    assert_eq!(
        fs.node("/home/u/.gitconfig"),
        Some(Node::Link(PathBuf::from("/opt/tool/.gitconfig")))
    );
}

#[test]
fn children_rule_links_each_child_on_linux() {
    let fs = Arc::new(config_tree());
    let rules = parse("children .config -> $XDG_CONFIG @linux\n").rules;

    let report = reconciler(&fs, Os::Linux).run(&rules, Mode::Link);

    let destinations: Vec<&Path> = report
        .entries
        .iter()
        .map(|e| e.destination.as_path())
        .collect();
    assert_eq!(
        destinations,
        [
            Path::new("/home/u/.config/git"),
            Path::new("/home/u/.config/nvim")
        ]
    );
    assert_eq!(
        outcomes(&report.entries),
        [Outcome::Linked, Outcome::Linked]
    );
    assert_eq!(fs.node("/home/u/.config"), Some(Node::Dir));
    assert_eq!(
        fs.node("/home/u/.config/nvim"),
        Some(Node::Link(PathBuf::from("/opt/tool/.config/nvim")))
    );
}

#[test]
fn linux_only_rule_is_ignored_on_macos() {
    let fs = Arc::new(config_tree());
    let rules = parse("children .config -> $XDG_CONFIG @linux\n").rules;

    let report = reconciler(&fs, Os::MacOs).run(&rules, Mode::Link);

    assert!(report.entries.is_empty());
    assert_eq!(fs.node("/home/u/.config"), None);
}

#[test]
fn failed_backup_of_one_child_does_not_stop_the_others() {
    let fs = Arc::new(
        config_tree()
            .with_file("/home/u/.config/git", "local git")
            .with_file("/home/u/.config/nvim", "local nvim")
            .failing_move_from("/home/u/.config/git"),
    );
    let rules = parse("children .config -> $XDG_CONFIG\n").rules;

    let report = reconciler(&fs, Os::Linux).run(&rules, Mode::Link);

    assert!(matches!(
        &report.entries[0].outcome,
        Outcome::Skipped {
            reason: SkipReason::BackupFailed(_)
        }
    ));
    assert_eq!(
        report.entries[1].outcome,
        Outcome::BackedUpAndLinked {
            backup: PathBuf::from("/home/u/.config/nvim-backup")
        }
    );
    assert_eq!(
        fs.node("/home/u/.config/git"),
        Some(Node::File("local git".into()))
    );
    assert_eq!(
        fs.node("/home/u/.config/nvim-backup"),
        Some(Node::File("local nvim".into()))
    );
    assert_eq!(report.summary().skipped, 1);
}

#[test]
fn status_after_link_reports_everything_linked() {
    let fs = Arc::new(config_tree());
    let rules = parse("children .config -> $XDG_CONFIG\n").rules;
    let r = reconciler(&fs, Os::Linux);

    let _ = r.run(&rules, Mode::Link);
    let status = r.run(&rules, Mode::Status);

    assert_eq!(
        outcomes(&status.entries),
        [Outcome::AlreadyLinked, Outcome::AlreadyLinked]
    );
    assert_eq!(status.conflicts().count(), 0);
}

#[test]
fn relative_link_into_root_counts_as_linked() {
    let fs = Arc::new(
        MemFs::new()
            .with_dir("/home/u")
            .with_file("/opt/tool/.zshrc", "z"),
    );
    fs.symlink(
        Path::new("../../opt/tool/.zshrc"),
        Path::new("/home/u/.zshrc"),
    )
    .unwrap();

    let report = reconciler(&fs, Os::Linux).run(&parse("file .zshrc\n").rules, Mode::Link);

    assert_eq!(outcomes(&report.entries), [Outcome::AlreadyLinked]);
}

#[test]
fn unlink_restores_backups_in_memory() {
    let fs = Arc::new(config_tree().with_file("/home/u/.config/nvim", "local nvim"));
    let rules = parse("children .config -> $XDG_CONFIG\n").rules;
    let r = reconciler(&fs, Os::Linux);

    let _ = r.run(&rules, Mode::Link);
    let report = r.run(&rules, Mode::Unlink);

    assert_eq!(
        outcomes(&report.entries),
        [
            Outcome::Unlinked { restored: None },
            Outcome::Unlinked {
                restored: Some(PathBuf::from("/home/u/.config/nvim-backup"))
            }
        ]
    );
    assert_eq!(fs.node("/home/u/.config/git"), None);
    assert_eq!(
        fs.node("/home/u/.config/nvim"),
        Some(Node::File("local nvim".into()))
    );
    assert_eq!(fs.node("/home/u/.config/nvim-backup"), None);
}

#[test]
fn dotdot_target_escaping_root_is_not_managed() {
    let fs = Arc::new(
        MemFs::new()
            .with_dir("/home/u")
            .with_file("/opt/tool/.vimrc", "set nu"),
    );
    let crafted = PathBuf::from("/opt/tool/../elsewhere/.vimrc");
    fs.symlink(&crafted, Path::new("/home/u/.vimrc")).unwrap();

    let report = reconciler(&fs, Os::Linux).run(&parse("file .vimrc\n").rules, Mode::Unlink);

    assert_eq!(outcomes(&report.entries), [Outcome::NotLinked]);
    assert_eq!(fs.node("/home/u/.vimrc"), Some(Node::Link(crafted)));
}

/// `~/.config` left over from an old `dir .config` rule: every child is
/// already reachable, and nothing in the tool root moves.
#[test]
fn children_under_symlinked_destination_are_left_in_place() {
    let fs = Arc::new(config_tree());
    fs.symlink(Path::new("/opt/tool/.config"), Path::new("/home/u/.config"))
        .unwrap();
    let rules = parse("children .config -> $XDG_CONFIG\n").rules;

    let report = reconciler(&fs, Os::Linux).run(&rules, Mode::Link);

    assert_eq!(
        outcomes(&report.entries),
        [Outcome::AlreadyLinked, Outcome::AlreadyLinked]
    );
    assert_eq!(fs.node("/opt/tool/.config/nvim"), Some(Node::Dir));
    assert_eq!(
        fs.node("/opt/tool/.config/nvim/init.lua"),
        Some(Node::File("vim.o.number = true".to_string()))
    );
    assert_eq!(fs.node("/opt/tool/.config/nvim-backup"), None);
}
