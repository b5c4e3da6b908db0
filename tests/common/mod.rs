// Shared helpers for integration tests.
//
// Provides a temporary tool root plus fake home directory, an in-memory
// filesystem for scenarios under fixed absolute paths (`/opt/tool`,
// `/home/u`), and filesystem decorators that count writes or inject move
// failures.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(
    dead_code,
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::new_without_default
)]

use std::collections::{BTreeMap, HashSet};
use std::ffi::OsString;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use jsh_cli::env::Environment;
use jsh_cli::operations::{EntryKind, FileSystemOps, SystemFileSystemOps};
use jsh_cli::platform::Os;
use jsh_cli::reconcile::{LinkReport, Outcome, Reconciler};

/// A tool root and a home directory, both in canonical temp directories.
pub struct TestTree {
    _root_dir: tempfile::TempDir,
    _home_dir: tempfile::TempDir,
    /// Canonical tool root.
    pub root: PathBuf,
    /// Canonical fake `$HOME`.
    pub home: PathBuf,
}

impl TestTree {
    /// Create empty root and home directories.
    pub fn new() -> Self {
        let root_dir = tempfile::tempdir().expect("create root dir");
        let home_dir = tempfile::tempdir().expect("create home dir");
        let root = dunce::canonicalize(root_dir.path()).expect("canonical root");
        let home = dunce::canonicalize(home_dir.path()).expect("canonical home");
        Self {
            _root_dir: root_dir,
            _home_dir: home_dir,
            root,
            home,
        }
    }

    /// Write `content` to `<root>/<rel>`, creating parents.
    pub fn with_source(self, rel: &str, content: &str) -> Self {
        write_file(&self.root.join(rel), content);
        self
    }

    /// Write `content` to `<home>/<rel>`, creating parents.
    pub fn with_home_file(self, rel: &str, content: &str) -> Self {
        write_file(&self.home.join(rel), content);
        self
    }

    /// Environment with this tree's home.
    pub fn env(&self, os: Os) -> Environment {
        Environment::new(&self.home, os)
    }

    /// Reconciler over the real filesystem.
    pub fn reconciler(&self, os: Os) -> Reconciler {
        Reconciler::new(&self.root, self.env(os))
    }
}

fn write_file(path: &Path, content: &str) {
    std::fs::create_dir_all(path.parent().expect("parent")).expect("create parents");
    std::fs::write(path, content).expect("write file");
}

/// Outcomes of `entries`, in order.
pub fn outcomes(entries: &[LinkReport]) -> Vec<Outcome> {
    entries.iter().map(|e| e.outcome.clone()).collect()
}

/// Wraps the real filesystem and counts mutating calls.
#[derive(Debug, Default)]
pub struct CountingFs {
    writes: AtomicUsize,
}

impl CountingFs {
    /// Number of mutating calls so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn count(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

impl FileSystemOps for CountingFs {
    fn entry_kind(&self, path: &Path) -> io::Result<Option<EntryKind>> {
        SystemFileSystemOps.entry_kind(path)
    }
    fn exists(&self, path: &Path) -> bool {
        SystemFileSystemOps.exists(path)
    }
    fn is_dir(&self, path: &Path) -> bool {
        SystemFileSystemOps.is_dir(path)
    }
    fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        SystemFileSystemOps.read_link(path)
    }
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        SystemFileSystemOps.canonicalize(path)
    }
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        SystemFileSystemOps.read_dir(path)
    }
    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        self.count();
        SystemFileSystemOps.create_dir_all(path)
    }
    fn symlink(&self, target: &Path, link: &Path) -> io::Result<()> {
        self.count();
        SystemFileSystemOps.symlink(target, link)
    }
    fn remove_link(&self, path: &Path) -> io::Result<()> {
        self.count();
        SystemFileSystemOps.remove_link(path)
    }
    fn remove_all(&self, path: &Path) -> io::Result<()> {
        self.count();
        SystemFileSystemOps.remove_all(path)
    }
    fn move_path(&self, from: &Path, to: &Path) -> io::Result<()> {
        self.count();
        SystemFileSystemOps.move_path(from, to)
    }
}

/// A node of [`MemFs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Regular file with contents.
    File(String),
    /// Directory.
    Dir,
    /// Symlink with its raw target.
    Link(PathBuf),
}

/// In-memory filesystem keyed by absolute path, with optional move
/// failures.
#[derive(Debug)]
pub struct MemFs {
    nodes: Mutex<BTreeMap<PathBuf, Node>>,
    failing_moves: Mutex<HashSet<PathBuf>>,
}

impl MemFs {
    /// A filesystem holding only `/`.
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(PathBuf::from("/"), Node::Dir);
        Self {
            nodes: Mutex::new(nodes),
            failing_moves: Mutex::new(HashSet::new()),
        }
    }

    /// Add a directory and its ancestors.
    pub fn with_dir(self, path: &str) -> Self {
        self.create_dir_all(Path::new(path)).expect("create dir");
        self
    }

    /// Add a file, creating its ancestors.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        let path = PathBuf::from(path);
        self.create_dir_all(path.parent().expect("parent"))
            .expect("create parents");
        self.nodes
            .lock()
            .unwrap()
            .insert(path, Node::File(content.to_string()));
        self
    }

    /// Make every `move_path` from `path` fail.
    pub fn failing_move_from(self, path: &str) -> Self {
        self.failing_moves
            .lock()
            .unwrap()
            .insert(PathBuf::from(path));
        self
    }

    /// Node stored at exactly `path`.
    pub fn node(&self, path: &str) -> Option<Node> {
        self.nodes.lock().unwrap().get(Path::new(path)).cloned()
    }

    fn resolve(&self, path: &Path) -> io::Result<PathBuf> {
        let nodes = self.nodes.lock().unwrap();
        resolve_in(&nodes, path)
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, path.display().to_string())
}

/// Follow every symlink in `path`.
fn resolve_in(nodes: &BTreeMap<PathBuf, Node>, path: &Path) -> io::Result<PathBuf> {
    let mut pending: Vec<OsString> = Vec::new();
    push_components(&mut pending, path);
    let mut current = PathBuf::from("/");
    let mut hops = 0;
    while let Some(part) = pending.pop() {
        if part == ".." {
            current.pop();
            continue;
        }
        let next = current.join(&part);
        match nodes.get(&next) {
            None => return Err(not_found(&next)),
            Some(Node::Link(target)) => {
                hops += 1;
                if hops > 40 {
                    return Err(io::Error::other("too many levels of symbolic links"));
                }
                if target.is_absolute() {
                    current = PathBuf::from("/");
                }
                push_components(&mut pending, target);
            }
            Some(_) => current = next,
        }
    }
    Ok(current)
}

/// Push the components of `path` so the first one is popped first.
fn push_components(stack: &mut Vec<OsString>, path: &Path) {
    let parts: Vec<OsString> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name.to_os_string()),
            Component::ParentDir => Some(OsString::from("..")),
            _ => None,
        })
        .collect();
    stack.extend(parts.into_iter().rev());
}

/// `path` with its parent resolved but its final component kept.
fn locate(nodes: &BTreeMap<PathBuf, Node>, path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?;
    let parent = resolve_in(nodes, path.parent()?).ok()?;
    Some(parent.join(name))
}

impl FileSystemOps for MemFs {
    fn entry_kind(&self, path: &Path) -> io::Result<Option<EntryKind>> {
        let nodes = self.nodes.lock().unwrap();
        let Some(at) = locate(&nodes, path) else {
            return Ok(None);
        };
        Ok(nodes.get(&at).map(|node| match node {
            Node::File(_) => EntryKind::File,
            Node::Dir => EntryKind::Directory,
            Node::Link(_) => EntryKind::Symlink,
        }))
    }

    fn exists(&self, path: &Path) -> bool {
        self.resolve(path).is_ok()
    }

    fn is_dir(&self, path: &Path) -> bool {
        let nodes = self.nodes.lock().unwrap();
        resolve_in(&nodes, path).is_ok_and(|p| nodes.get(&p) == Some(&Node::Dir))
    }

    fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        let nodes = self.nodes.lock().unwrap();
        let at = locate(&nodes, path).ok_or_else(|| not_found(path))?;
        match nodes.get(&at) {
            Some(Node::Link(target)) => Ok(target.clone()),
            Some(_) => Err(io::Error::new(io::ErrorKind::InvalidInput, "not a symlink")),
            None => Err(not_found(path)),
        }
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        self.resolve(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let nodes = self.nodes.lock().unwrap();
        let dir = resolve_in(&nodes, path)?;
        if nodes.get(&dir) != Some(&Node::Dir) {
            return Err(io::Error::new(io::ErrorKind::NotADirectory, "not a directory"));
        }
        Ok(nodes
            .keys()
            .filter(|p| p.parent() == Some(dir.as_path()))
            .filter_map(|p| p.file_name())
            .map(|name| path.join(name))
            .collect())
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let mut nodes = self.nodes.lock().unwrap();
        let mut current = PathBuf::from("/");
        for part in path.components().skip(1) {
            let next = current.join(part);
            match nodes.get(&next) {
                None => {
                    nodes.insert(next.clone(), Node::Dir);
                    current = next;
                }
                Some(Node::Dir) => current = next,
                Some(Node::Link(_)) => current = resolve_in(&nodes, &next)?,
                Some(Node::File(_)) => {
                    return Err(io::Error::new(io::ErrorKind::AlreadyExists, "file in the way"));
                }
            }
        }
        Ok(())
    }

    fn symlink(&self, target: &Path, link: &Path) -> io::Result<()> {
        let mut nodes = self.nodes.lock().unwrap();
        let at = locate(&nodes, link).ok_or_else(|| not_found(link))?;
        if nodes.contains_key(&at) {
            return Err(io::Error::new(io::ErrorKind::AlreadyExists, "exists"));
        }
        nodes.insert(at, Node::Link(target.to_path_buf()));
        Ok(())
    }

    fn remove_link(&self, path: &Path) -> io::Result<()> {
        let mut nodes = self.nodes.lock().unwrap();
        let at = locate(&nodes, path).ok_or_else(|| not_found(path))?;
        match nodes.get(&at) {
            Some(Node::Link(_)) => {
                nodes.remove(&at);
                Ok(())
            }
            _ => Err(io::Error::new(io::ErrorKind::InvalidInput, "not a symlink")),
        }
    }

    fn remove_all(&self, path: &Path) -> io::Result<()> {
        let mut nodes = self.nodes.lock().unwrap();
        let at = locate(&nodes, path).ok_or_else(|| not_found(path))?;
        if !nodes.contains_key(&at) {
            return Err(not_found(path));
        }
        nodes.retain(|p, _| !p.starts_with(&at));
        Ok(())
    }

    fn move_path(&self, from: &Path, to: &Path) -> io::Result<()> {
        if self.failing_moves.lock().unwrap().contains(from) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "injected failure"));
        }
        let mut nodes = self.nodes.lock().unwrap();
        let src = locate(&nodes, from).ok_or_else(|| not_found(from))?;
        let dst = locate(&nodes, to).ok_or_else(|| not_found(to))?;
        if !nodes.contains_key(&src) {
            return Err(not_found(from));
        }
        if nodes.contains_key(&dst) {
            return Err(io::Error::new(io::ErrorKind::AlreadyExists, "exists"));
        }
        let moved: Vec<(PathBuf, Node)> = nodes
            .iter()
            .filter(|(p, _)| p.starts_with(&src))
            .map(|(p, n)| (p.clone(), n.clone()))
            .collect();
        for (old, node) in moved {
            nodes.remove(&old);
            let rel = old.strip_prefix(&src).expect("descendant");
            let new = if rel.as_os_str().is_empty() {
                dst.clone()
            } else {
                dst.join(rel)
            };
            nodes.insert(new, node);
        }
        Ok(())
    }
}
