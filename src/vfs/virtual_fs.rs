//! This module provides the sandbox file system clients work with: an entry tree held in memory
//! together with a current directory and a fixed case-folding rule.

use std::sync::Arc;

use regex::Regex;
use tracing::debug;

use super::entry::{
    DirNode, DirectoryEntry, Entry, EntryType, FileEntry, FileNode, Node, SymlinkEntry,
    SymlinkNode,
};
use super::tree::{self, Resolved, WalkOptions};
use crate::core::{CaseSensitivity, DEFAULT_MAX_SYMLINK_HOPS, Result, VfsError, VfsOptions};
use crate::vpath;

/// Immediate children of a directory partitioned by kind, each list in listing order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FileSystemEntries {
    pub files: Vec<String>,
    pub directories: Vec<String>,
}

/// Options of [`VirtualFileSystem::get_files`] and [`VirtualFileSystem::get_directories`].
#[derive(Debug, Default, Clone)]
pub struct ListOptions {
    /// Walk the whole subtree instead of one level. Default: `false`.
    pub recursive: bool,

    /// Only names matching this expression are emitted. Directories are still descended into.
    pub pattern: Option<Regex>,

    /// Emit paths qualified from the enumeration root instead of bare names. Default: `false`.
    pub qualified: bool,
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn pattern(mut self, pattern: Regex) -> Self {
        self.pattern = Some(pattern);
        self
    }

    pub fn qualified(mut self, qualified: bool) -> Self {
        self.qualified = qualified;
        self
    }

    fn matches(&self, name: &str) -> bool {
        self.pattern.as_ref().is_none_or(|pattern| pattern.is_match(name))
    }
}

/// An in-memory file system used to sandbox file lookups without touching the disk.
///
/// ### Internal state
///
/// * `root`: the root directory `/`. Children are shared with every clone of this instance
///   and copied only along the path a write touches.
/// * `case`: the name comparison rule, fixed for the lifetime of the instance.
/// * `cwd`: absolute normalized path used to resolve relative inputs. Default: `/`.
/// * `readonly`: set by [`make_readonly`](Self::make_readonly); every write then fails.
///
/// ### Invariants
///
/// 1. Ownership is a tree: every entry except the root has exactly one parent directory.
///    Symlinks store a target path, never an ownership edge.
/// 2. Names in a directory are unique under the case rule.
/// 3. Parents are never created implicitly by `add_file`, `add_symlink` or `mkdir`.
/// 4. Every path returned is normalized; every listing is ordered under the case rule.
///
/// ### Example
///
/// ```
/// use vfs_sandbox::{CaseSensitivity, VirtualFileSystem};
///
/// let mut fs = VirtualFileSystem::new(CaseSensitivity::Sensitive);
/// fs.mkdir("/src").unwrap();
/// fs.add_file("/src/a.ts", "let x=1;").unwrap();
///
/// let sandbox = fs.clone();
/// fs.add_file("/src/b.ts", "").unwrap();
///
/// assert!(fs.file_exists("/src/b.ts"));
/// assert!(!sandbox.file_exists("/src/b.ts"));
/// ```
#[derive(Debug)]
pub struct VirtualFileSystem {
    root: Arc<DirNode>,
    case: CaseSensitivity,
    cwd: String,
    dir_stack: Vec<String>,
    max_symlink_hops: usize,
    readonly: bool,
}

impl Default for VirtualFileSystem {
    fn default() -> Self {
        Self::new(CaseSensitivity::Sensitive)
    }
}

impl Clone for VirtualFileSystem {
    /// Returns an independent copy that shares every node until one side writes.
    /// The copy is always writable, even when `self` is read-only.
    fn clone(&self) -> Self {
        Self {
            root: Arc::clone(&self.root),
            case: self.case,
            cwd: self.cwd.clone(),
            dir_stack: self.dir_stack.clone(),
            max_symlink_hops: self.max_symlink_hops,
            readonly: false,
        }
    }
}

impl VirtualFileSystem {
    /// Creates an empty file system containing only `/`, with `/` as current directory.
    pub fn new(case: CaseSensitivity) -> Self {
        Self {
            root: Arc::new(DirNode::new("")),
            case,
            cwd: "/".to_string(),
            dir_stack: Vec::new(),
            max_symlink_hops: DEFAULT_MAX_SYMLINK_HOPS,
            readonly: false,
        }
    }

    /// Creates a file system from `options`. The requested current directory is created with
    /// all its ancestors.
    pub fn with_options(options: VfsOptions) -> Result<Self> {
        let cwd = vpath::normalize(&options.cwd);
        if vpath::get_root(&cwd).0 != "/" {
            return Err(VfsError::InvalidPath(format!(
                "current directory must be rooted at /: {}",
                options.cwd
            )));
        }

        let mut fs = Self::new(options.case);
        fs.max_symlink_hops = options.max_symlink_hops;
        fs.mkdirp(&cwd)?;
        fs.change_directory(&cwd)?;
        Ok(fs)
    }

    pub fn case(&self) -> CaseSensitivity {
        self.case
    }

    pub fn ignore_case(&self) -> bool {
        self.case.ignore_case()
    }

    /// Returns current working directory.
    pub fn cwd(&self) -> &str {
        &self.cwd
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    /// Freezes this instance. Clones taken afterwards are writable again.
    pub fn make_readonly(&mut self) {
        self.readonly = true;
    }

    /// Name equality under the case rule of this file system.
    pub fn same_name(&self, a: &str, b: &str) -> bool {
        vpath::equate(a, b, self.ignore_case())
    }

    /// Resolves `path` against the current directory, without touching the tree.
    pub fn resolve_path(&self, path: &str) -> String {
        vpath::remove_trailing_separator(&vpath::resolve(&self.cwd, &[path]))
    }

    fn walk_options(&self, follow_symlinks: bool) -> WalkOptions {
        WalkOptions {
            follow_symlinks,
            ignore_case: self.ignore_case(),
            max_hops: self.max_symlink_hops,
        }
    }

    fn walk(&self, path: &str, follow_symlinks: bool) -> Result<Option<Resolved>> {
        let path = self.resolve_path(path);
        tree::walk(&self.root, &path, self.walk_options(follow_symlinks))
    }

    /// Looks up the entry at `path`.
    ///
    /// Symlinks before the last component are always followed; the last one only when
    /// `follow_symlinks` is set. The returned entry carries its real path.
    ///
    /// # Returns
    /// * `Ok(None)` - nothing exists at `path`.
    /// * `Err(VfsError::SymlinkCycle)` - indirection exceeded the hop bound.
    pub fn get_entry(&self, path: &str, follow_symlinks: bool) -> Result<Option<Entry>> {
        Ok(self
            .walk(path, follow_symlinks)?
            .map(|resolved| resolved.node.into_entry(resolved.path)))
    }

    /// Returns the file at `path`, following symlinks. Any other kind is `None`.
    pub fn get_file(&self, path: &str) -> Result<Option<FileEntry>> {
        match self.get_entry(path, true)? {
            Some(Entry::File(file)) => Ok(Some(file)),
            _ => Ok(None),
        }
    }

    /// Returns the directory at `path`, following symlinks. Any other kind is `None`.
    pub fn get_directory(&self, path: &str) -> Result<Option<DirectoryEntry>> {
        match self.get_entry(path, true)? {
            Some(Entry::Directory(dir)) => Ok(Some(dir)),
            _ => Ok(None),
        }
    }

    /// Checks if anything, including a dangling symlink, exists at `path`.
    pub fn exists(&self, path: &str) -> bool {
        matches!(self.get_entry(path, false), Ok(Some(_)))
    }

    pub fn file_exists(&self, path: &str) -> bool {
        matches!(self.get_entry(path, true), Ok(Some(Entry::File(_))))
    }

    pub fn directory_exists(&self, path: &str) -> bool {
        matches!(self.get_entry(path, true), Ok(Some(Entry::Directory(_))))
    }

    /// Reads the content of the file at `path`.
    ///
    /// Unlike [`get_file`](Self::get_file) this fails on absence (`NotFound`) and on any other
    /// entry kind (`WrongKind`).
    pub fn read_file(&self, path: &str) -> Result<String> {
        match self.get_entry(path, true)? {
            Some(Entry::File(file)) => Ok(file.content().to_string()),
            Some(other) => Err(VfsError::wrong_kind(
                other.path(),
                EntryType::File,
                other.entry_type(),
            )),
            None => Err(VfsError::NotFound(self.resolve_path(path))),
        }
    }

    /// Returns the path of `path` with every symlink replaced by its target.
    pub fn real_path(&self, path: &str) -> Result<String> {
        match self.walk(path, true)? {
            Some(resolved) => Ok(resolved.path),
            None => Err(VfsError::NotFound(self.resolve_path(path))),
        }
    }

    /// Changes the current working directory.
    /// * `path` can be in relative or absolute form, but it must resolve to a directory.
    pub fn change_directory(&mut self, path: &str) -> Result<()> {
        let target = self.resolve_path(path);
        match self.get_entry(&target, true)? {
            Some(Entry::Directory(_)) => {
                debug!("change_directory: path={}", target);
                self.cwd = target;
                Ok(())
            }
            Some(other) => Err(VfsError::wrong_kind(
                target,
                EntryType::Directory,
                other.entry_type(),
            )),
            None => Err(VfsError::NotFound(target)),
        }
    }

    /// Changes directory and remembers the previous one for [`pop_directory`](Self::pop_directory).
    pub fn push_directory(&mut self, path: &str) -> Result<()> {
        let previous = self.cwd.clone();
        self.change_directory(path)?;
        self.dir_stack.push(previous);
        Ok(())
    }

    /// Returns to the most recently pushed directory. `Ok(None)` if the stack is empty.
    pub fn pop_directory(&mut self) -> Result<Option<String>> {
        match self.dir_stack.pop() {
            Some(previous) => {
                self.change_directory(&previous)?;
                Ok(Some(previous))
            }
            None => Ok(None),
        }
    }

    fn ensure_writable(&self, path: &str) -> Result<()> {
        if self.readonly {
            return Err(VfsError::ReadOnly(path.to_string()));
        }
        Ok(())
    }

    /// Splits an absolute path into the real components of its parent directory and the leaf
    /// name. The parent must exist as a directory.
    fn resolve_parent(&self, path: &str) -> Result<(Vec<String>, String)> {
        let mut components = vpath::reduce(&vpath::parse(path));
        if components[0] != "/" {
            return Err(VfsError::InvalidPath(path.to_string()));
        }
        if components.len() < 2 {
            return Err(VfsError::InvalidPath(format!("{path} has no entry name")));
        }
        let leaf = components.pop().unwrap_or_default();
        let parent = vpath::format(&components);

        match self.walk(&parent, true)? {
            Some(Resolved {
                path: real,
                node: Node::Directory(_),
            }) => Ok((vpath::parse(&real), leaf)),
            Some(resolved) => Err(VfsError::wrong_kind(
                resolved.path,
                EntryType::Directory,
                resolved.node.entry_type(),
            )),
            None => Err(VfsError::MissingParent(path.to_string())),
        }
    }

    fn parent_mut(&mut self, parent: &[String], path: &str) -> Result<&mut DirNode> {
        let ignore_case = self.ignore_case();
        tree::dir_mut(&mut self.root, parent, ignore_case)
            .ok_or_else(|| VfsError::MissingParent(path.to_string()))
    }

    /// Creates a file or overwrites an existing one. The file is marked as written.
    ///
    /// # Errors
    /// * `MissingParent` - the parent directory does not exist.
    /// * `NameConflict` - the name is taken by a directory or a symlink.
    /// * `ReadOnly` - the file system is frozen.
    pub fn add_file(&mut self, path: &str, content: impl Into<String>) -> Result<FileEntry> {
        let entry = self.put_file(path, content.into(), true)?;
        debug!("add_file: path={}", entry.path());
        Ok(entry)
    }

    /// Same as [`add_file`](Self::add_file) but leaves the write-mark unset.
    pub(crate) fn seed_file(&mut self, path: &str, content: String) -> Result<FileEntry> {
        self.put_file(path, content, false)
    }

    fn put_file(&mut self, path: &str, content: String, written: bool) -> Result<FileEntry> {
        let path = self.resolve_path(path);
        self.ensure_writable(&path)?;
        let (parent, leaf) = self.resolve_parent(&path)?;
        let ignore_case = self.ignore_case();

        let dir = self.parent_mut(&parent, &path)?;
        let name = match dir.get(&leaf, ignore_case) {
            Some(Node::File(existing)) => existing.name.clone(),
            Some(_) => return Err(VfsError::NameConflict(path)),
            None => leaf,
        };
        let node = Arc::new(FileNode {
            name,
            content,
            written,
        });
        dir.insert(Node::File(Arc::clone(&node)), ignore_case);

        let real = vpath::append_name(&vpath::format(&parent), &node.name);
        Ok(FileEntry::new(real, node))
    }

    /// Creates a symlink at `path` pointing at `target`, or retargets an existing symlink.
    ///
    /// `target` may be absolute or relative to the link's parent directory and does not need
    /// to exist.
    pub fn add_symlink(&mut self, path: &str, target: &str) -> Result<SymlinkEntry> {
        let path = self.resolve_path(path);
        self.ensure_writable(&path)?;
        let target = vpath::normalize(target);
        if target.is_empty() {
            return Err(VfsError::InvalidPath(format!("empty symlink target for {path}")));
        }
        let (parent, leaf) = self.resolve_parent(&path)?;
        let ignore_case = self.ignore_case();

        let dir = self.parent_mut(&parent, &path)?;
        let name = match dir.get(&leaf, ignore_case) {
            Some(Node::Symlink(existing)) => existing.name.clone(),
            Some(_) => return Err(VfsError::NameConflict(path)),
            None => leaf,
        };
        let node = Arc::new(SymlinkNode { name, target });
        dir.insert(Node::Symlink(Arc::clone(&node)), ignore_case);
        debug!("add_symlink: path={} target={}", path, node.target);

        let real = vpath::append_name(&vpath::format(&parent), &node.name);
        Ok(SymlinkEntry::new(real, node))
    }

    /// Creates a single directory. The parent must exist and the name must be free.
    pub fn mkdir(&mut self, path: &str) -> Result<DirectoryEntry> {
        let path = self.resolve_path(path);
        self.ensure_writable(&path)?;
        let (parent, leaf) = self.resolve_parent(&path)?;
        let ignore_case = self.ignore_case();

        let dir = self.parent_mut(&parent, &path)?;
        if dir.get(&leaf, ignore_case).is_some() {
            return Err(VfsError::NameConflict(path));
        }
        let node = Arc::new(DirNode::new(leaf));
        dir.insert(Node::Directory(Arc::clone(&node)), ignore_case);
        debug!("mkdir: path={}", path);

        let real = vpath::append_name(&vpath::format(&parent), &node.name);
        Ok(DirectoryEntry::new(real, node))
    }

    /// Creates a directory and all its missing ancestors. Existing directories are kept.
    pub fn mkdirp(&mut self, path: &str) -> Result<DirectoryEntry> {
        let path = self.resolve_path(path);
        self.ensure_writable(&path)?;
        let components = vpath::reduce(&vpath::parse(&path));
        if components[0] != "/" {
            return Err(VfsError::InvalidPath(path));
        }

        for end in 2..=components.len() {
            let prefix = vpath::format(&components[..end]);
            match self.get_entry(&prefix, true)? {
                Some(Entry::Directory(_)) => {}
                Some(_) => return Err(VfsError::NameConflict(prefix)),
                None => {
                    self.mkdir(&prefix)?;
                }
            }
        }

        self.get_directory(&path)?.ok_or(VfsError::NotFound(path))
    }

    /// Removes the entry at `path`. Directories are removed with their whole subtree; a
    /// symlink is removed itself, never its target.
    pub fn remove(&mut self, path: &str) -> Result<()> {
        let path = self.resolve_path(path);
        self.ensure_writable(&path)?;
        if vpath::parse(&path).len() == 1 {
            return Err(VfsError::InvalidPath("the root cannot be removed".to_string()));
        }
        let (parent, leaf) = self.resolve_parent(&path).map_err(|err| match err {
            VfsError::MissingParent(path) => VfsError::NotFound(path),
            other => other,
        })?;
        let ignore_case = self.ignore_case();

        let dir = self.parent_mut(&parent, &path)?;
        if dir.remove(&leaf, ignore_case).is_none() {
            return Err(VfsError::NotFound(path));
        }
        debug!("remove: path={}", path);
        Ok(())
    }

    /// Lists the immediate children of a directory with the real path it resolved to.
    /// Symlinks are classified by what they point at; dangling or cyclic ones are skipped.
    fn list_entries(&self, path: &str) -> Result<Option<(String, FileSystemEntries)>> {
        let Some(Resolved {
            path: real,
            node: Node::Directory(dir),
        }) = self.walk(path, true)?
        else {
            return Ok(None);
        };

        let mut entries = FileSystemEntries::default();
        for child in dir.children.values() {
            let kind = match child {
                Node::Symlink(_) => {
                    let link = vpath::append_name(&real, child.name());
                    match tree::walk(&self.root, &link, self.walk_options(true)) {
                        Ok(Some(resolved)) => resolved.node.entry_type(),
                        _ => continue,
                    }
                }
                other => other.entry_type(),
            };
            match kind {
                EntryType::File => entries.files.push(child.name().to_string()),
                EntryType::Directory => entries.directories.push(child.name().to_string()),
                EntryType::Symlink => {}
            }
        }
        Ok(Some((real, entries)))
    }

    /// Returns the immediate children of the directory at `path`, partitioned into files and
    /// directories. A path that does not resolve to a directory yields empty lists.
    pub fn get_accessible_file_system_entries(&self, path: &str) -> FileSystemEntries {
        match self.list_entries(path) {
            Ok(Some((_, entries))) => entries,
            Ok(None) => FileSystemEntries::default(),
            Err(err) => {
                debug!("get_accessible_file_system_entries: path={} error={}", path, err);
                FileSystemEntries::default()
            }
        }
    }

    /// Returns the files under `path`. See [`ListOptions`].
    pub fn get_files(&self, path: &str, options: &ListOptions) -> Vec<String> {
        self.enumerate(path, options, EntryType::File)
    }

    /// Returns the directories under `path`. See [`ListOptions`].
    pub fn get_directories(&self, path: &str, options: &ListOptions) -> Vec<String> {
        self.enumerate(path, options, EntryType::Directory)
    }

    fn enumerate(&self, path: &str, options: &ListOptions, kind: EntryType) -> Vec<String> {
        let root = self.resolve_path(path);
        let mut results = Vec::new();
        let mut ancestors = Vec::new();
        self.visit(&root, options, kind, &mut ancestors, &mut results);
        if options.recursive {
            let ignore_case = self.ignore_case();
            results.sort_by(|a, b| vpath::compare(a, b, ignore_case));
        }
        results
    }

    /// Depth-first walk. `ancestors` holds the folded real paths of the directories being
    /// visited, so a symlink leading back into one of them is not descended into.
    fn visit(
        &self,
        path: &str,
        options: &ListOptions,
        kind: EntryType,
        ancestors: &mut Vec<String>,
        results: &mut Vec<String>,
    ) {
        let Ok(Some((real, entries))) = self.list_entries(path) else {
            return;
        };
        let key = vpath::fold(&real, self.ignore_case()).into_owned();
        if ancestors.contains(&key) {
            debug!("skipping directory cycle: path={} real={}", path, real);
            return;
        }
        ancestors.push(key);

        let names = match kind {
            EntryType::File => &entries.files,
            _ => &entries.directories,
        };
        for name in names.iter().filter(|name| options.matches(name)) {
            results.push(if options.qualified {
                vpath::append_name(path, name)
            } else {
                name.clone()
            });
        }

        if options.recursive {
            for dir in &entries.directories {
                let child = vpath::append_name(path, dir);
                self.visit(&child, options, kind, ancestors, results);
            }
        }
        ancestors.pop();
    }

    /// Real paths of every file written since the tree was seeded, in tree order.
    /// Symlinks are not followed.
    pub fn written_files(&self) -> Vec<String> {
        fn collect(dir: &DirNode, path: &str, out: &mut Vec<String>) {
            for child in dir.children.values() {
                match child {
                    Node::File(file) if file.written => {
                        out.push(vpath::append_name(path, &file.name));
                    }
                    Node::Directory(sub) => {
                        collect(sub, &vpath::append_name(path, &sub.name), out);
                    }
                    _ => {}
                }
            }
        }

        let mut out = Vec::new();
        collect(&self.root, "/", &mut out);
        out
    }
}
