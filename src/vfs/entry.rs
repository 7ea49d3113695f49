use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::vpath;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum EntryType {
    File,
    Directory,
    Symlink,
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntryType::File => "file",
            EntryType::Directory => "directory",
            EntryType::Symlink => "symlink",
        };
        f.write_str(name)
    }
}

/// A node owned by exactly one parent directory.
///
/// Nodes are reference counted so that cloned trees share them until one side writes; every
/// write goes through `Arc::make_mut` on the path from the root to the touched node.
#[derive(Debug, Clone)]
pub(crate) enum Node {
    File(Arc<FileNode>),
    Directory(Arc<DirNode>),
    Symlink(Arc<SymlinkNode>),
}

impl Node {
    pub(crate) fn name(&self) -> &str {
        match self {
            Node::File(file) => &file.name,
            Node::Directory(dir) => &dir.name,
            Node::Symlink(link) => &link.name,
        }
    }

    pub(crate) fn entry_type(&self) -> EntryType {
        match self {
            Node::File(_) => EntryType::File,
            Node::Directory(_) => EntryType::Directory,
            Node::Symlink(_) => EntryType::Symlink,
        }
    }

    pub(crate) fn into_entry(self, path: String) -> Entry {
        match self {
            Node::File(node) => Entry::File(FileEntry::new(path, node)),
            Node::Directory(node) => Entry::Directory(DirectoryEntry::new(path, node)),
            Node::Symlink(node) => Entry::Symlink(SymlinkEntry::new(path, node)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FileNode {
    pub(crate) name: String,
    pub(crate) content: String,
    pub(crate) written: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SymlinkNode {
    pub(crate) name: String,
    pub(crate) target: String,
}

/// Directory children keyed by their case-folded name, so iteration order is the listing order
/// under the active case rule.
#[derive(Debug, Clone, Default)]
pub(crate) struct DirNode {
    pub(crate) name: String,
    pub(crate) children: BTreeMap<String, Node>,
}

impl DirNode {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: BTreeMap::new(),
        }
    }

    fn key(name: &str, ignore_case: bool) -> String {
        vpath::fold(name, ignore_case).into_owned()
    }

    pub(crate) fn get(&self, name: &str, ignore_case: bool) -> Option<&Node> {
        self.children.get(&*vpath::fold(name, ignore_case))
    }

    pub(crate) fn get_mut(&mut self, name: &str, ignore_case: bool) -> Option<&mut Node> {
        self.children.get_mut(&*vpath::fold(name, ignore_case))
    }

    pub(crate) fn insert(&mut self, node: Node, ignore_case: bool) {
        self.children.insert(Self::key(node.name(), ignore_case), node);
    }

    pub(crate) fn remove(&mut self, name: &str, ignore_case: bool) -> Option<Node> {
        self.children.remove(&*vpath::fold(name, ignore_case))
    }
}

/// A resolved entry together with the real path it was found at.
///
/// Entries are snapshots: they share data with the tree they came from and do not observe
/// later writes.
#[derive(Debug, Clone)]
pub enum Entry {
    File(FileEntry),
    Directory(DirectoryEntry),
    Symlink(SymlinkEntry),
}

impl Entry {
    pub fn path(&self) -> &str {
        match self {
            Entry::File(file) => file.path(),
            Entry::Directory(dir) => dir.path(),
            Entry::Symlink(link) => link.path(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Entry::File(file) => file.name(),
            Entry::Directory(dir) => dir.name(),
            Entry::Symlink(link) => link.name(),
        }
    }

    pub fn entry_type(&self) -> EntryType {
        match self {
            Entry::File(_) => EntryType::File,
            Entry::Directory(_) => EntryType::Directory,
            Entry::Symlink(_) => EntryType::Symlink,
        }
    }

    pub fn is_file(&self) -> bool {
        self.entry_type() == EntryType::File
    }

    pub fn is_dir(&self) -> bool {
        self.entry_type() == EntryType::Directory
    }

    pub fn is_symlink(&self) -> bool {
        self.entry_type() == EntryType::Symlink
    }

    pub fn as_file(&self) -> Option<&FileEntry> {
        match self {
            Entry::File(file) => Some(file),
            _ => None,
        }
    }

    pub fn as_dir(&self) -> Option<&DirectoryEntry> {
        match self {
            Entry::Directory(dir) => Some(dir),
            _ => None,
        }
    }

    pub fn as_symlink(&self) -> Option<&SymlinkEntry> {
        match self {
            Entry::Symlink(link) => Some(link),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileEntry {
    path: String,
    node: Arc<FileNode>,
}

impl FileEntry {
    pub(crate) fn new(path: String, node: Arc<FileNode>) -> Self {
        Self { path, node }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.node.name
    }

    pub fn content(&self) -> &str {
        &self.node.content
    }

    /// True if the file was written after its tree was seeded.
    pub fn is_written(&self) -> bool {
        self.node.written
    }
}

#[derive(Debug, Clone)]
pub struct DirectoryEntry {
    path: String,
    node: Arc<DirNode>,
}

impl DirectoryEntry {
    pub(crate) fn new(path: String, node: Arc<DirNode>) -> Self {
        Self { path, node }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.node.name
    }

    /// Child names in listing order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.node.children.values().map(Node::name)
    }

    pub fn len(&self) -> usize {
        self.node.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node.children.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct SymlinkEntry {
    path: String,
    node: Arc<SymlinkNode>,
}

impl SymlinkEntry {
    pub(crate) fn new(path: String, node: Arc<SymlinkNode>) -> Self {
        Self { path, node }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.node.name
    }

    /// The stored target, absolute or relative to the link's parent directory.
    pub fn target(&self) -> &str {
        &self.node.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> Node {
        Node::File(Arc::new(FileNode {
            name: name.to_string(),
            content: String::new(),
            written: false,
        }))
    }

    #[test]
    fn test_children_order_follows_case_rule() {
        let mut sensitive = DirNode::new("");
        let mut insensitive = DirNode::new("");
        for name in ["b.ts", "A.ts", "a2.ts"] {
            sensitive.insert(file(name), false);
            insensitive.insert(file(name), true);
        }

        let names: Vec<_> = sensitive.children.values().map(Node::name).collect();
        assert_eq!(names, vec!["A.ts", "a2.ts", "b.ts"]);

        let names: Vec<_> = insensitive.children.values().map(Node::name).collect();
        assert_eq!(names, vec!["A.ts", "a2.ts", "b.ts"]);
        assert!(insensitive.get("a.TS", true).is_some());
        assert!(sensitive.get("a.TS", false).is_none());
    }

    #[test]
    fn test_insensitive_names_are_unique() {
        let mut dir = DirNode::new("");
        dir.insert(file("Main.ts"), true);
        dir.insert(file("main.ts"), true);
        assert_eq!(dir.children.len(), 1);
        assert_eq!(dir.get("MAIN.TS", true).map(Node::name), Some("main.ts"));
    }

    #[test]
    fn test_entry_view() {
        let entry = file("x.ts").into_entry("/src/x.ts".to_string());
        assert!(entry.is_file());
        assert_eq!(entry.path(), "/src/x.ts");
        assert_eq!(entry.name(), "x.ts");
        assert_eq!(entry.entry_type().to_string(), "file");
        assert!(entry.as_dir().is_none());
    }
}
