//! An in-memory virtual file system for sandboxing file lookups.
//! Provides a pure path algebra, a symlink-aware entry tree and cheap copy-on-write clones,
//! so many isolated sandboxes can be derived from one shared baseline.
//!
//! ### Overview
//!
//! `vfs-sandbox` lets tooling that resolves, enumerates and reads files run against a tree held
//! in memory instead of the real disk. A [`BaselineRegistry`] seeds a snapshot once (for example
//! from a [`DirSource`]) and serves clones of it; each clone is mutated and queried through the
//! [`VirtualFileSystem`] facade and then thrown away.
//!
//! **Key ideas**:
//! - **Path algebra**: [`vpath`] parses, normalizes, combines and relativizes `/`-separated
//!   paths with POSIX, drive, UNC and URL roots, without touching any file system.
//! - **Case rule**: each instance compares names case-sensitively or not, fixed at creation.
//! - **Symlinks**: followed transparently while resolving, bounded by a hop limit so cycles
//!   fail with [`VfsError::SymlinkCycle`] instead of looping.
//! - **Isolation**: [`VirtualFileSystem::clone`] is O(1); writes copy only the touched path.
//!
//! ```
//! use vfs_sandbox::{CaseSensitivity, ListOptions, VirtualFileSystem};
//!
//! let mut fs = VirtualFileSystem::new(CaseSensitivity::Insensitive);
//! fs.mkdirp("/src/b").unwrap();
//! fs.add_file("/src/a.ts", "let x=1;").unwrap();
//! fs.add_symlink("/link", "/src").unwrap();
//!
//! assert_eq!(fs.read_file("/LINK/A.TS").unwrap(), "let x=1;");
//!
//! let files = fs.get_files("/", &ListOptions::new().recursive(true).qualified(true));
//! assert_eq!(files, vec!["/link/a.ts", "/src/a.ts"]);
//! ```

mod baseline;
mod core;
mod vfs;
pub mod vpath;

pub use crate::baseline::{BaselineConfig, BaselineRegistry, DEFAULT_BASELINE, Mount};
pub use crate::core::{
    BaselineSource, CaseSensitivity, DEFAULT_MAX_SYMLINK_HOPS, HostListing, Result, VfsError,
    VfsOptions,
};
pub use crate::vfs::{
    DirSource, DirectoryEntry, Entry, EntryType, FileEntry, FileSystemEntries, ListOptions,
    SymlinkEntry, VirtualFileSystem,
};
