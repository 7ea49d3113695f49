mod dir_source;
mod entry;
mod tree;
mod virtual_fs;

pub use dir_source::DirSource;
pub use entry::{DirectoryEntry, Entry, EntryType, FileEntry, SymlinkEntry};
pub use virtual_fs::{FileSystemEntries, ListOptions, VirtualFileSystem};
