//! Error types for the virtual file system.
//!
//! Read-style queries never produce these for a missing entry; they are reserved for writes,
//! assertions and resolution failures that indicate a caller bug.

use thiserror::Error;

use crate::EntryType;

/// Result type alias using [`VfsError`].
pub type Result<T> = std::result::Result<T, VfsError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VfsError {
    /// No entry at the resolved path.
    #[error("{0} does not exist")]
    NotFound(String),

    /// An entry exists but has another kind than the operation requires.
    #[error("{path} is a {found}, expected a {expected}")]
    WrongKind {
        path: String,
        expected: EntryType,
        found: EntryType,
    },

    /// Symlink indirection exceeded the configured hop bound.
    #[error("too many levels of symbolic links: {0}")]
    SymlinkCycle(String),

    /// Malformed path, or a relative path where a rooted one is mandatory.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// The leaf name of a write already exists with an incompatible kind.
    #[error("{0} already exists")]
    NameConflict(String),

    /// The parent directory of a write does not exist.
    #[error("parent directory of {0} does not exist")]
    MissingParent(String),

    /// Write attempted on a frozen file system.
    #[error("file system is read-only: {0}")]
    ReadOnly(String),
}

impl VfsError {
    pub fn wrong_kind(path: impl Into<String>, expected: EntryType, found: EntryType) -> Self {
        Self::WrongKind {
            path: path.into(),
            expected,
            found,
        }
    }
}
