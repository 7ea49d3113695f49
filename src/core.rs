mod error;
mod options;

pub use error::{Result, VfsError};
pub use options::{DEFAULT_MAX_SYMLINK_HOPS, VfsOptions};

/// Name comparison policy of a file system instance.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CaseSensitivity {
    Sensitive,
    Insensitive,
}

impl CaseSensitivity {
    pub fn from_ignore_case(ignore_case: bool) -> Self {
        if ignore_case {
            Self::Insensitive
        } else {
            Self::Sensitive
        }
    }

    pub fn ignore_case(self) -> bool {
        self == Self::Insensitive
    }
}

/// Lists the immediate children of a host directory, partitioned by kind.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct HostListing {
    pub files: Vec<String>,
    pub directories: Vec<String>,
}

/// Read access to a real storage that a baseline snapshot is seeded from.
///
/// The file system never calls this after a baseline is built.
pub trait BaselineSource {
    /// Returns the decoded text of the file at `path`, or `None` if it does not exist.
    fn read_text(&self, path: &std::path::Path) -> anyhow::Result<Option<String>>;

    /// Lists the immediate children of the directory at `path`.
    fn read_dir(&self, path: &std::path::Path) -> anyhow::Result<HostListing>;

    /// Returns an identity shared by every path that reaches the same directory.
    ///
    /// Seeding compares identities to notice a directory that contains itself through a host
    /// link. The default is the path unchanged, which suits sources without links.
    fn canonicalize(&self, path: &std::path::Path) -> anyhow::Result<std::path::PathBuf> {
        Ok(path.to_path_buf())
    }
}
