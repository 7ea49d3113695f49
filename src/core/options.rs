use crate::CaseSensitivity;

/// Default bound on symlink hops during a single resolution.
pub const DEFAULT_MAX_SYMLINK_HOPS: usize = 40;

/// Construction options for a [`VirtualFileSystem`](crate::VirtualFileSystem).
///
/// # Example
///
/// ```
/// use vfs_sandbox::{VfsOptions, VirtualFileSystem};
///
/// let options = VfsOptions::new().ignore_case(true).max_symlink_hops(8);
/// let fs = VirtualFileSystem::with_options(options).unwrap();
/// assert!(fs.ignore_case());
/// ```
#[derive(Debug, Clone)]
pub struct VfsOptions {
    /// Case-folding rule for name comparison. Default: case-sensitive.
    pub case: CaseSensitivity,

    /// Initial current directory. Must be rooted. Default: `/`.
    pub cwd: String,

    /// Hops allowed before resolution fails with `SymlinkCycle`. Default: 40.
    pub max_symlink_hops: usize,
}

impl Default for VfsOptions {
    fn default() -> Self {
        Self {
            case: CaseSensitivity::Sensitive,
            cwd: "/".to_string(),
            max_symlink_hops: DEFAULT_MAX_SYMLINK_HOPS,
        }
    }
}

impl VfsOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ignore_case(mut self, ignore_case: bool) -> Self {
        self.case = CaseSensitivity::from_ignore_case(ignore_case);
        self
    }

    pub fn case(mut self, case: CaseSensitivity) -> Self {
        self.case = case;
        self
    }

    pub fn cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = cwd.into();
        self
    }

    pub fn max_symlink_hops(mut self, hops: usize) -> Self {
        self.max_symlink_hops = hops;
        self
    }
}
