//! This module provides the read-only bridge between a real directory on the host and a baseline
//! snapshot. Baseline builds read through it once; afterwards the host is never touched again.
//!
//! ### Key Features:
//! - **Isolated root**: All reads are confined to a designated root directory (self.root).
//! - **Text decoding**: byte order marks are honoured, so UTF-8 and UTF-16 sources land in the
//!   snapshot as plain text.
//! - **Symlink-transparent listing**: host symlinks are classified by their target; dangling ones
//!   are left out.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::{trace, warn};

use crate::core::{BaselineSource, HostListing};

/// A [`BaselineSource`] backed by a real directory.
///
/// Source paths are interpreted relative to `root`. A leading `/` is ignored, and no path may
/// climb above `root`.
///
/// ### Example:
/// ```
/// use std::path::Path;
/// use vfs_sandbox::{BaselineSource, DirSource};
///
/// let tmp = std::env::temp_dir();
/// let source = DirSource::new(&tmp).unwrap();
/// assert!(source.read_text(Path::new("surely/missing.d.ts")).unwrap().is_none());
/// ```
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf, // host-related absolute path
}

impl DirSource {
    /// Creates a source reading below `root`.
    /// * `root` is an absolute host path of an existing directory.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();

        if root.as_os_str().is_empty() {
            return Err(anyhow!("invalid root path: empty"));
        }
        if root.is_relative() {
            return Err(anyhow!("the root path must be absolute"));
        }
        if !root.exists() {
            return Err(anyhow!("{} does not exist", root.display()));
        }
        if !root.is_dir() {
            return Err(anyhow!("{} is not a directory", root.display()));
        }

        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Returns root path related to the host file system.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the host path that matches the source `path`.
    fn to_host(&self, path: &Path) -> Result<PathBuf> {
        let mut inner = PathBuf::new();
        for component in path.components() {
            match component {
                Component::Normal(name) => inner.push(name),
                Component::ParentDir => {
                    if !inner.pop() {
                        return Err(anyhow!("{} escapes the source root", path.display()));
                    }
                }
                Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            }
        }
        Ok(self.root.join(inner))
    }
}

impl BaselineSource for DirSource {
    fn read_text(&self, path: &Path) -> Result<Option<String>> {
        let host = self.to_host(path)?;
        if !host.is_file() {
            return Ok(None);
        }
        trace!("read_text: host={}", host.display());

        let bytes =
            std::fs::read(&host).with_context(|| format!("failed to read {}", host.display()))?;
        Ok(Some(decode_text(&bytes)))
    }

    fn read_dir(&self, path: &Path) -> Result<HostListing> {
        let host = self.to_host(path)?;
        let mut listing = HostListing::default();

        let entries = std::fs::read_dir(&host)
            .with_context(|| format!("failed to list {}", host.display()))?;
        for entry in entries {
            let entry = entry.with_context(|| format!("failed to list {}", host.display()))?;
            let Ok(name) = entry.file_name().into_string() else {
                warn!("skipping non UTF-8 name in {}", host.display());
                continue;
            };
            // metadata() follows symlinks, a dangling link has none
            match std::fs::metadata(entry.path()) {
                Ok(meta) if meta.is_dir() => listing.directories.push(name),
                Ok(meta) if meta.is_file() => listing.files.push(name),
                Ok(_) => {}
                Err(err) => trace!("skipping {}: {}", entry.path().display(), err),
            }
        }

        listing.files.sort();
        listing.directories.sort();
        Ok(listing)
    }
    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        let host = self.to_host(path)?;
        std::fs::canonicalize(&host)
            .with_context(|| format!("failed to canonicalize {}", host.display()))
    }
}

/// Decodes file bytes into text.
///
/// A UTF-8 byte order mark is stripped, UTF-16 (either byte order) is recognized by its mark,
/// anything else is read as UTF-8. Invalid sequences become U+FFFD.
pub(crate) fn decode_text(bytes: &[u8]) -> String {
    match bytes {
        [0xEF, 0xBB, 0xBF, rest @ ..] => String::from_utf8_lossy(rest).into_owned(),
        [0xFF, 0xFE, rest @ ..] => decode_utf16(rest, u16::from_le_bytes),
        [0xFE, 0xFF, rest @ ..] => decode_utf16(rest, u16::from_be_bytes),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> String {
    let units = bytes.chunks(2).map(|pair| match pair {
        [a, b] => unit([*a, *b]),
        _ => 0xFFFD,
    });
    char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}
