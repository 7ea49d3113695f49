//! Symlink-aware resolution over the entry tree.
//!
//! A walk consumes the components of an absolute path one at a time. A symlink found before the
//! last component, or at the last component when following is requested, is replaced by its
//! target (resolved against the link's real parent) and the walk restarts from the root with
//! the remaining components appended. Every replacement counts as one hop.

use std::sync::Arc;

use tracing::{trace, warn};

use super::entry::{DirNode, Node};
use crate::core::{Result, VfsError};
use crate::vpath;

/// The outcome of a successful walk.
#[derive(Debug, Clone)]
pub(crate) struct Resolved {
    /// Path of the entry with every symlink replaced by its target, in stored name case.
    pub(crate) path: String,
    pub(crate) node: Node,
}

#[derive(Debug, Copy, Clone)]
pub(crate) struct WalkOptions {
    pub(crate) follow_symlinks: bool,
    pub(crate) ignore_case: bool,
    pub(crate) max_hops: usize,
}

/// Resolves `path` starting at `root`.
///
/// `path` must be rooted at `/`; anything else has no entry in this tree. Absence is `Ok(None)`,
/// exceeding the hop bound is `SymlinkCycle`.
pub(crate) fn walk(root: &Arc<DirNode>, path: &str, options: WalkOptions) -> Result<Option<Resolved>> {
    let mut components = vpath::reduce(&vpath::parse(path));
    if components.first().map(String::as_str) != Some("/") {
        return Ok(None);
    }

    let mut hops = 0;
    'restart: loop {
        let mut current = Node::Directory(Arc::clone(root));
        let mut real = vec!["/".to_string()];

        for step in 1..components.len() {
            let child = match &current {
                Node::Directory(dir) => dir.get(&components[step], options.ignore_case).cloned(),
                _ => None,
            };
            let Some(child) = child else {
                return Ok(None);
            };

            if let Node::Symlink(link) = &child {
                let last = step == components.len() - 1;
                if !last || options.follow_symlinks {
                    hops += 1;
                    if hops > options.max_hops {
                        warn!("symlink hop bound exceeded: path={}", path);
                        return Err(VfsError::SymlinkCycle(path.to_string()));
                    }

                    let parent = vpath::format(&real);
                    let target = vpath::resolve(&parent, &[link.target.as_str()]);
                    trace!("symlink hop: link={}/{} target={}", parent, link.name, target);

                    let mut spliced = vpath::reduce(&vpath::parse(&target));
                    if spliced.first().map(String::as_str) != Some("/") {
                        return Ok(None);
                    }
                    spliced.extend_from_slice(&components[step + 1..]);
                    components = spliced;
                    continue 'restart;
                }
            }

            real.push(child.name().to_string());
            current = child;
        }

        return Ok(Some(Resolved {
            path: vpath::format(&real),
            node: current,
        }));
    }
}

/// Mutable access to the directory at `real` (root first, no symlinks), copying every shared
/// node on the way down.
pub(crate) fn dir_mut<'a>(
    root: &'a mut Arc<DirNode>,
    real: &[String],
    ignore_case: bool,
) -> Option<&'a mut DirNode> {
    let mut dir = Arc::make_mut(root);
    for name in real.iter().skip(1) {
        dir = match dir.get_mut(name, ignore_case) {
            Some(Node::Directory(child)) => Arc::make_mut(child),
            _ => return None,
        };
    }
    Some(dir)
}
