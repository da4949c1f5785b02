//! Path-based operations on a directory tree
//!
//! Paths are `/`-separated and relative to the directory passed in. Leading,
//! trailing and repeated separators are ignored, so `/` and `` both name the
//! directory itself.

use crate::dag::DagNode;
use crate::error::MfsError;
use crate::mfs::{Directory, FsNode};
use std::sync::Arc;
use tracing::debug;

/// Split a path into components
pub fn split_path(path: &str) -> Result<Vec<&str>, MfsError> {
    let parts: Vec<&str> = path.split('/').filter(|part| !part.is_empty()).collect();
    if let Some(bad) = parts.iter().find(|part| **part == "." || **part == "..") {
        return Err(MfsError::InvalidPath(format!(
            "{} (relative component {:?})",
            path, bad
        )));
    }
    Ok(parts)
}

/// Split into the parent components and the final name
fn split_parent(path: &str) -> Result<(Vec<&str>, &str), MfsError> {
    let mut parts = split_path(path)?;
    let name = parts
        .pop()
        .ok_or_else(|| MfsError::InvalidPath(format!("{:?} names the root", path)))?;
    Ok((parts, name))
}

fn walk(dir: &Arc<Directory>, parts: &[&str]) -> Result<FsNode, MfsError> {
    let mut current = FsNode::Directory(dir.clone());
    for part in parts {
        current = current.as_directory()?.child(part)?;
    }
    Ok(current)
}

/// Resolve `path` below `dir`
///
/// Fails with `WrongType` if an intermediate component is a file.
pub fn lookup(dir: &Arc<Directory>, path: &str) -> Result<FsNode, MfsError> {
    walk(dir, &split_path(path)?)
}

/// Resolve `path` to a directory
pub fn lookup_dir(dir: &Arc<Directory>, path: &str) -> Result<Arc<Directory>, MfsError> {
    lookup(dir, path)?.into_directory()
}

/// Create the directory at `path`
///
/// With `parents`, missing intermediate directories are created and an existing
/// directory at `path` is accepted.
pub fn mkdir(dir: &Arc<Directory>, path: &str, parents: bool) -> Result<Arc<Directory>, MfsError> {
    let parts = split_path(path)?;
    let Some((name, intermediate)) = parts.split_last() else {
        if parents {
            return Ok(dir.clone());
        }
        return Err(MfsError::AlreadyExists("/".to_string()));
    };

    let mut current = dir.clone();
    for (depth, part) in intermediate.iter().enumerate() {
        current = match current.child(part) {
            Ok(node) => node.into_directory()?,
            Err(MfsError::NotFound(_)) if parents => current.mkdir(part)?,
            Err(MfsError::NotFound(_)) => {
                return Err(MfsError::NotFound(intermediate[..=depth].join("/")));
            }
            Err(e) => return Err(e),
        };
    }

    match current.mkdir(name) {
        Ok(created) => {
            debug!(path, "Created directory path");
            Ok(created)
        }
        Err(MfsError::AlreadyExists(_)) if parents => current.child(name)?.into_directory(),
        Err(e) => Err(e),
    }
}

/// Bind `node` at `path`; the parent directory must exist
pub fn put_node(dir: &Arc<Directory>, path: &str, node: DagNode) -> Result<(), MfsError> {
    let (parent, name) = split_parent(path)?;
    walk(dir, &parent)?.into_directory()?.add_child(name, node)
}

/// Remove whatever is bound at `path`
pub fn rm(dir: &Arc<Directory>, path: &str) -> Result<(), MfsError> {
    let (parent, name) = split_parent(path)?;
    walk(dir, &parent)?.into_directory()?.unlink(name)
}

/// Move `src` to `dst`
///
/// If `dst` is an existing directory the source keeps its name inside it,
/// otherwise it is renamed to `dst`. An existing file at `dst` is never replaced.
pub fn mv(dir: &Arc<Directory>, src: &str, dst: &str) -> Result<(), MfsError> {
    let (src_parent_parts, src_name) = split_parent(src)?;
    let src_parts = split_path(src)?;
    let dst_parts = split_path(dst)?;
    if dst_parts == src_parts {
        return Ok(());
    }
    if dst_parts.starts_with(&src_parts) {
        return Err(MfsError::InvalidArgument(format!(
            "Cannot move {} into itself ({})",
            src, dst
        )));
    }

    let src_parent = walk(dir, &src_parent_parts)?.into_directory()?;
    let node = src_parent.child(src_name)?.get_node()?;

    let (dst_dir, dst_name) = match walk(dir, &dst_parts) {
        Ok(FsNode::Directory(target)) => (target, src_name),
        Ok(FsNode::File(_)) => return Err(MfsError::AlreadyExists(dst.to_string())),
        Err(MfsError::NotFound(_)) => {
            let (parent, name) = split_parent(dst)?;
            (walk(dir, &parent)?.into_directory()?, name)
        }
        Err(e) => return Err(e),
    };

    if Arc::ptr_eq(&dst_dir, &src_parent) && dst_name == src_name {
        return Ok(());
    }
    dst_dir.add_child(dst_name, node)?;
    src_parent.unlink(src_name)?;
    debug!(src, dst, "Moved node");
    Ok(())
}
