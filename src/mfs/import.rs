//! Copy a local file or directory tree into a mutable directory

use crate::dag::{DagNode, Link};
use crate::error::MfsError;
use crate::importer::build_dag_from_reader;
use crate::mfs::{validate_name, Directory};
use crate::types::Key;
use std::collections::HashMap;
use std::fs;
use std::io::BufReader;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use walkdir::{DirEntry, WalkDir};

/// Local walk configuration
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    /// Whether to follow symbolic links (default: false)
    pub follow_symlinks: bool,
    /// Path components to skip (e.g. ".git", "target")
    pub ignore_patterns: Vec<String>,
    /// Maximum depth to traverse (None = unlimited)
    pub max_depth: Option<usize>,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            follow_symlinks: false,
            ignore_patterns: vec![".git".to_string()],
            max_depth: None,
        }
    }
}

impl WalkerConfig {
    fn is_ignored(&self, relative: &Path) -> bool {
        relative.components().any(|component| match component {
            Component::Normal(part) => {
                let part = part.to_string_lossy();
                self.ignore_patterns.iter().any(|pattern| part == pattern.as_str())
            }
            _ => false,
        })
    }
}

/// Import `source` into `dir` under `name`
///
/// Files are chunked into the store; directories become directory nodes. The
/// resulting node is bound with `add_child`, so the usual collision rules apply.
/// Symlinks are skipped unless `follow_symlinks` is set.
#[instrument(skip(dir, config), fields(source = %source.display()))]
pub fn import_local_path(
    dir: &Arc<Directory>,
    name: &str,
    source: &Path,
    config: &WalkerConfig,
) -> Result<Key, MfsError> {
    dir.context().ensure_open()?;
    validate_name(name)?;
    if dir.names()?.iter().any(|existing| existing == name) {
        return Err(MfsError::AlreadyExists(name.to_string()));
    }

    let node = build_local_node(dir, source, config)?;
    let key = node.key()?;
    dir.add_child(name, node)?;
    info!(name, key = %key, "Imported local path");
    Ok(key)
}

fn build_local_node(
    dir: &Arc<Directory>,
    source: &Path,
    config: &WalkerConfig,
) -> Result<DagNode, MfsError> {
    let ctx = dir.context();
    let store = ctx.store.as_ref();

    let walker = WalkDir::new(source)
        .follow_links(config.follow_symlinks)
        .max_depth(config.max_depth.unwrap_or(usize::MAX))
        .contents_first(true)
        .sort_by_file_name();

    // Child links collected per directory; children are visited before parents
    let mut pending: HashMap<PathBuf, Vec<Link>> = HashMap::new();
    let mut root_node = None;

    // Contents-first walks cannot prune with filter_entry without losing the
    // remaining siblings, so ignored paths are dropped here instead
    for entry in walker {
        let entry = entry.map_err(|e| {
            MfsError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Failed to walk {}: {}", source.display(), e),
            ))
        })?;
        let relative = entry.path().strip_prefix(source).unwrap_or(entry.path());
        if config.is_ignored(relative) {
            continue;
        }

        let node = if entry.file_type().is_dir() {
            let links = pending.remove(entry.path()).unwrap_or_default();
            DagNode::directory(links)
        } else if entry.file_type().is_file() {
            let reader = BufReader::new(fs::File::open(entry.path())?);
            let (_, node) = build_dag_from_reader(store, reader, &ctx.options)?;
            node
        } else {
            debug!(path = %entry.path().display(), "Skipping non-regular entry");
            continue;
        };

        if entry.depth() == 0 {
            root_node = Some(node);
            continue;
        }

        let key = store.put(&node)?;
        let link = Link {
            name: entry_name(&entry)?,
            key,
            size: node.cumulative_size()?,
        };
        let parent = entry
            .path()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        pending.entry(parent).or_default().push(link);
    }

    root_node.ok_or_else(|| {
        MfsError::InvalidArgument(format!(
            "{} is not a regular file or directory",
            source.display()
        ))
    })
}

fn entry_name(entry: &DirEntry) -> Result<String, MfsError> {
    entry
        .file_name()
        .to_str()
        .map(str::to_string)
        .ok_or_else(|| MfsError::InvalidName(entry.file_name().to_string_lossy().into_owned()))
}
