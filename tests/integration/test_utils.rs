//! Shared test utilities for integration tests
//!
//! Filesystem and root setup, tree assertions, deterministic payloads and a
//! store that can be switched offline. Environment access is serialized because
//! config tests change process-wide variables.

use mfs::{
    noop_publish, DagNode, Directory, Filesystem, FsNode, Key, MemoryNodeStore, MemoryPinner,
    NodeStore, NodeType, Root, StorageError,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Global mutex to serialize environment variable access across all tests
static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Environment variable state to restore after a test
struct EnvState {
    saved: Vec<(String, Option<String>)>,
}

impl EnvState {
    fn capture(names: &[&str]) -> Self {
        Self {
            saved: names
                .iter()
                .map(|name| (name.to_string(), std::env::var(name).ok()))
                .collect(),
        }
    }

    fn restore(self) {
        for (name, value) in self.saved {
            match value {
                Some(value) => std::env::set_var(&name, value),
                None => std::env::remove_var(&name),
            }
        }
    }
}

/// Run `f` with HOME and XDG_CONFIG_HOME pointed into `test_dir` and `vars` set
///
/// The previous environment is restored afterwards, even for variables `f` sets.
pub fn with_env<F, R>(test_dir: &TempDir, vars: &[(&str, &str)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());

    let mut names = vec!["HOME", "XDG_CONFIG_HOME"];
    names.extend(vars.iter().map(|(name, _)| *name));
    let env_state = EnvState::capture(&names);

    let test_home = test_dir.path().join("home");
    let test_config_home = test_dir.path().join("config");
    std::fs::create_dir_all(&test_home).unwrap();
    std::fs::create_dir_all(&test_config_home).unwrap();
    std::env::set_var("HOME", &test_home);
    std::env::set_var("XDG_CONFIG_HOME", &test_config_home);
    for (name, value) in vars {
        std::env::set_var(name, value);
    }

    let result = f();

    env_state.restore();
    result
}

/// An in-memory filesystem plus one root named `name` over an empty directory
pub fn setup_fs_and_root(name: &str) -> (Filesystem, Arc<Root>) {
    let fs = Filesystem::new(
        Arc::new(MemoryNodeStore::new()),
        Arc::new(MemoryPinner::new()),
    );
    let root = fs
        .new_root(name, DagNode::empty_directory(), noop_publish())
        .unwrap();
    (fs, root)
}

/// Create every directory along `path`, returning the last one
pub fn mkdir_p(dir: &Arc<Directory>, path: &str) -> Arc<Directory> {
    mfs::ops::mkdir(dir, path, true).unwrap()
}

/// Walk `path` from `dir` and assert a directory is bound there
pub fn assert_dir_at_path(dir: &Arc<Directory>, path: &str) -> Arc<Directory> {
    let node = mfs::ops::lookup(dir, path)
        .unwrap_or_else(|e| panic!("Lookup of {} failed: {}", path, e));
    assert_eq!(node.node_type(), NodeType::Directory, "{} is not a directory", path);
    node.into_directory().unwrap()
}

/// Walk `path` from `dir` and assert a file with exactly `expected` is bound there
pub fn assert_file_at_path(dir: &Arc<Directory>, path: &str, expected: &[u8]) {
    let node = mfs::ops::lookup(dir, path)
        .unwrap_or_else(|e| panic!("Lookup of {} failed: {}", path, e));
    let file = match node {
        FsNode::File(file) => file,
        FsNode::Directory(_) => panic!("{} is a directory", path),
    };
    file.seek(std::io::SeekFrom::Start(0)).unwrap();
    let actual = file.read_to_end().unwrap();
    assert_eq!(actual.len(), expected.len(), "size of {}", path);
    assert!(actual == expected, "content of {} differs", path);
}

/// Deterministic pseudo-random bytes derived from `seed`
pub fn random_bytes(seed: u64, len: usize) -> Vec<u8> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&seed.to_le_bytes());
    let mut out = vec![0u8; len];
    hasher.finalize_xof().fill(&mut out);
    out
}

/// Store that fails every call while `offline` is set
pub struct FlakyStore {
    pub inner: MemoryNodeStore,
    pub offline: AtomicBool,
    /// Fail only `sync`, leaving reads and writes working
    pub sync_broken: AtomicBool,
    pub syncs: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryNodeStore::new(),
            offline: AtomicBool::new(false),
            sync_broken: AtomicBool::new(false),
            syncs: AtomicUsize::new(0),
        })
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn set_sync_broken(&self, broken: bool) {
        self.sync_broken.store(broken, Ordering::SeqCst);
    }

    pub fn sync_count(&self) -> usize {
        self.syncs.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("store offline".to_string()));
        }
        Ok(())
    }
}

impl NodeStore for FlakyStore {
    fn get(&self, key: &Key) -> Result<DagNode, StorageError> {
        self.check()?;
        self.inner.get(key)
    }

    fn put(&self, node: &DagNode) -> Result<Key, StorageError> {
        self.check()?;
        self.inner.put(node)
    }

    fn has(&self, key: &Key) -> Result<bool, StorageError> {
        self.check()?;
        self.inner.has(key)
    }

    fn sync(&self) -> Result<(), StorageError> {
        self.check()?;
        if self.sync_broken.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("sync failed".to_string()));
        }
        self.syncs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
