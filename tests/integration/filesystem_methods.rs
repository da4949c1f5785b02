//! Root registry behaviour

use super::test_utils::{assert_file_at_path, FlakyStore};
use mfs::{
    noop_publish, DagNode, Filesystem, MemoryNodeStore, MemoryPinner, MfsError, NodeStore, Pinner,
};
use std::sync::Arc;

fn filesystem() -> Filesystem {
    Filesystem::new(
        Arc::new(MemoryNodeStore::new()),
        Arc::new(MemoryPinner::new()),
    )
}

#[test]
fn test_filesystem_methods() {
    let fs = filesystem();
    let empty = DagNode::empty_directory();
    let empty_key = empty.key().unwrap();

    for name in ["a", "b", "c", "d", "e"] {
        fs.new_root(name, empty.clone(), noop_publish()).unwrap();
    }
    assert!(matches!(
        fs.new_root("a", empty.clone(), noop_publish()),
        Err(MfsError::AlreadyExists(_))
    ));

    let names: Vec<String> = fs.list_roots().iter().map(|root| root.name().to_string()).collect();
    assert_eq!(names, vec!["a", "b", "c", "d", "e"]);

    assert_eq!(fs.close_root("b").unwrap(), empty_key);
    assert!(matches!(fs.close_root("NOTREAL"), Err(MfsError::NotFound(_))));
    assert!(matches!(fs.get_root("b"), Err(MfsError::NotFound(_))));
    assert_eq!(fs.list_roots().len(), 4);

    // The name is free again
    fs.new_root("b", empty, noop_publish()).unwrap();
    assert_eq!(fs.list_roots().len(), 5);
}

#[test]
fn test_new_root_rejects_file_node() {
    let fs = filesystem();
    let result = fs.new_root("file", DagNode::file_leaf(b"x".to_vec()), noop_publish());
    assert!(matches!(result, Err(MfsError::WrongType { .. })));
    assert!(fs.list_roots().is_empty());
}

#[test]
fn test_get_root_shares_handle() {
    let fs = filesystem();
    let root = fs
        .new_root("home", DagNode::empty_directory(), noop_publish())
        .unwrap();
    root.root_dir().create_file("f").unwrap().write(b"abc").unwrap();

    let again = fs.get_root("home").unwrap();
    assert!(Arc::ptr_eq(&root, &again));
    assert_file_at_path(&again.root_dir(), "f", b"abc");
}

#[test]
fn test_close_root_flushes_and_closes() {
    let fs = filesystem();
    let root = fs
        .new_root("work", DagNode::empty_directory(), noop_publish())
        .unwrap();
    let dir = root.root_dir();
    dir.mkdir("pending").unwrap();

    let key = fs.close_root("work").unwrap();
    assert_ne!(key, DagNode::empty_directory().key().unwrap());
    assert!(fs.store().has(&key).unwrap());
    assert!(root.is_closed());
    assert!(matches!(dir.mkdir("late"), Err(MfsError::Closed(_))));
    assert!(matches!(dir.names(), Err(MfsError::Closed(_))));
}

#[test]
fn test_close_root_keeps_root_on_store_failure() {
    let store = FlakyStore::new();
    let fs = Filesystem::new(store.clone(), Arc::new(MemoryPinner::new()));
    let root = fs
        .new_root("fragile", DagNode::empty_directory(), noop_publish())
        .unwrap();
    root.root_dir().mkdir("unsaved").unwrap();

    store.set_offline(true);
    assert!(matches!(
        fs.close_root("fragile"),
        Err(MfsError::StoreUnavailable(_))
    ));
    assert!(!root.is_closed());
    assert!(fs.get_root("fragile").is_ok());

    store.set_offline(false);
    let key = fs.close_root("fragile").unwrap();
    assert_eq!(root.key(), key);
}

#[test]
fn test_roots_hold_independent_pins() {
    let fs = filesystem();
    let empty = DagNode::empty_directory();
    let empty_key = empty.key().unwrap();
    let a = fs.new_root("a", empty.clone(), noop_publish()).unwrap();
    fs.new_root("b", empty, noop_publish()).unwrap();

    a.root_dir().mkdir("changed").unwrap();
    a.flush().unwrap();

    // "b" still pins the empty directory
    let pinner = fs.pinner();
    assert!(pinner.is_pinned(&empty_key).unwrap());
    assert!(pinner.is_pinned(&a.key()).unwrap());
}

#[test]
fn test_close_all_keeps_roots_on_store_failure() {
    let store = FlakyStore::new();
    let fs = Filesystem::new(store.clone(), Arc::new(MemoryPinner::new()));
    let a = fs
        .new_root("a", DagNode::empty_directory(), noop_publish())
        .unwrap();
    a.root_dir().mkdir("pending").unwrap();

    store.set_offline(true);
    assert!(matches!(fs.close(), Err(MfsError::StoreUnavailable(_))));
    assert!(!a.is_closed());
    assert!(a.root_dir().is_dirty());
    assert!(Arc::ptr_eq(&fs.get_root("a").unwrap(), &a));

    store.set_offline(false);
    fs.close().unwrap();
    assert!(a.is_closed());
    assert!(fs.list_roots().is_empty());
    let node = fs.store().get(&a.key()).unwrap();
    assert_eq!(node.links()[0].name, "pending");
}
