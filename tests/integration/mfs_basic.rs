//! Tree building, lookup and reload through the public API

use super::test_utils::{
    assert_dir_at_path, assert_file_at_path, mkdir_p, random_bytes, setup_fs_and_root,
};
use mfs::{noop_publish, ops, DagNode, FsNode, MfsError, NodeStore, NodeType};

#[test]
fn test_basic_tree() {
    let (_fs, root) = setup_fs_and_root("basic");
    let dir = root.root_dir();

    let deep = mkdir_p(&dir, "a/b/c/d/e/f/g");
    let data = random_bytes(1, 1000);
    let file = deep.create_file("afile").unwrap();
    assert_eq!(file.write(&data).unwrap(), 1000);

    assert_dir_at_path(&dir, "a/b/c/d/e/f/g");
    assert_file_at_path(&dir, "a/b/c/d/e/f/g/afile", &data);

    let key = root.flush().unwrap();
    assert_eq!(root.key(), key);
    assert_file_at_path(&dir, "/a/b/c/d/e/f/g/afile", &data);
}

#[test]
fn test_mkdir_collisions() {
    let (_fs, root) = setup_fs_and_root("collide");
    let dir = root.root_dir();

    dir.mkdir("x").unwrap();
    dir.create_file("y").unwrap();
    assert!(matches!(dir.mkdir("x"), Err(MfsError::AlreadyExists(_))));
    assert!(matches!(dir.mkdir("y"), Err(MfsError::AlreadyExists(_))));
    assert!(matches!(dir.create_file("x"), Err(MfsError::AlreadyExists(_))));
    assert!(matches!(
        dir.add_child("y", DagNode::empty_directory()),
        Err(MfsError::AlreadyExists(_))
    ));
}

#[test]
fn test_add_child_then_write() {
    let (_fs, root) = setup_fs_and_root("adder");
    let dir = root.root_dir();

    let data = random_bytes(2, 500);
    dir.add_child("empty", DagNode::file_leaf(Vec::new())).unwrap();
    let file = dir.child("empty").unwrap().into_file().unwrap();
    assert_eq!(file.size().unwrap(), 0);
    assert_eq!(file.write(&data).unwrap(), data.len());
    file.close().unwrap();

    assert_file_at_path(&dir, "empty", &data);
}

#[test]
fn test_listing_reflects_children() {
    let (_fs, root) = setup_fs_and_root("lister");
    let dir = root.root_dir();

    dir.mkdir("docs").unwrap();
    dir.create_file("notes").unwrap().write(b"12345").unwrap();
    dir.add_child("blob", DagNode::file_leaf(vec![7u8; 32])).unwrap();

    let mut listing = dir.list().unwrap();
    listing.sort_by(|a, b| a.name.cmp(&b.name));
    let summary: Vec<(&str, NodeType, u64)> = listing
        .iter()
        .map(|entry| (entry.name.as_str(), entry.node_type, entry.size))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("blob", NodeType::File, 32),
            ("docs", NodeType::Directory, 0),
            ("notes", NodeType::File, 5),
        ]
    );
}

#[test]
fn test_reload_tree_from_root_key() {
    let (fs, root) = setup_fs_and_root("origin");
    let dir = root.root_dir();
    let data = random_bytes(3, 4096);
    mkdir_p(&dir, "photos/2024")
        .create_file("cat.jpg")
        .unwrap()
        .write(&data)
        .unwrap();
    let key = root.flush().unwrap();

    let node = fs.store().get(&key).unwrap();
    let copy = fs.new_root("copy", node, noop_publish()).unwrap();
    let copy_dir = copy.root_dir();
    assert_eq!(copy.key(), key);
    assert_file_at_path(&copy_dir, "photos/2024/cat.jpg", &data);

    // Editing the copy leaves the original untouched
    ops::rm(&copy_dir, "photos/2024/cat.jpg").unwrap();
    assert_ne!(copy.flush().unwrap(), key);
    assert_file_at_path(&dir, "photos/2024/cat.jpg", &data);
}

#[test]
fn test_identical_trees_share_keys() {
    let (fs, first) = setup_fs_and_root("first");
    let second = fs
        .new_root("second", DagNode::empty_directory(), noop_publish())
        .unwrap();

    for root in [&first, &second] {
        let dir = root.root_dir();
        mkdir_p(&dir, "a/b");
        dir.create_file("f").unwrap().write(b"same bytes").unwrap();
    }
    assert_eq!(first.flush().unwrap(), second.flush().unwrap());
}

#[test]
fn test_move_and_remove() {
    let (_fs, root) = setup_fs_and_root("mover");
    let dir = root.root_dir();
    mkdir_p(&dir, "src/inner");
    dir.child("src")
        .unwrap()
        .into_directory()
        .unwrap()
        .create_file("f")
        .unwrap()
        .write(b"payload")
        .unwrap();
    dir.mkdir("dst").unwrap();

    ops::mv(&dir, "src", "dst").unwrap();
    assert!(matches!(ops::lookup(&dir, "src"), Err(MfsError::NotFound(_))));
    assert_dir_at_path(&dir, "dst/src/inner");
    assert_file_at_path(&dir, "dst/src/f", b"payload");

    ops::rm(&dir, "dst/src").unwrap();
    let dst = assert_dir_at_path(&dir, "dst");
    assert!(dst.names().unwrap().is_empty());
}

#[test]
fn test_unlinked_subtree_no_longer_dirties_parent() {
    let (_fs, root) = setup_fs_and_root("detach");
    let dir = root.root_dir();
    let sub = dir.mkdir("sub").unwrap();
    let key = root.flush().unwrap();

    dir.unlink("sub").unwrap();
    let after_unlink = root.flush().unwrap();
    assert_ne!(after_unlink, key);

    // The detached handle still works but its edits go nowhere
    sub.mkdir("orphan").unwrap();
    assert!(!dir.is_dirty());
    assert_eq!(root.flush().unwrap(), after_unlink);
}

#[test]
fn test_get_value_is_root_directory() {
    let (_fs, root) = setup_fs_and_root("value");
    match root.get_value() {
        FsNode::Directory(dir) => assert_eq!(dir.name(), "value"),
        FsNode::File(_) => panic!("Root value must be a directory"),
    }
}
