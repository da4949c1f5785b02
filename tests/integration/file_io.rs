//! File reads and writes across chunk boundaries

use super::test_utils::{assert_file_at_path, random_bytes};
use mfs::importer::cat;
use mfs::{
    noop_publish, DagNode, Filesystem, ImportOptions, MemoryNodeStore, MemoryPinner, MfsError,
    NodeStore, Root,
};
use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::Arc;

/// Small chunks so even modest files span several levels of branch nodes
fn chunked_root() -> (Filesystem, Arc<Root>) {
    let fs = Filesystem::with_options(
        Arc::new(MemoryNodeStore::new()),
        Arc::new(MemoryPinner::new()),
        ImportOptions {
            chunk_size: 64,
            max_links: 4,
        },
    );
    let root = fs
        .new_root("io", DagNode::empty_directory(), noop_publish())
        .unwrap();
    (fs, root)
}

#[test]
fn test_large_file_round_trip() {
    let (fs, root) = chunked_root();
    let dir = root.root_dir();
    let data = random_bytes(10, 10_000);

    let file = dir.create_file("big").unwrap();
    file.write(&data).unwrap();
    let key = file.flush().unwrap();

    let node = fs.store().get(&key).unwrap();
    assert_eq!(node.file_size(), Some(10_000));
    assert_eq!(cat(fs.store().as_ref(), &node).unwrap(), data);
    assert_file_at_path(&dir, "big", &data);
}

#[test]
fn test_random_access_on_stored_file() {
    let (fs, root) = chunked_root();
    let data = random_bytes(12, 5_000);
    let file = root.root_dir().create_file("f").unwrap();
    file.write(&data).unwrap();
    let key = root.flush().unwrap();

    // Reopen through a second root so the file is read lazily from the store
    let node = fs.store().get(&key).unwrap();
    let copy = fs.new_root("copy", node, noop_publish()).unwrap();
    let stored = copy.root_dir().child("f").unwrap().into_file().unwrap();
    assert!(!stored.is_dirty());

    for (offset, len) in [(0u64, 10usize), (63, 2), (64, 64), (1_000, 700), (4_990, 50)] {
        let mut buf = vec![0u8; len];
        let n = stored.read_at(&mut buf, offset).unwrap();
        let end = (offset as usize + len).min(data.len());
        assert_eq!(n, end - offset as usize);
        assert_eq!(&buf[..n], &data[offset as usize..end]);
    }

    let mut past_end = [0u8; 8];
    assert_eq!(stored.read_at(&mut past_end, 6_000).unwrap(), 0);
}

#[test]
fn test_overwrite_middle_of_stored_file() {
    let (_fs, root) = chunked_root();
    let dir = root.root_dir();
    let mut expected = random_bytes(13, 1_000);
    let file = dir.create_file("f").unwrap();
    file.write(&expected).unwrap();
    let k1 = root.flush().unwrap();

    let patch = random_bytes(14, 100);
    file.write_at(&patch, 450).unwrap();
    expected[450..550].copy_from_slice(&patch);
    assert_eq!(file.size().unwrap(), 1_000);

    let k2 = root.flush().unwrap();
    assert_ne!(k1, k2);
    assert_file_at_path(&dir, "f", &expected);
}

#[test]
fn test_append_via_seek_end() {
    let (_fs, root) = chunked_root();
    let file = root.root_dir().create_file("log").unwrap();
    file.write(b"first line\n").unwrap();
    file.flush().unwrap();

    file.seek(SeekFrom::End(0)).unwrap();
    file.write(b"second line\n").unwrap();
    file.seek(SeekFrom::Start(0)).unwrap();
    assert_eq!(file.read_to_end().unwrap(), b"first line\nsecond line\n");
}

#[test]
fn test_truncate_stored_file() {
    let (_fs, root) = chunked_root();
    let dir = root.root_dir();
    let data = random_bytes(15, 2_000);
    let file = dir.create_file("f").unwrap();
    file.write(&data).unwrap();
    root.flush().unwrap();

    file.truncate(100).unwrap();
    root.flush().unwrap();
    assert_file_at_path(&dir, "f", &data[..100]);

    file.truncate(0).unwrap();
    root.flush().unwrap();
    assert_eq!(file.key(), Some(DagNode::file_leaf(Vec::new()).key().unwrap()));
    assert_file_at_path(&dir, "f", b"");
}

#[test]
fn test_std_io_traits() {
    let (_fs, root) = chunked_root();
    let file = root.root_dir().create_file("f").unwrap();

    let mut handle = &*file;
    writeln!(handle, "hello {}", "world").unwrap();
    Write::flush(&mut handle).unwrap();
    Seek::seek(&mut handle, SeekFrom::Start(6)).unwrap();
    let mut rest = String::new();
    handle.read_to_string(&mut rest).unwrap();
    assert_eq!(rest, "world\n");

    let err = Seek::seek(&mut handle, SeekFrom::Current(-100)).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
}

#[test]
fn test_closed_handle() {
    let (_fs, root) = chunked_root();
    let dir = root.root_dir();
    let file = dir.create_file("f").unwrap();
    file.write(b"final").unwrap();
    let key = file.close().unwrap();

    assert!(matches!(file.write(b"more"), Err(MfsError::Closed(_))));
    assert!(matches!(file.size(), Err(MfsError::Closed(_))));
    let fresh = dir.child("f").unwrap().into_file().unwrap();
    assert_eq!(fresh.key(), Some(key));
    assert_eq!(fresh.read_to_end().unwrap(), b"final");
}
