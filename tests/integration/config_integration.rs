//! Integration tests for Configuration System

use super::test_utils::with_env;
use mfs::config::{write_config_file, DatastoreKind, MfsConfig};
use mfs::{noop_publish, ConfigLoader, DagNode, Filesystem, MfsError, NodeStore};
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_load_from_file_fills_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("partial.toml");

    std::fs::write(
        &config_file,
        r#"
[datastore]
kind = "memory"

[import]
chunk_size = 1024
"#,
    )
    .unwrap();

    let config = ConfigLoader::load_from_file(&config_file).unwrap();
    assert_eq!(config.datastore.kind, DatastoreKind::Memory);
    assert_eq!(config.import.chunk_size, 1024);
    assert_eq!(config.import.max_links, MfsConfig::default().import.max_links);
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_load_from_file_rejects_invalid_values() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("bad.toml");

    std::fs::write(
        &config_file,
        r#"
[import]
chunk_size = 0
"#,
    )
    .unwrap();
    assert!(matches!(
        ConfigLoader::load_from_file(&config_file),
        Err(MfsError::ConfigError(_))
    ));

    std::fs::write(
        &config_file,
        r#"
[logging]
format = "xml"
"#,
    )
    .unwrap();
    assert!(ConfigLoader::load_from_file(&config_file).is_err());
}

#[test]
fn test_missing_file_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let result = ConfigLoader::load_from_file(&temp_dir.path().join("absent.toml"));
    assert!(matches!(result, Err(MfsError::ConfigError(_))));
}

#[test]
fn test_written_config_round_trips() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");

    let mut config = MfsConfig::default();
    config.datastore.path = PathBuf::from("/srv/mfs/datastore");
    config.import.max_links = 16;
    config.logging.format = "json".to_string();
    config
        .logging
        .modules
        .insert("mfs".to_string(), "trace".to_string());
    write_config_file(&path, &config).unwrap();

    assert_eq!(ConfigLoader::load_from_file(&path).unwrap(), config);
}

#[test]
fn test_layered_sources() {
    let temp_dir = TempDir::new().unwrap();
    let repo = temp_dir.path().join("repo");
    std::fs::create_dir_all(&repo).unwrap();

    with_env(&temp_dir, &[], || {
        let global = ConfigLoader::global_config_path().unwrap();
        std::fs::create_dir_all(global.parent().unwrap()).unwrap();
        std::fs::write(
            &global,
            r#"
[import]
chunk_size = 2048
max_links = 8

[logging]
level = "warn"
"#,
        )
        .unwrap();
        std::fs::write(
            ConfigLoader::repo_config_path(&repo),
            r#"
[import]
max_links = 32
"#,
        )
        .unwrap();

        let config = ConfigLoader::load(&repo).unwrap();
        // Repo file wins where both set a key, global fills the rest
        assert_eq!(config.import.chunk_size, 2048);
        assert_eq!(config.import.max_links, 32);
        assert_eq!(config.logging.level, "warn");
    });
}

#[test]
fn test_environment_overrides_files() {
    let temp_dir = TempDir::new().unwrap();
    let repo = temp_dir.path().join("repo");
    std::fs::create_dir_all(&repo).unwrap();
    std::fs::write(
        ConfigLoader::repo_config_path(&repo),
        r#"
[import]
chunk_size = 4096
"#,
    )
    .unwrap();

    let config = with_env(
        &temp_dir,
        &[
            ("MFS__IMPORT__CHUNK_SIZE", "512"),
            ("MFS__DATASTORE__KIND", "memory"),
        ],
        || ConfigLoader::load(&repo).unwrap(),
    );
    assert_eq!(config.import.chunk_size, 512);
    assert_eq!(config.datastore.kind, DatastoreKind::Memory);
}

#[test]
fn test_defaults_without_any_file() {
    let temp_dir = TempDir::new().unwrap();
    let repo = temp_dir.path().join("empty-repo");
    std::fs::create_dir_all(&repo).unwrap();

    let config = with_env(&temp_dir, &[], || ConfigLoader::load(&repo).unwrap());
    let defaults = MfsConfig::default();
    assert_eq!(config.datastore.kind, defaults.datastore.kind);
    assert_eq!(config.import, defaults.import);
}

#[test]
fn test_filesystem_uses_configured_chunking() {
    let mut config = MfsConfig::in_memory();
    config.import.chunk_size = 10;
    config.import.max_links = 2;

    let fs = Filesystem::from_config(&config).unwrap();
    let root = fs
        .new_root("chunked", DagNode::empty_directory(), noop_publish())
        .unwrap();
    let file = root.root_dir().create_file("f").unwrap();
    file.write(&[5u8; 95]).unwrap();
    let key = file.flush().unwrap();

    let node = fs.store().get(&key).unwrap();
    assert_eq!(node.file_size(), Some(95));
    assert_eq!(node.links().len(), 2);
}
