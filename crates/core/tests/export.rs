//! JSON dump of the graph and log file setup

use classcache_api::{ClassDescriptor, InterfaceDescriptor, Modifiers};
use classcache_core::ClassCache;
use classcache_core::logging::{default_log_dir, init_logging};
use tempfile::tempdir;

#[test]
fn test_save_to_json() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cache.json");
    let cache = ClassCache::new();
    cache
        .merge(
            ClassDescriptor::observed("b.Impl", "h1", Modifiers::PUBLIC)
                .with_interface(InterfaceDescriptor::placeholder("a.Api"))
                .into(),
        )
        .unwrap();

    cache.save_to_json(&path).unwrap();

    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let nodes = json.as_array().unwrap();
    assert_eq!(nodes.len(), 2);
    let text = json.to_string();
    assert!(text.contains("a.Api"));
    assert!(text.contains("b.Impl"));
    assert!(text.contains("h1"));
}

#[test]
fn test_save_to_missing_directory_fails() {
    let dir = tempdir().unwrap();
    let cache = ClassCache::new();

    let res = cache.save_to_json(dir.path().join("missing").join("cache.json"));

    assert!(matches!(res, Err(classcache_core::ClassCacheError::Io(_))));
}

#[test]
fn test_init_logging_creates_log_file() {
    let dir = tempdir().unwrap();
    let log_dir = dir.path().join("logs");

    let guard = init_logging("classcache-test", &log_dir, false);
    tracing::info!("logging initialized");
    drop(guard);

    let files: Vec<String> = std::fs::read_dir(&log_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    assert!(files.iter().any(|f| f.starts_with("classcache-test")));
}

#[test]
fn test_default_log_dir_under_home() {
    assert!(default_log_dir().ends_with(".classcache/logs"));
}
