//! Config file loading.

use drinkmaster_lib::{DiscoveryConfig, DEFAULT_PORT};

#[test]
fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = DiscoveryConfig::read_file(&dir.path().join("config.json"));
    assert_eq!(cfg, DiscoveryConfig::default());
    assert_eq!(cfg.port, DEFAULT_PORT);
}

#[test]
fn unparsable_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ this is not json").unwrap();
    assert_eq!(DiscoveryConfig::read_file(&path), DiscoveryConfig::default());
}

#[test]
fn written_config_reads_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");
    let cfg = DiscoveryConfig {
        port: 8080,
        fallback_url: Some("http://drinkmaster.local:8080".to_string()),
        hostnames: vec!["bar.local".to_string()],
        concurrency: 8,
        ..Default::default()
    };
    cfg.write_file(&path).unwrap();

    let read = DiscoveryConfig::read_file(&path);
    assert_eq!(read, cfg);
    assert!(read.validate().is_ok());
    assert_eq!(read.fallback().unwrap().unwrap().as_str(), "http://drinkmaster.local:8080");
}

#[test]
fn partial_file_keeps_remaining_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{ "scan_timeout_ms": 400, "common_prefixes": ["172.16.0"] }"#).unwrap();

    let cfg = DiscoveryConfig::read_file(&path);
    assert_eq!(cfg.scan_timeout_ms, 400);
    assert_eq!(cfg.subnet_prefixes().len(), 1);
    assert_eq!(cfg.port, DEFAULT_PORT);
    assert_eq!(cfg.concurrency, 24);
}
