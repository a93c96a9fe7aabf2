/*!
 * Integration tests for configuration loading and the file-backed cache
 *
 * These tests verify:
 * - TOML config files round trip and reject unusable values
 * - A cache configured from file survives a "restart" (new store instance)
 * - Schema version bumps invalidate old cache entries
 * - Error categorization and exit codes for the CLI
 */

use chrono::Utc;
use fusion::{
    cache::{is_fresh, CacheMeta, LocalCacheStore},
    config::{CacheBackendKind, FusionConfig},
    error::{ErrorCategory, FusionError, EXIT_FATAL, EXIT_PARTIAL},
};
use fusion_connect::ConnectError;
use fusion_core_entities::Snapshot;
use pretty_assertions::assert_eq;
use std::time::Duration;
use tempfile::TempDir;

fn sample_snapshot() -> Snapshot {
    serde_json::from_value(serde_json::json!({
        "events": [{"event_id": "e1", "created_at": "2024-05-01T10:00:00Z", "severity": "critical"}],
        "assets": [{"asset_id": "a1", "name": "Relay 7", "status": "degraded"}],
        "alerts": [{"alert_id": "al1", "priority": "p1", "status": "open"}]
    }))
    .unwrap()
}

fn file_config(dir: &TempDir) -> FusionConfig {
    let mut config = FusionConfig::default();
    config.cache.backend = CacheBackendKind::File;
    config.cache.dir = Some(dir.path().join("cache"));
    config
}

#[test]
fn test_config_file_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fusion.toml");

    let mut config = file_config(&dir);
    config.api.base_url = "https://ops.example.com".to_string();
    config.sync.snapshot_interval_secs = 60;
    config.to_file(&path).unwrap();

    let loaded = FusionConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_partial_config_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fusion.toml");
    std::fs::write(
        &path,
        r#"
[api]
base_url = "http://10.0.0.5:8000"

[cache]
ttl_ms = 30000
"#,
    )
    .unwrap();

    let config = FusionConfig::load(&path).unwrap();
    assert_eq!(config.api.base_url, "http://10.0.0.5:8000");
    assert_eq!(config.cache.ttl(), Duration::from_secs(30));
    assert_eq!(config.sync.snapshot_interval(), Duration::from_secs(120));
    assert_eq!(config.sync.health_interval(), Duration::from_secs(3));
    assert_eq!(config.api.limits.assets, 200);
}

#[test]
fn test_invalid_config_is_fatal() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fusion.toml");
    std::fs::write(&path, "[sync]\nhealth_interval_secs = 0\n").unwrap();

    let err = FusionConfig::load(&path).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Configuration);
    assert_eq!(err.exit_code(), EXIT_FATAL);

    let missing = FusionConfig::load(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(missing, FusionError::Config(_)));
}

#[test]
fn test_file_cache_survives_restart() {
    let dir = TempDir::new().unwrap();
    let config = file_config(&dir);

    let meta = LocalCacheStore::from_config(&config.cache)
        .save(&sample_snapshot())
        .unwrap();
    assert!(meta.saved_time().is_some());

    // a new store instance reads what the previous one wrote
    let reopened = LocalCacheStore::from_config(&config.cache);
    let cached = reopened.load().expect("cache present");

    assert_eq!(cached.snapshot, sample_snapshot());
    assert!(is_fresh(Some(&cached.meta), config.cache.ttl()));
    assert!(dir.path().join("cache").join("fusion.v1.meta.json").exists());
}

#[test]
fn test_old_cache_is_stale() {
    let dir = TempDir::new().unwrap();
    let config = file_config(&dir);
    let store = LocalCacheStore::from_config(&config.cache);

    let saved = Utc::now() - chrono::Duration::seconds(91);
    store
        .save_with_meta(&sample_snapshot(), CacheMeta::saved_at(saved))
        .unwrap();

    let cached = store.load().expect("cache present");
    assert!(!is_fresh(Some(&cached.meta), config.cache.ttl()));
}

#[test]
fn test_version_bump_ignores_old_entries() {
    let dir = TempDir::new().unwrap();
    let mut config = file_config(&dir);
    LocalCacheStore::from_config(&config.cache)
        .save(&sample_snapshot())
        .unwrap();

    config.cache.version = "v2".to_string();
    assert!(LocalCacheStore::from_config(&config.cache).load().is_none());
}

#[test]
fn test_clear_removes_cache() {
    let dir = TempDir::new().unwrap();
    let config = file_config(&dir);
    let store = LocalCacheStore::from_config(&config.cache);

    store.save(&sample_snapshot()).unwrap();
    store.clear().unwrap();
    assert!(store.load().is_none());

    // clearing twice is fine
    store.clear().unwrap();
}

#[test]
fn test_connect_error_exit_codes() {
    let transient: FusionError = ConnectError::Status {
        endpoint: "api/health".to_string(),
        status: 503,
        body: String::new(),
    }
    .into();
    assert!(transient.is_transient());
    assert_eq!(transient.exit_code(), EXIT_PARTIAL);
    assert_eq!(transient.category(), ErrorCategory::Network);

    let rejected: FusionError = ConnectError::Status {
        endpoint: "api/admin/scenario".to_string(),
        status: 400,
        body: "unknown scenario".to_string(),
    }
    .into();
    assert_eq!(rejected.exit_code(), EXIT_FATAL);

    let cooldown: FusionError = ConnectError::CooldownActive { remaining_secs: 42 }.into();
    assert_eq!(cooldown.category(), ErrorCategory::Admin);
    assert!(cooldown.to_string().contains("42s"));
}
