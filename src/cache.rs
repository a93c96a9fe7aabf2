/*!
 * Local Cache Store
 *
 * Persists the last successful snapshot so the next start can render
 * immediately. Four string blobs per schema version:
 *
 * ```text
 * {namespace}:{version}:events   JSON array
 * {namespace}:{version}:assets   JSON array
 * {namespace}:{version}:alerts   JSON array
 * {namespace}:{version}:meta     { "savedAt": RFC3339 }   (written last)
 * ```
 *
 * Anything absent, corrupt or written under another version reads as a
 * miss; `load` never fails.
 */

use chrono::{DateTime, SecondsFormat, Utc};
use fusion_core_entities::{parse_timestamp, Alert, Asset, Event, Snapshot};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::config::{CacheBackendKind, CacheConfig};
use crate::error::{FusionError, Result};

/// String blob storage behind the cache
pub trait CacheBackend: Send + Sync + Debug {
    fn get(&self, key: &str) -> io::Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> io::Result<()>;
    fn remove(&self, key: &str) -> io::Result<()>;
}

/// One file per key; writes go through a temp file and an atomic rename
#[derive(Debug, Clone)]
pub struct FileCacheBackend {
    dir: PathBuf,
}

impl FileCacheBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `fusion:v1:meta` -> `<dir>/fusion.v1.meta.json`
    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| match c {
                ':' => '.',
                c if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' => c,
                _ => '_',
            })
            .collect();
        self.dir.join(format!("{}.json", name))
    }
}

impl CacheBackend for FileCacheBackend {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(value.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.path_for(key)).map_err(|e| e.error)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Process-local backend
#[derive(Debug, Default, Clone)]
pub struct MemoryCacheBackend {
    blobs: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryCacheBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn blobs(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.blobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.blobs().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl CacheBackend for MemoryCacheBackend {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.blobs().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        self.blobs().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        self.blobs().remove(key);
        Ok(())
    }
}

/// Cache metadata blob
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMeta {
    #[serde(rename = "savedAt", alias = "saved_at", default)]
    pub saved_at: Option<String>,
}

impl CacheMeta {
    pub fn saved_now() -> Self {
        Self::saved_at(Utc::now())
    }

    pub fn saved_at(at: DateTime<Utc>) -> Self {
        Self {
            saved_at: Some(at.to_rfc3339_opts(SecondsFormat::Millis, true)),
        }
    }

    pub fn saved_time(&self) -> Option<DateTime<Utc>> {
        self.saved_at.as_deref().and_then(parse_timestamp)
    }
}

/// Everything read back from the cache
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheSnapshot {
    pub meta: CacheMeta,
    pub snapshot: Snapshot,
}

/// True iff `meta` exists, its timestamp parses and it is younger than `ttl`
pub fn is_fresh(meta: Option<&CacheMeta>, ttl: Duration) -> bool {
    is_fresh_at(meta, ttl, Utc::now())
}

/// `is_fresh` against an explicit clock
pub fn is_fresh_at(meta: Option<&CacheMeta>, ttl: Duration, now: DateTime<Utc>) -> bool {
    let Some(saved) = meta.and_then(CacheMeta::saved_time) else {
        return false;
    };
    let Ok(ttl) = chrono::Duration::from_std(ttl) else {
        return true;
    };
    now.signed_duration_since(saved) < ttl
}

/// Versioned snapshot cache over a `CacheBackend`
///
/// One lock serialises `load`, `save` and `clear`, so a reader in this
/// process never observes a half-written snapshot.
#[derive(Debug)]
pub struct LocalCacheStore {
    backend: Box<dyn CacheBackend>,
    namespace: String,
    version: String,
    lock: Mutex<()>,
}

const COLLECTIONS: [&str; 3] = ["events", "assets", "alerts"];

impl LocalCacheStore {
    pub fn new(
        backend: Box<dyn CacheBackend>,
        namespace: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            namespace: namespace.into(),
            version: version.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        let backend: Box<dyn CacheBackend> = match config.backend {
            CacheBackendKind::File => Box::new(FileCacheBackend::new(config.resolved_dir())),
            CacheBackendKind::Memory => Box::new(MemoryCacheBackend::new()),
        };
        Self::new(backend, config.namespace.clone(), config.version.clone())
    }

    /// In-memory store, mostly for tests
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryCacheBackend::new()), "fusion", "v1")
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn key(&self, part: &str) -> String {
        format!("{}:{}:{}", self.namespace, self.version, part)
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Read the cached snapshot; any problem is a miss
    pub fn load(&self) -> Option<CacheSnapshot> {
        let _guard = self.guard();

        let meta: CacheMeta = self.read_blob("meta")?;
        let events: Vec<Event> = self.read_blob("events")?;
        let assets: Vec<Asset> = self.read_blob("assets")?;
        let alerts: Vec<Alert> = self.read_blob("alerts")?;

        Some(CacheSnapshot {
            meta,
            snapshot: Snapshot::new(events, assets, alerts),
        })
    }

    fn read_blob<T: DeserializeOwned>(&self, part: &str) -> Option<T> {
        let key = self.key(part);
        let raw = match self.backend.get(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("Cache miss: {} absent", key);
                return None;
            }
            Err(e) => {
                warn!("Cache read failed for {}: {}", key, e);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Cache blob {} is corrupt, ignoring: {}", key, e);
                None
            }
        }
    }

    /// Persist `snapshot` stamped with the current time
    pub fn save(&self, snapshot: &Snapshot) -> Result<CacheMeta> {
        self.save_with_meta(snapshot, CacheMeta::saved_now())
    }

    /// Persist `snapshot` with explicit metadata.
    ///
    /// The previous meta is removed before any collection is touched and the
    /// new one is written last, so a save that fails halfway reads as a miss.
    pub fn save_with_meta(&self, snapshot: &Snapshot, meta: CacheMeta) -> Result<CacheMeta> {
        let events = serde_json::to_string(&snapshot.events)?;
        let assets = serde_json::to_string(&snapshot.assets)?;
        let alerts = serde_json::to_string(&snapshot.alerts)?;
        let meta_blob = serde_json::to_string(&meta)?;

        let _guard = self.guard();
        self.remove_blob("meta")?;
        for (part, blob) in [("events", &events), ("assets", &assets), ("alerts", &alerts)] {
            self.write_blob(part, blob)?;
        }
        self.write_blob("meta", &meta_blob)?;

        debug!("Cache saved: {}", snapshot.summary());
        Ok(meta)
    }

    fn write_blob(&self, part: &str, blob: &str) -> Result<()> {
        let key = self.key(part);
        self.backend
            .set(&key, blob)
            .map_err(|e| FusionError::Cache(format!("Failed to write {}: {}", key, e)))
    }

    fn remove_blob(&self, part: &str) -> Result<()> {
        let key = self.key(part);
        self.backend
            .remove(&key)
            .map_err(|e| FusionError::Cache(format!("Failed to remove {}: {}", key, e)))
    }

    /// Remove every blob of the current version; meta goes first
    pub fn clear(&self) -> Result<()> {
        let _guard = self.guard();
        for part in std::iter::once("meta").chain(COLLECTIONS) {
            self.remove_blob(part)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    const TTL: Duration = Duration::from_millis(90_000);

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn sample() -> Snapshot {
        let event: Event = serde_json::from_value(serde_json::json!({
            "event_id": "e1",
            "created_at": "2024-01-01T11:59:00Z",
            "severity": "high"
        }))
        .unwrap();
        let asset: Asset =
            serde_json::from_value(serde_json::json!({"asset_id": "a1", "status": "active"}))
                .unwrap();
        Snapshot::new(vec![event], vec![asset], vec![])
    }

    /// Records the order of writes
    #[derive(Debug, Default)]
    struct RecordingBackend {
        inner: MemoryCacheBackend,
        writes: Arc<Mutex<Vec<String>>>,
    }

    impl CacheBackend for RecordingBackend {
        fn get(&self, key: &str) -> io::Result<Option<String>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> io::Result<()> {
            self.writes.lock().unwrap().push(key.to_string());
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> io::Result<()> {
            self.inner.remove(key)
        }
    }

    /// Memory backend whose writes to one key can be made to fail
    #[derive(Debug, Default)]
    struct FlakyBackend {
        inner: MemoryCacheBackend,
        fail_on: Arc<Mutex<Option<String>>>,
    }

    impl CacheBackend for FlakyBackend {
        fn get(&self, key: &str) -> io::Result<Option<String>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> io::Result<()> {
            let fail_on = self.fail_on.lock().unwrap();
            if fail_on.as_deref().is_some_and(|suffix| key.ends_with(suffix)) {
                return Err(io::Error::other("disk full"));
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> io::Result<()> {
            self.inner.remove(key)
        }
    }

    #[test]
    fn test_freshness_boundary() {
        let meta = CacheMeta::saved_at(base_time());

        let just_inside = base_time() + chrono::Duration::milliseconds(89_999);
        let exactly = base_time() + chrono::Duration::milliseconds(90_000);
        let just_outside = base_time() + chrono::Duration::milliseconds(90_001);

        assert!(is_fresh_at(Some(&meta), TTL, just_inside));
        assert!(!is_fresh_at(Some(&meta), TTL, exactly));
        assert!(!is_fresh_at(Some(&meta), TTL, just_outside));
    }

    #[test]
    fn test_missing_or_unparseable_meta_is_stale() {
        assert!(!is_fresh_at(None, TTL, base_time()));
        assert!(!is_fresh_at(Some(&CacheMeta::default()), TTL, base_time()));

        let garbage = CacheMeta {
            saved_at: Some("yesterday-ish".to_string()),
        };
        assert!(!is_fresh_at(Some(&garbage), TTL, base_time()));
    }

    #[test]
    fn test_meta_json_shape() {
        let meta = CacheMeta::saved_at(base_time());
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json, serde_json::json!({"savedAt": "2024-01-01T12:00:00.000Z"}));

        let legacy: CacheMeta =
            serde_json::from_str(r#"{"saved_at": "2024-01-01T12:00:00Z"}"#).unwrap();
        assert_eq!(legacy.saved_time(), Some(base_time()));
    }

    #[test]
    fn test_save_then_load() {
        let store = LocalCacheStore::in_memory();
        assert!(store.load().is_none());

        let meta = store.save(&sample()).unwrap();
        let loaded = store.load().unwrap();

        assert_eq!(loaded.meta, meta);
        assert_eq!(loaded.snapshot, sample());
        assert!(is_fresh(Some(&loaded.meta), TTL));
    }

    #[test]
    fn test_meta_written_last() {
        let writes = Arc::new(Mutex::new(Vec::new()));
        let backend = RecordingBackend {
            inner: MemoryCacheBackend::new(),
            writes: writes.clone(),
        };
        let store = LocalCacheStore::new(Box::new(backend), "fusion", "v1");
        store.save(&sample()).unwrap();

        let writes = writes.lock().unwrap();
        assert_eq!(writes.len(), 4);
        assert_eq!(writes.last().map(String::as_str), Some("fusion:v1:meta"));
    }

    #[test]
    fn test_interrupted_save_reads_as_miss() {
        let fail_on = Arc::new(Mutex::new(None));
        let backend = FlakyBackend {
            inner: MemoryCacheBackend::new(),
            fail_on: fail_on.clone(),
        };
        let store = LocalCacheStore::new(Box::new(backend), "fusion", "v1");
        store.save(&sample()).unwrap();
        assert!(store.load().is_some());

        let event: Event =
            serde_json::from_value(serde_json::json!({"event_id": "e2", "severity": "low"}))
                .unwrap();
        let newer = Snapshot::new(vec![event], vec![], vec![]);
        *fail_on.lock().unwrap() = Some(":assets".to_string());

        assert!(store.save(&newer).is_err());
        // new events next to old assets must never be served as a snapshot
        assert!(store.load().is_none());

        *fail_on.lock().unwrap() = None;
        store.save(&newer).unwrap();
        assert_eq!(store.load().unwrap().snapshot, newer);
    }

    #[test]
    fn test_corrupt_blob_is_a_miss() {
        let backend = MemoryCacheBackend::new();
        let store = LocalCacheStore::new(Box::new(backend.clone()), "fusion", "v1");
        store.save(&sample()).unwrap();

        backend.set("fusion:v1:assets", "{not json").unwrap();
        assert!(store.load().is_none());
    }

    #[test]
    fn test_version_bump_invalidates() {
        let backend = MemoryCacheBackend::new();
        let v1 = LocalCacheStore::new(Box::new(backend.clone()), "fusion", "v1");
        v1.save(&sample()).unwrap();

        let v2 = LocalCacheStore::new(Box::new(backend.clone()), "fusion", "v2");
        assert!(v2.load().is_none());
        assert!(v1.load().is_some());
    }

    #[test]
    fn test_clear_removes_current_version_only() {
        let backend = MemoryCacheBackend::new();
        let v1 = LocalCacheStore::new(Box::new(backend.clone()), "fusion", "v1");
        let v2 = LocalCacheStore::new(Box::new(backend.clone()), "fusion", "v2");
        v1.save(&sample()).unwrap();
        v2.save(&sample()).unwrap();

        v2.clear().unwrap();
        assert!(v2.load().is_none());
        assert!(v1.load().is_some());
        assert!(backend.keys().iter().all(|k| k.starts_with("fusion:v1:")));
    }

    #[test]
    fn test_file_backend_roundtrip() {
        let dir = tempdir().unwrap();
        let store = LocalCacheStore::new(
            Box::new(FileCacheBackend::new(dir.path().join("cache"))),
            "fusion",
            "v1",
        );

        store.save(&sample()).unwrap();
        assert!(dir.path().join("cache/fusion.v1.meta.json").exists());
        assert_eq!(store.load().unwrap().snapshot, sample());

        store.clear().unwrap();
        assert!(store.load().is_none());
        // clearing twice is fine
        store.clear().unwrap();
    }

    #[test]
    fn test_file_backend_missing_dir_is_a_miss() {
        let dir = tempdir().unwrap();
        let backend = FileCacheBackend::new(dir.path().join("never-created"));
        assert_eq!(backend.get("fusion:v1:meta").unwrap(), None);
    }
}
