//! # cache: the persisted discovery snapshot
//!
//! [`ItemCache`] stores exactly one [`ScanResult`] as a JSON blob under one fixed
//! key of an injected [`CacheStore`]. Expiry is lazy: a stale record is removed
//! the next time it is read. Nothing here touches the network.
//!
//! Two stores ship with the crate: [`MemoryCacheStore`] for tests and short-lived
//! processes, and [`FileCacheStore`] which keeps one file per key in a directory.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::contract::{BoxError, CacheStore};
use crate::error::CacheError;
use crate::model::{Collection, Item, ScanResult};

/// The single key the snapshot lives under.
pub const CACHE_KEY: &str = "swatchwork.catalog.v1";

pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

pub struct ItemCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl ItemCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            ttl: DEFAULT_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Stamp `cached_at` and persist the snapshot. Returns the stamped copy.
    pub fn save(&self, result: &ScanResult) -> Result<ScanResult, CacheError> {
        let mut stamped = result.clone();
        stamped.cached_at = Some(Utc::now());
        let json = serde_json::to_string(&stamped)?;
        self.store.set(CACHE_KEY, &json).map_err(CacheError::Store)?;
        info!(
            total_items = stamped.total_items,
            bytes = json.len(),
            "Saved catalog snapshot to cache"
        );
        Ok(stamped)
    }

    /// The persisted snapshot, or `None` if absent, malformed or expired.
    /// Malformed and expired records are removed as a side effect.
    pub fn load(&self) -> Option<ScanResult> {
        let raw = match self.store.get(CACHE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("Cache miss: no snapshot stored");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Cache store read failed, treating as miss");
                return None;
            }
        };

        let snapshot: ScanResult = match serde_json::from_str(&raw) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Cached snapshot is malformed, clearing");
                self.clear_quietly();
                return None;
            }
        };

        if !self.is_fresh(&snapshot) {
            info!(cached_at = ?snapshot.cached_at, "Cached snapshot expired, clearing");
            self.clear_quietly();
            return None;
        }

        debug!(total_items = snapshot.total_items, "Cache hit");
        Some(snapshot)
    }

    pub fn clear(&self) -> Result<(), CacheError> {
        self.store.remove(CACHE_KEY).map_err(CacheError::Store)
    }

    /// A snapshot without `cached_at` was never saved and counts as stale.
    pub fn is_fresh(&self, snapshot: &ScanResult) -> bool {
        let Some(cached_at) = snapshot.cached_at else {
            return false;
        };
        let age = Utc::now().signed_duration_since(cached_at);
        match age.to_std() {
            Ok(age) => age <= self.ttl,
            // Stamped in the future (clock skew): still valid.
            Err(_) => true,
        }
    }

    pub fn find_collection(&self, slug: &str) -> Option<Collection> {
        self.load()?.collection(slug).cloned()
    }

    pub fn find_item(&self, id: &str) -> Option<Item> {
        self.load()?.item(id).cloned()
    }

    pub fn find_items_by_collection(&self, slug: &str) -> Vec<Item> {
        self.find_collection(slug)
            .map(|c| c.items)
            .unwrap_or_default()
    }

    fn clear_quietly(&self) {
        if let Err(e) = self.clear() {
            warn!(error = %e, "Failed to clear cache");
        }
    }
}

/// In-process store.
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, BoxError> {
        self.entries
            .lock()
            .map_err(|_| BoxError::from("memory cache lock poisoned"))
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, key: &str) -> Result<Option<String>, BoxError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), BoxError> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), BoxError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// Keeps each key as `<dir>/<key>.json`. Writes go through a temp file and
/// an atomic rename so readers never see a half-written snapshot.
pub struct FileCacheStore {
    dir: PathBuf,
}

impl FileCacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }
}

impl CacheStore for FileCacheStore {
    fn get(&self, key: &str) -> Result<Option<String>, BoxError> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), BoxError> {
        fs::create_dir_all(&self.dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(value.as_bytes())?;
        tmp.flush()?;
        let path = self.path_for(key);
        tmp.persist(&path).map_err(|e| e.error)?;
        debug!(path = %path.display(), "Wrote cache file");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), BoxError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Box::new(e)),
        }
    }
}
