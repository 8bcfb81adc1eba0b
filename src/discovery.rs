//! Cache-first catalog reads.
//!
//! [`DiscoveryService`] serves the discovery snapshot from memory or from the
//! persisted [`ItemCache`], and falls back to a whole-catalog rescan through the
//! [`BucketScanner`] on a miss or when the caller forces it. There is no
//! per-entity fetch path: looking up a single item that is not in the snapshot
//! rescans everything.
//!
//! Rescans are single-flight. Callers that arrive while a scan is running wait
//! for it and reuse its result instead of starting another one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::ItemCache;
use crate::contract::ObjectStore;
use crate::error::DiscoveryError;
use crate::model::{Collection, Item, ScanResult};
use crate::scanner::BucketScanner;

pub struct DiscoveryService<S: ?Sized> {
    scanner: BucketScanner<S>,
    cache: ItemCache,
    snapshot: RwLock<Option<ScanResult>>,
    scan_lock: Mutex<()>,
    generation: AtomicU64,
}

impl<S> DiscoveryService<S>
where
    S: ObjectStore + ?Sized,
{
    pub fn new(scanner: BucketScanner<S>, cache: ItemCache) -> Self {
        Self {
            scanner,
            cache,
            snapshot: RwLock::new(None),
            scan_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn cache(&self) -> &ItemCache {
        &self.cache
    }

    /// Number of scans this service has completed.
    pub fn scan_count(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// The catalog, from cache unless `force_refresh` or nothing valid is cached.
    pub async fn get_collections(&self, force_refresh: bool) -> Result<ScanResult, DiscoveryError> {
        if !force_refresh {
            if let Some(snapshot) = self.cached_snapshot() {
                return Ok(snapshot);
            }
        }
        info!(force_refresh, "[DISCOVERY] Rescanning catalog");
        self.rescan().await
    }

    pub async fn get_item_by_id(&self, id: &str) -> Result<Option<Item>, DiscoveryError> {
        let before = self.scan_count();
        let snapshot = self.get_collections(false).await?;
        if let Some(item) = snapshot.item(id) {
            return Ok(Some(item.clone()));
        }
        if self.scan_count() != before {
            return Ok(None);
        }
        debug!(item_id = %id, "[DISCOVERY] Item not in snapshot, forcing rescan");
        let snapshot = self.get_collections(true).await?;
        Ok(snapshot.item(id).cloned())
    }

    pub async fn get_collection_by_id(&self, slug: &str) -> Result<Option<Collection>, DiscoveryError> {
        let before = self.scan_count();
        let snapshot = self.get_collections(false).await?;
        if let Some(collection) = snapshot.collection(slug) {
            return Ok(Some(collection.clone()));
        }
        if self.scan_count() != before {
            return Ok(None);
        }
        debug!(collection = %slug, "[DISCOVERY] Collection not in snapshot, forcing rescan");
        let snapshot = self.get_collections(true).await?;
        Ok(snapshot.collection(slug).cloned())
    }

    /// Drop every cached copy and rescan.
    pub async fn refresh_cache(&self) -> Result<ScanResult, DiscoveryError> {
        self.cache.clear()?;
        self.set_snapshot(None);
        info!("[DISCOVERY] Cache cleared, rescanning");
        self.rescan().await
    }

    /// In-memory snapshot if still fresh, else the persisted one.
    fn cached_snapshot(&self) -> Option<ScanResult> {
        if let Some(snapshot) = self.memory_snapshot() {
            if self.cache.is_fresh(&snapshot) {
                debug!("[DISCOVERY] Serving in-memory snapshot");
                return Some(snapshot);
            }
        }
        let loaded = self.cache.load()?;
        self.set_snapshot(Some(loaded.clone()));
        Some(loaded)
    }

    async fn rescan(&self) -> Result<ScanResult, DiscoveryError> {
        let seen = self.generation.load(Ordering::SeqCst);
        let _guard = self.scan_lock.lock().await;

        if self.generation.load(Ordering::SeqCst) != seen {
            if let Some(snapshot) = self.memory_snapshot() {
                debug!("[DISCOVERY] Reusing scan completed while waiting");
                return Ok(snapshot);
            }
        }

        let scanned = self.scanner.scan_all().await?;
        let stamped = match self.cache.save(&scanned) {
            Ok(stamped) => stamped,
            Err(e) => {
                // Serve the fresh scan even if it could not be persisted.
                warn!(error = %e, "[DISCOVERY] Failed to persist snapshot");
                let mut unsaved = scanned;
                unsaved.cached_at = Some(chrono::Utc::now());
                unsaved
            }
        };
        self.set_snapshot(Some(stamped.clone()));
        self.generation.fetch_add(1, Ordering::SeqCst);
        Ok(stamped)
    }

    fn memory_snapshot(&self) -> Option<ScanResult> {
        match self.snapshot.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn set_snapshot(&self, value: Option<ScanResult>) {
        match self.snapshot.write() {
            Ok(mut guard) => *guard = value,
            Err(poisoned) => *poisoned.into_inner() = value,
        }
    }
}
