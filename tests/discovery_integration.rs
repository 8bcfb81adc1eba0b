use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use swatchwork::cache::{ItemCache, MemoryCacheStore};
use swatchwork::contract::{BoxError, ObjectStore, StorageEntry};
use swatchwork::discovery::DiscoveryService;
use swatchwork::scanner::{BucketScanner, ScannerConfig};

/// One collection with one item; counts root listings (one per full scan).
struct CountingStore {
    root_lists: AtomicUsize,
    delay: Duration,
}

impl CountingStore {
    fn new(delay: Duration) -> Self {
        Self {
            root_lists: AtomicUsize::new(0),
            delay,
        }
    }

    fn scans(&self) -> usize {
        self.root_lists.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for CountingStore {
    async fn list(&self, prefix: &str) -> Result<Vec<StorageEntry>, BoxError> {
        match prefix {
            "" => {
                self.root_lists.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(self.delay).await;
                Ok(vec![StorageEntry::folder("tees"), StorageEntry::folder("textures")])
            }
            "tees" => Ok(vec![StorageEntry::folder("boxy")]),
            "tees/boxy" => Ok(vec![StorageEntry::file("0.png"), StorageEntry::file("1.png")]),
            _ => Ok(Vec::new()),
        }
    }

    fn public_url(&self, path: &str) -> String {
        format!("https://cdn.test/{path}")
    }
}

fn service(
    store: Arc<CountingStore>,
    cache_store: Arc<MemoryCacheStore>,
) -> DiscoveryService<CountingStore> {
    let scanner = BucketScanner::new(
        store,
        ScannerConfig {
            patterns_folder: "textures".into(),
            ..Default::default()
        },
    );
    DiscoveryService::new(scanner, ItemCache::new(cache_store))
}

#[tokio::test]
async fn second_read_is_served_from_cache() {
    let store = Arc::new(CountingStore::new(Duration::ZERO));
    let discovery = service(store.clone(), Arc::new(MemoryCacheStore::new()));

    let first = discovery.get_collections(false).await.unwrap();
    let second = discovery.get_collections(false).await.unwrap();

    assert_eq!(store.scans(), 1);
    assert_eq!(first, second);
    assert!(first.cached_at.is_some());
    assert_eq!(first.total_items, 1);
}

#[tokio::test]
async fn persisted_snapshot_is_shared_between_services() {
    let cache_store = Arc::new(MemoryCacheStore::new());
    let store = Arc::new(CountingStore::new(Duration::ZERO));

    service(store.clone(), cache_store.clone())
        .get_collections(false)
        .await
        .unwrap();
    let other = service(store.clone(), cache_store);
    other.get_collections(false).await.unwrap();

    assert_eq!(store.scans(), 1);
    assert_eq!(other.scan_count(), 0);
}

#[tokio::test]
async fn force_refresh_always_rescans() {
    let store = Arc::new(CountingStore::new(Duration::ZERO));
    let discovery = service(store.clone(), Arc::new(MemoryCacheStore::new()));

    discovery.get_collections(false).await.unwrap();
    discovery.get_collections(true).await.unwrap();

    assert_eq!(store.scans(), 2);
    assert_eq!(discovery.scan_count(), 2);
}

#[tokio::test]
async fn item_lookup_hits_cache_and_rescans_on_miss() {
    let store = Arc::new(CountingStore::new(Duration::ZERO));
    let discovery = service(store.clone(), Arc::new(MemoryCacheStore::new()));

    let item = discovery.get_item_by_id("tees-boxy").await.unwrap().expect("item exists");
    assert_eq!(item.layers.len(), 2);
    assert_eq!(store.scans(), 1);

    discovery.get_item_by_id("tees-boxy").await.unwrap();
    assert_eq!(store.scans(), 1, "cached item needs no scan");

    assert!(discovery.get_item_by_id("tees-missing").await.unwrap().is_none());
    assert_eq!(store.scans(), 2, "unknown id forces exactly one rescan");
}

#[tokio::test]
async fn collection_lookup_returns_none_for_unknown_slug() {
    let store = Arc::new(CountingStore::new(Duration::ZERO));
    let discovery = service(store.clone(), Arc::new(MemoryCacheStore::new()));

    let tees = discovery.get_collection_by_id("tees").await.unwrap().unwrap();
    assert_eq!(tees.item_count, 1);
    assert!(discovery.get_collection_by_id("hats").await.unwrap().is_none());
}

#[tokio::test]
async fn concurrent_forced_refreshes_share_one_scan() {
    let store = Arc::new(CountingStore::new(Duration::from_millis(100)));
    let discovery = service(store.clone(), Arc::new(MemoryCacheStore::new()));

    let (a, b) = tokio::join!(discovery.get_collections(true), discovery.get_collections(true));

    assert_eq!(store.scans(), 1);
    assert_eq!(a.unwrap(), b.unwrap());
}

#[tokio::test]
async fn refresh_cache_clears_and_rescans() {
    let cache_store = Arc::new(MemoryCacheStore::new());
    let store = Arc::new(CountingStore::new(Duration::ZERO));
    let discovery = service(store.clone(), cache_store);

    discovery.get_collections(false).await.unwrap();
    let refreshed = discovery.refresh_cache().await.unwrap();

    assert_eq!(store.scans(), 2);
    assert_eq!(refreshed.total_items, 1);
    assert_eq!(discovery.cache().load(), Some(refreshed));
}
