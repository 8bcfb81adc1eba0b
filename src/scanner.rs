//! Bucket discovery: rebuilds the collection → item → layer hierarchy from a
//! two-level folder listing (`<collection>/<item>/<N>.png`).
//!
//! # Responsibilities
//! - List item folders of a collection and the files inside each item folder
//! - Keep only layer files named `<N>.png`, parse `N` as the paint order
//! - Drop items without layers, skip item folders whose listing fails
//! - Aggregate collections into a [`ScanResult`]
//!
//! The scanner never caches; see `discovery` for cache-first reads.

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use chrono::Utc;
use futures::future::join_all;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::contract::ObjectStore;
use crate::error::ScanError;
use crate::model::{title_case_slug, Collection, Item, Layer, LayerType, ScanResult};

/// Scanner options.
#[derive(Debug, Clone, Default)]
pub struct ScannerConfig {
    /// Collection folders to scan. Empty means "every root folder except `patterns_folder`".
    pub collections: Vec<String>,
    /// Root folder holding pattern swatches; never treated as a collection.
    pub patterns_folder: String,
    /// Layer indices that are never customizable.
    pub fixed_layers: Vec<u32>,
}

fn layer_file_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d+)\.png$").expect("layer file pattern is a valid regex"))
}

pub struct BucketScanner<S: ?Sized> {
    store: Arc<S>,
    config: ScannerConfig,
}

impl<S> BucketScanner<S>
where
    S: ObjectStore + ?Sized,
{
    pub fn new(store: Arc<S>, config: ScannerConfig) -> Self {
        Self { store, config }
    }

    /// Resolve which collection folders a full scan covers.
    pub async fn collection_slugs(&self) -> Result<Vec<String>, ScanError> {
        if !self.config.collections.is_empty() {
            return Ok(self.config.collections.clone());
        }
        let entries = self.store.list("").await.map_err(|source| ScanError::Listing {
            prefix: String::new(),
            source,
        })?;
        let mut slugs: Vec<String> = entries
            .into_iter()
            .filter(|e| e.is_folder() && e.name != self.config.patterns_folder)
            .map(|e| e.name)
            .collect();
        slugs.sort();
        debug!(?slugs, "[SCAN] Discovered collection folders at bucket root");
        Ok(slugs)
    }

    /// Scan every collection. A collection whose folder cannot be listed is skipped.
    pub async fn scan_all(&self) -> Result<ScanResult, ScanError> {
        let slugs = self.collection_slugs().await?;
        info!(collections = slugs.len(), "[SCAN] Starting full catalog scan");

        let mut collections = Vec::with_capacity(slugs.len());
        for slug in &slugs {
            match self.scan_collection(slug).await {
                Ok(collection) => collections.push(collection),
                Err(e) => {
                    warn!(collection = %slug, error = %e, "[SCAN] Skipping collection after listing failure");
                }
            }
        }

        let result = ScanResult::from_collections(collections, Utc::now());
        info!(
            collections = result.collections.len(),
            total_items = result.total_items,
            total_layers = result.total_layers,
            "[SCAN] Catalog scan complete"
        );
        Ok(result)
    }

    /// Scan one collection folder into a [`Collection`].
    pub async fn scan_collection(&self, slug: &str) -> Result<Collection, ScanError> {
        let entries = self.store.list(slug).await.map_err(|source| ScanError::Listing {
            prefix: slug.to_string(),
            source,
        })?;

        let item_slugs: Vec<String> = entries
            .into_iter()
            .filter(|e| e.is_folder())
            .map(|e| e.name)
            .collect();
        debug!(collection = %slug, folders = item_slugs.len(), "[SCAN] Listed item folders");

        let scans = item_slugs.iter().map(|item_slug| self.scan_item(slug, item_slug));
        let mut items: Vec<Item> = join_all(scans).await.into_iter().flatten().collect();
        items.sort_by(|a, b| a.slug.cmp(&b.slug));

        info!(collection = %slug, items = items.len(), "[SCAN] Collection scanned");
        Ok(Collection::new(slug, items))
    }

    /// `None` when the folder has no layer files or cannot be listed.
    async fn scan_item(&self, collection_slug: &str, item_slug: &str) -> Option<Item> {
        let folder_path = format!("{collection_slug}/{item_slug}");
        let entries = match self.store.list(&folder_path).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(folder = %folder_path, error = %e, "[SCAN] Skipping item after listing failure");
                return None;
            }
        };

        let mut files: Vec<String> = entries
            .into_iter()
            .filter(|e| !e.is_folder())
            .map(|e| e.name)
            .collect();
        files.sort();

        let layers = self.layers_from_files(&folder_path, &files);
        if layers.is_empty() {
            debug!(folder = %folder_path, "[SCAN] No layer files, dropping item");
            return None;
        }

        Some(Item {
            id: Item::item_id(collection_slug, item_slug),
            slug: item_slug.to_string(),
            name: title_case_slug(item_slug),
            collection_slug: collection_slug.to_string(),
            folder_path,
            layers,
        })
    }

    /// Turn file names into ascending, de-duplicated layers.
    pub fn layers_from_files(&self, folder_path: &str, files: &[String]) -> Vec<Layer> {
        let mut seen = HashSet::new();
        let mut layers = Vec::new();

        for file in files {
            let Some(index) = layer_file_pattern()
                .captures(file)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse::<u32>().ok())
            else {
                continue;
            };
            if !seen.insert(index) {
                warn!(folder = %folder_path, file = %file, index, "[SCAN] Duplicate layer index, keeping first file");
                continue;
            }
            let layer_type = if self.config.fixed_layers.contains(&index) {
                LayerType::Fixed
            } else {
                LayerType::Pattern
            };
            layers.push(Layer {
                index,
                file: file.clone(),
                url: self.store.public_url(&format!("{folder_path}/{file}")),
                layer_type,
            });
        }

        layers.sort_by_key(|l| l.index);
        layers
    }
}
