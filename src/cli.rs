//! # swatchwork CLI
//!
//! Command parsing and wiring for the `swatchwork` binary. The CLI builds the
//! storage backend, discovery cache and renderer from the loaded [`Config`] and
//! prints every result as JSON on stdout.
//!
//! For programmatic or integration use, call [`run`] with a constructed [`Cli`].
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::cache::{FileCacheStore, ItemCache};
use crate::compose::ImageComposer;
use crate::config::{Config, StorageConfig};
use crate::contract::{AssetFetcher, ObjectStore, RenderUploader};
use crate::discovery::DiscoveryService;
use crate::load_config::load_config;
use crate::model::LayerCustomization;
use crate::patterns::PatternScanner;
use crate::render::{RenderRequest, RenderService};
use crate::scanner::BucketScanner;
use crate::storage::{DirectoryUploader, HttpFetcher, LocalStorage, SupabaseStorage};

/// Browse the product catalog and render pattern previews.
#[derive(Parser)]
#[clap(
    name = "swatchwork",
    version,
    about = "Discover layered product artwork in a bucket and render pattern-filled previews"
)]
pub struct Cli {
    /// Path to the YAML config file
    #[clap(long, global = true, default_value = "swatchwork.yaml")]
    pub config: PathBuf,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List all collections, items and layers
    Collections {
        /// Ignore the cache and rescan the bucket
        #[clap(long)]
        force: bool,
    },
    /// Show one collection by slug
    Collection { slug: String },
    /// Show one item by id (`<collection>-<item>`)
    Item { id: String },
    /// List available patterns
    Patterns,
    /// Clear the discovery cache and rescan
    Refresh,
    /// Render an item with patterns applied to selected layers
    Render {
        /// Item id (`<collection>-<item>`)
        #[clap(long)]
        item: String,
        /// `<layer_index>=<pattern slug or URL>`, repeatable
        #[clap(long = "customize", required = true)]
        customize: Vec<String>,
        #[clap(long)]
        width: Option<u32>,
        #[clap(long)]
        height: Option<u32>,
    },
}

/// Everything a command may need, built once from config.
pub struct Services {
    pub store: Arc<dyn ObjectStore>,
    pub discovery: DiscoveryService<dyn ObjectStore>,
    pub patterns: PatternScanner<dyn ObjectStore>,
    pub renderer: RenderService,
}

impl Services {
    pub fn from_config(config: &Config) -> Result<Self> {
        let fetch_timeout = config.render.fetch_timeout();
        let (store, fetcher): (Arc<dyn ObjectStore>, Arc<dyn AssetFetcher>) = match &config.storage {
            StorageConfig::Supabase(s) => {
                let api_key = s.api_key.clone().unwrap_or_default();
                let storage = SupabaseStorage::new(&s.base_url, &s.bucket, api_key, fetch_timeout)
                    .map_err(|e| anyhow::anyhow!("Failed to build storage client: {e}"))?;
                let fetcher = HttpFetcher::new(fetch_timeout)
                    .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {e}"))?;
                let store: Arc<dyn ObjectStore> = Arc::new(storage);
                let fetcher: Arc<dyn AssetFetcher> = Arc::new(fetcher);
                (store, fetcher)
            }
            StorageConfig::Local(l) => {
                let storage = Arc::new(LocalStorage::new(&l.root));
                let store: Arc<dyn ObjectStore> = storage.clone();
                let fetcher: Arc<dyn AssetFetcher> = storage;
                (store, fetcher)
            }
        };

        let cache = ItemCache::new(Arc::new(FileCacheStore::new(&config.discovery.cache_dir)))
            .with_ttl(config.discovery.cache_ttl());
        let scanner = BucketScanner::new(Arc::clone(&store), config.discovery.scanner_config());
        let discovery = DiscoveryService::new(scanner, cache);
        let patterns = PatternScanner::new(Arc::clone(&store), config.discovery.patterns_folder.clone());

        let uploader: Arc<dyn RenderUploader> = Arc::new(DirectoryUploader::new(&config.render.output_dir));
        let composer = ImageComposer::new(fetcher, config.render.compose_options());
        let renderer = RenderService::new(composer, uploader, config.render.settings());

        Ok(Self {
            store,
            discovery,
            patterns,
            renderer,
        })
    }
}

/// Async CLI entrypoint shared by `main()` and integration tests.
pub async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli.config)?;
    let services = Services::from_config(&config)?;

    match cli.command {
        Commands::Collections { force } => {
            tracing::info!(command = "collections", force, "Reading catalog");
            let result = services.discovery.get_collections(force).await?;
            print_json(&result)
        }
        Commands::Collection { slug } => {
            let collection = services
                .discovery
                .get_collection_by_id(&slug)
                .await?
                .with_context(|| format!("Collection '{slug}' not found"))?;
            print_json(&collection)
        }
        Commands::Item { id } => {
            let item = services
                .discovery
                .get_item_by_id(&id)
                .await?
                .with_context(|| format!("Item '{id}' not found"))?;
            print_json(&item)
        }
        Commands::Patterns => {
            let patterns = services.patterns.scan().await?;
            print_json(&patterns)
        }
        Commands::Refresh => {
            tracing::info!(command = "refresh", "Refreshing catalog cache");
            let result = services.discovery.refresh_cache().await?;
            print_json(&result)
        }
        Commands::Render {
            item,
            customize,
            width,
            height,
        } => {
            let found = services
                .discovery
                .get_item_by_id(&item)
                .await?
                .with_context(|| format!("Item '{item}' not found"))?;

            let mut customizations = Vec::with_capacity(customize.len());
            for arg in &customize {
                customizations.push(resolve_customization(&services, arg).await?);
            }

            let request = RenderRequest {
                item_id: found.id.clone(),
                collection_id: found.collection_slug.clone(),
                customizations,
                layers: found.layers.clone(),
                width,
                height,
            };
            let response = services.renderer.render(&request).await?;
            print_json(&response)?;
            if !response.success {
                anyhow::bail!(
                    "Render failed: {}",
                    response.error.as_deref().unwrap_or("unknown error")
                );
            }
            Ok(())
        }
    }
}

/// Parse `<index>=<pattern>`; the pattern is a slug from the patterns folder or a URL.
async fn resolve_customization(services: &Services, arg: &str) -> Result<LayerCustomization> {
    let (index, pattern) = arg
        .split_once('=')
        .with_context(|| format!("Invalid --customize '{arg}', expected <layer_index>=<pattern>"))?;
    let layer_index: u32 = index
        .trim()
        .parse()
        .with_context(|| format!("Invalid layer index in '{arg}'"))?;
    let pattern = pattern.trim();

    if let Some(found) = services.patterns.find(pattern).await? {
        return Ok(LayerCustomization::from_pattern(layer_index, &found));
    }
    if pattern.contains("://") {
        return Ok(LayerCustomization {
            layer_index,
            pattern_id: pattern.to_string(),
            pattern_url: pattern.to_string(),
            pattern_name: pattern.to_string(),
        });
    }
    anyhow::bail!("Pattern '{pattern}' not found in '{}'", services.store.public_url(""))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{json}");
    Ok(())
}
