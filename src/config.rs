use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::compose::ComposeOptions;
use crate::model::CanvasSize;
use crate::patterns::DEFAULT_PATTERNS_FOLDER;
use crate::render::RenderSettings;
use crate::scanner::ScannerConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub render: RenderConfig,
}

impl Config {
    pub fn trace_loaded(&self) {
        self.storage.trace_loaded();
        info!(
            collections = self.discovery.collections.len(),
            patterns_folder = %self.discovery.patterns_folder,
            cache_ttl_secs = self.discovery.cache_ttl_secs,
            width = self.render.width,
            height = self.render.height,
            "Loaded Config"
        );
        debug!(?self, "Config loaded (full debug)");
    }
}

/// Where the catalog lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    Supabase(SupabaseConfig),
    Local(LocalConfig),
}

impl StorageConfig {
    pub fn trace_loaded(&self) {
        match self {
            StorageConfig::Supabase(s) => {
                info!(base_url = %s.base_url, bucket = %s.bucket, "Loaded Supabase storage");
            }
            StorageConfig::Local(l) => {
                info!(root = %l.root.display(), "Loaded local storage");
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupabaseConfig {
    pub base_url: String,
    pub bucket: String,
    /// Injected from the environment, never read from the file.
    #[serde(skip)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalConfig {
    pub root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default)]
    pub collections: Vec<String>,
    #[serde(default = "default_patterns_folder")]
    pub patterns_folder: String,
    #[serde(default)]
    pub fixed_layers: Vec<u32>,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            collections: Vec::new(),
            patterns_folder: default_patterns_folder(),
            fixed_layers: Vec::new(),
            cache_dir: default_cache_dir(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl DiscoveryConfig {
    pub fn scanner_config(&self) -> ScannerConfig {
        ScannerConfig {
            collections: self.collections.clone(),
            patterns_folder: self.patterns_folder.clone(),
            fixed_layers: self.fixed_layers.clone(),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_dimension")]
    pub width: u32,
    #[serde(default = "default_dimension")]
    pub height: u32,
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
    #[serde(default = "default_true")]
    pub parallel_fetch: bool,
    #[serde(default = "default_preview_max_edge")]
    pub preview_max_edge: u32,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: default_dimension(),
            height: default_dimension(),
            max_dimension: default_max_dimension(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            deadline_secs: default_deadline_secs(),
            parallel_fetch: true,
            preview_max_edge: default_preview_max_edge(),
            output_dir: default_output_dir(),
        }
    }
}

impl RenderConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn compose_options(&self) -> ComposeOptions {
        ComposeOptions {
            fetch_timeout: self.fetch_timeout(),
            deadline: Duration::from_secs(self.deadline_secs),
            parallel_fetch: self.parallel_fetch,
        }
    }

    pub fn settings(&self) -> RenderSettings {
        RenderSettings {
            canvas: CanvasSize::new(self.width, self.height),
            max_dimension: self.max_dimension,
            preview_max_edge: self.preview_max_edge,
        }
    }
}

fn default_patterns_folder() -> String {
    DEFAULT_PATTERNS_FOLDER.to_string()
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".swatchwork-cache")
}

fn default_cache_ttl_secs() -> u64 {
    30 * 60
}

fn default_dimension() -> u32 {
    2000
}

fn default_max_dimension() -> u32 {
    8000
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_deadline_secs() -> u64 {
    120
}

fn default_true() -> bool {
    true
}

fn default_preview_max_edge() -> u32 {
    1024
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("renders")
}
