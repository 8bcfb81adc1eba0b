//! Error types for the discovery and rendering pipelines.

use crate::contract::BoxError;

#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    #[error("failed to list '{prefix}': {source}")]
    Listing {
        prefix: String,
        #[source]
        source: BoxError,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    #[error("cache store error: {0}")]
    Store(#[source] BoxError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum DiscoveryError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

#[derive(thiserror::Error, Debug)]
pub enum ComposeError {
    #[error("invalid canvas {width}x{height}")]
    InvalidCanvas { width: u32, height: u32 },

    #[error("render exceeded deadline of {0:?}")]
    DeadlineExceeded(std::time::Duration),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Compose(#[from] ComposeError),

    #[error("upload failed for '{key}': {source}")]
    Upload {
        key: String,
        #[source]
        source: BoxError,
    },
}

impl RenderError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
