//! # contract: seams between swatchwork and the outside world
//!
//! This module defines the traits every external collaborator is reached
//! through: the object store that holds the catalog, the fetcher that pulls
//! artwork bytes, the key/value store that persists the discovery snapshot,
//! and the uploader that turns a rendered buffer into a durable URL.
//!
//! ## Interface & Extensibility
//! - Implement [`ObjectStore`] for a new bucket provider (see `storage::supabase`).
//! - Implement [`AssetFetcher`] for a new transport (see `storage::http`).
//! - Implement [`CacheStore`] for a new persistence medium (see `cache`).
//! - Implement [`RenderUploader`] for a new render destination (see `storage::local`).
//!
//! ## Mocking & Testing
//! - Every trait is annotated for `mockall`, so tests can build deterministic
//!   `MockObjectStore`, `MockAssetFetcher`, `MockCacheStore` and
//!   `MockRenderUploader` values. Mocks are exported to integration tests
//!   through the default `test-export-mocks` feature.
//!
//! ## Errors
//! Trait methods return [`BoxError`]; callers decide whether a failure skips a
//! node, degrades a layer, or surfaces to the user.

use async_trait::async_trait;

use mockall::automock;

/// Error type used at every trait seam.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Whether a listing entry is a folder (prefix) or an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Folder,
    File,
}

/// One entry returned by listing a storage prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEntry {
    /// Entry name relative to the listed prefix (no slashes).
    pub name: String,
    pub kind: EntryKind,
}

impl StorageEntry {
    pub fn folder(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Folder,
        }
    }

    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::File,
        }
    }

    pub fn is_folder(&self) -> bool {
        self.kind == EntryKind::Folder
    }
}

/// Read-only view of the bucket that holds collections, items and textures.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List the direct children of `prefix`. An empty prefix lists the bucket root.
    async fn list(&self, prefix: &str) -> Result<Vec<StorageEntry>, BoxError>;

    /// Public URL of the object stored at `path` (bucket-relative).
    fn public_url(&self, path: &str) -> String;
}

/// Pulls raw bytes for a layer or pattern URL.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, BoxError>;
}

/// Minimal key/value persistence for the discovery snapshot.
///
/// Implementations are synchronous: the snapshot is a single small blob and
/// lookups over it never leave the process.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, BoxError>;
    fn set(&self, key: &str, value: &str) -> Result<(), BoxError>;
    fn remove(&self, key: &str) -> Result<(), BoxError>;
}

/// Persists a rendered buffer and returns the URL it is reachable at.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RenderUploader: Send + Sync {
    async fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, BoxError>;
}
