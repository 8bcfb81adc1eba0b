//! Local-directory backends.
//!
//! [`LocalStorage`] serves a directory laid out like the bucket
//! (`<collection>/<item>/<N>.png`, `textures/`) and hands out `file://` URLs,
//! which its [`AssetFetcher`] impl reads back. [`DirectoryUploader`] writes
//! render output under a directory. Both are what the CLI uses when no remote
//! bucket is configured, and what the integration tests run against.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::contract::{AssetFetcher, BoxError, ObjectStore, RenderUploader, StorageEntry};

const FILE_SCHEME: &str = "file://";

pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ObjectStore for LocalStorage {
    async fn list(&self, prefix: &str) -> Result<Vec<StorageEntry>, BoxError> {
        let dir = self.root.join(prefix.trim_matches('/'));
        let mut reader = tokio::fs::read_dir(&dir).await?;
        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type().await?.is_dir() {
                entries.push(StorageEntry::folder(name));
            } else {
                entries.push(StorageEntry::file(name));
            }
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(dir = %dir.display(), entries = entries.len(), "Listed local directory");
        Ok(entries)
    }

    fn public_url(&self, path: &str) -> String {
        format!(
            "{FILE_SCHEME}{}",
            self.root.join(path.trim_start_matches('/')).display()
        )
    }
}

#[async_trait]
impl AssetFetcher for LocalStorage {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, BoxError> {
        let path = url.strip_prefix(FILE_SCHEME).unwrap_or(url);
        Ok(tokio::fs::read(path).await?)
    }
}

pub struct DirectoryUploader {
    dir: PathBuf,
}

impl DirectoryUploader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl RenderUploader for DirectoryUploader {
    async fn upload(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, BoxError> {
        let relative = contained_key(key)?;
        let path = self.dir.join(relative);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &bytes).await?;
        info!(path = %path.display(), bytes = bytes.len(), content_type, "Stored render output");
        Ok(format!("{FILE_SCHEME}{}", path.display()))
    }
}

/// `key` as a relative path that stays below the upload directory.
fn contained_key(key: &str) -> Result<&Path, BoxError> {
    let relative = Path::new(key.trim_start_matches('/'));
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes || relative.as_os_str().is_empty() {
        warn!(key, "Refusing upload key outside the output directory");
        return Err(format!("upload key '{key}' leaves the output directory").into());
    }
    Ok(relative)
}
