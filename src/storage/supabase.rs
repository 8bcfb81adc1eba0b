//! Supabase-compatible object storage client.
//!
//! Listing uses `POST {base}/storage/v1/object/list/{bucket}` with a `prefix`,
//! paging through results `limit` entries at a time. Entries with a `null` id
//! are folders. Public URLs follow `{base}/storage/v1/object/public/{bucket}/{path}`.

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::contract::{BoxError, ObjectStore, StorageEntry};

const PAGE_SIZE: usize = 1000;

pub const KEY_ENV: &str = "SUPABASE_KEY";

#[derive(Serialize)]
struct ListRequest<'a> {
    prefix: &'a str,
    limit: usize,
    offset: usize,
    #[serde(rename = "sortBy")]
    sort_by: SortBy,
}

#[derive(Serialize)]
struct SortBy {
    column: &'static str,
    order: &'static str,
}

#[derive(Debug, Deserialize)]
struct ListedObject {
    name: String,
    #[serde(default)]
    id: Option<String>,
}

pub struct SupabaseStorage {
    client: reqwest::Client,
    base_url: String,
    bucket: String,
    api_key: String,
}

impl SupabaseStorage {
    pub fn new(
        base_url: &str,
        bucket: &str,
        api_key: String,
        timeout: Duration,
    ) -> Result<Self, BoxError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        tracing::info!(
            base_url,
            bucket,
            api_key_set = !api_key.is_empty(),
            "Initialized Supabase storage client"
        );
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
            api_key,
        })
    }

    /// Reads the API key from `SUPABASE_KEY`.
    pub fn new_from_env(base_url: &str, bucket: &str, timeout: Duration) -> Result<Self, BoxError> {
        match env::var(KEY_ENV) {
            Ok(key) => Self::new(base_url, bucket, key, timeout),
            Err(e) => {
                tracing::error!(error = ?e, "SUPABASE_KEY missing in environment");
                Err(Box::new(e))
            }
        }
    }

    async fn list_page(&self, prefix: &str, offset: usize) -> Result<Vec<ListedObject>, BoxError> {
        let url = format!("{}/storage/v1/object/list/{}", self.base_url, self.bucket);
        let body = ListRequest {
            prefix,
            limit: PAGE_SIZE,
            offset,
            sort_by: SortBy {
                column: "name",
                order: "asc",
            },
        };

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<failed to decode response body>"));
            tracing::error!(status = %status, url = %url, prefix, "Storage list returned error. Response body: {text}");
            return Err(format!("storage list for '{prefix}' failed with {status}").into());
        }

        Ok(response.json::<Vec<ListedObject>>().await?)
    }
}

#[async_trait]
impl ObjectStore for SupabaseStorage {
    async fn list(&self, prefix: &str) -> Result<Vec<StorageEntry>, BoxError> {
        let mut entries = Vec::new();
        let mut offset = 0;
        loop {
            let page = self.list_page(prefix, offset).await?;
            let count = page.len();
            entries.extend(
                page.into_iter()
                    // Supabase keeps an empty placeholder object in otherwise-empty folders.
                    .filter(|o| o.name != ".emptyFolderPlaceholder")
                    .map(|o| match o.id {
                        Some(_) => StorageEntry::file(o.name),
                        None => StorageEntry::folder(o.name),
                    }),
            );
            if count < PAGE_SIZE {
                break;
            }
            offset += count;
        }
        tracing::debug!(prefix, entries = entries.len(), "Listed storage prefix");
        Ok(entries)
    }

    fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url,
            self.bucket,
            path.trim_start_matches('/')
        )
    }
}
