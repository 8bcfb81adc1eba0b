//! HTTP asset fetcher.

use std::time::Duration;

use async_trait::async_trait;

use crate::contract::{AssetFetcher, BoxError};

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Every request carries `timeout`; callers add their own overall deadline.
    pub fn new(timeout: Duration) -> Result<Self, BoxError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl AssetFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, BoxError> {
        tracing::debug!(url, "Fetching asset");
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!(url, status = %status, "Asset fetch returned error status");
            return Err(format!("GET {url} returned {status}").into());
        }
        let bytes = response.bytes().await?;
        tracing::debug!(url, bytes = bytes.len(), "Fetched asset");
        Ok(bytes.to_vec())
    }
}
