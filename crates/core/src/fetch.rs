//! Raw font byte acquisition from variant source locators.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// Fetches the raw bytes behind a variant's source locator.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, source: &str) -> Result<Vec<u8>>;
}

/// Default fetcher: URLs over HTTP, everything else from disk.
pub struct DiskHttpFetcher {
    client: reqwest::Client,
}

impl DiskHttpFetcher {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for DiskHttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceFetcher for DiskHttpFetcher {
    async fn fetch(&self, source: &str) -> Result<Vec<u8>> {
        if source.contains("://") {
            let response = self.client.get(source).send().await?.error_for_status()?;
            Ok(response.bytes().await?.to_vec())
        } else {
            Ok(tokio::fs::read(source).await?)
        }
    }
}
