//! HTTP font repository provider.
//!
//! Two repository shapes are supported: a per-family endpoint (the URL
//! contains the `--family--` placeholder and returns a JSON array of
//! variants), or a single endpoint returning one JSON map of family name
//! to variant array.

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use log::warn;
use serde::Deserialize;

use crate::{cache::ResourceCache, error::Result, provider::SourceProvider, variant::FontVariant};

pub const FAMILY_PLACEHOLDER: &str = "--family--";

const DEFAULT_TTL: Duration = Duration::from_secs(600);

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RepoData {
    List(Vec<FontVariant>),
    Map(HashMap<String, Vec<FontVariant>>),
}

pub struct HttpProvider {
    repo_url: String,
    per_family: bool,
    client: reqwest::Client,
    cache: ResourceCache<String, Arc<RepoData>>,
}

impl HttpProvider {
    /// Provider over a repository URL. Responses are cached for `ttl`,
    /// defaulting to ten minutes.
    pub fn new(repo_url: impl Into<String>, ttl: Option<Duration>) -> Self {
        let repo_url = repo_url.into();
        let per_family = repo_url.contains(FAMILY_PLACEHOLDER);
        Self {
            repo_url,
            per_family,
            client: reqwest::Client::new(),
            cache: ResourceCache::new(Some(ttl.unwrap_or(DEFAULT_TTL))),
        }
    }

    fn url_for(&self, family: &str) -> String {
        self.repo_url.replace(FAMILY_PLACEHOLDER, &family.replace(' ', "%20"))
    }

    async fn data_for(&self, family: &str) -> Arc<RepoData> {
        let url = self.url_for(family);
        let fetch_url = url.clone();
        self.cache
            .get_or_load(&url, move || async move {
                match self.load(&fetch_url).await {
                    Ok(data) => Arc::new(data),
                    Err(err) => {
                        warn!("font repository fetch failed for {fetch_url}: {err}");
                        Arc::new(RepoData::List(Vec::new()))
                    }
                }
            })
            .await
    }

    async fn load(&self, url: &str) -> Result<RepoData> {
        Ok(self.client.get(url).send().await?.error_for_status()?.json().await?)
    }
}

#[async_trait]
impl SourceProvider for HttpProvider {
    async fn variants(&self, family: &str) -> Vec<FontVariant> {
        match &*self.data_for(family).await {
            RepoData::List(list) => list.clone(),
            RepoData::Map(map) => map.get(family).cloned().unwrap_or_default(),
        }
    }
}
