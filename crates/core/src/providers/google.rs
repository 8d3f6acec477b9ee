//! Google Fonts catalog provider.
//!
//! Fetches the webfonts catalog once and serves per-family variants out
//! of it. File keys follow the API's convention: `regular`, `italic`,
//! `700`, `700italic`.

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use log::warn;
use serde::Deserialize;

use crate::{
    cache::ResourceCache,
    error::Result,
    provider::SourceProvider,
    variant::{AxisCoord, FontVariant, ITAL, WGHT},
};

const CATALOG_URL: &str = "https://www.googleapis.com/webfonts/v1/webfonts";

const DEFAULT_TTL: Duration = Duration::from_secs(600);

type FamilyMap = HashMap<String, Vec<FontVariant>>;

#[derive(Debug, Deserialize)]
struct Catalog {
    #[serde(default)]
    items: Vec<CatalogFamily>,
}

#[derive(Debug, Deserialize)]
struct CatalogFamily {
    family: String,
    #[serde(default)]
    files: HashMap<String, String>,
}

pub struct GoogleProvider {
    api_key: String,
    client: reqwest::Client,
    cache: ResourceCache<String, Arc<FamilyMap>>,
}

impl GoogleProvider {
    pub fn new(api_key: impl Into<String>, ttl: Option<Duration>) -> Self {
        Self {
            api_key: api_key.into(),
            client: reqwest::Client::new(),
            cache: ResourceCache::new(Some(ttl.unwrap_or(DEFAULT_TTL))),
        }
    }

    async fn catalog(&self) -> Arc<FamilyMap> {
        let key = "catalog".to_string();
        self.cache
            .get_or_load(&key, move || async move {
                match self.load_catalog().await {
                    Ok(map) => Arc::new(map),
                    Err(err) => {
                        warn!("google fonts catalog fetch failed: {err}");
                        Arc::new(HashMap::new())
                    }
                }
            })
            .await
    }

    async fn load_catalog(&self) -> Result<FamilyMap> {
        let catalog: Catalog = self
            .client
            .get(CATALOG_URL)
            .query(&[("sort", "popularity"), ("key", self.api_key.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let mut map = HashMap::new();
        for item in catalog.items {
            let variants = item
                .files
                .iter()
                .filter_map(|(kind, source)| variant_for(kind, source))
                .collect();
            map.insert(item.family, variants);
        }
        Ok(map)
    }
}

fn variant_for(kind: &str, source: &str) -> Option<FontVariant> {
    let italic = kind.ends_with("italic");
    let weight_part = kind.trim_end_matches("italic");
    let wght: f32 = match weight_part {
        "" | "regular" => 400.0,
        digits => digits.parse().ok()?,
    };
    Some(
        FontVariant::new(source.replacen("http://", "https://", 1))
            .with_axis(WGHT, AxisCoord::Value(wght))
            .with_axis(ITAL, AxisCoord::Value(if italic { 1.0 } else { 0.0 })),
    )
}

#[async_trait]
impl SourceProvider for GoogleProvider {
    async fn variants(&self, family: &str) -> Vec<FontVariant> {
        self.catalog().await.get(family).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_keys_map_to_axes() {
        let regular = variant_for("regular", "http://g/a.ttf").unwrap();
        assert_eq!(regular.axis_bounds(WGHT), (400.0, 400.0));
        assert_eq!(regular.axis_bounds(ITAL), (0.0, 0.0));
        assert_eq!(regular.source, "https://g/a.ttf");

        let bold_italic = variant_for("700italic", "https://g/b.ttf").unwrap();
        assert_eq!(bold_italic.axis_bounds(WGHT), (700.0, 700.0));
        assert_eq!(bold_italic.axis_bounds(ITAL), (1.0, 1.0));

        let italic = variant_for("italic", "https://g/c.ttf").unwrap();
        assert_eq!(italic.axis_bounds(WGHT), (400.0, 400.0));
        assert_eq!(italic.axis_bounds(ITAL), (1.0, 1.0));

        assert!(variant_for("weird", "https://g/d.ttf").is_none());
    }
}
