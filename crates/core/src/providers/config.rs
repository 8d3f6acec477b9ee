//! Statically configured font map provider.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::{provider::SourceProvider, variant::FontVariant};

/// Serves variants from a configured family map; never performs I/O.
pub struct ConfigProvider {
    map: HashMap<String, Vec<FontVariant>>,
}

impl ConfigProvider {
    pub fn new(map: HashMap<String, Vec<FontVariant>>) -> Self {
        Self { map }
    }
}

#[async_trait]
impl SourceProvider for ConfigProvider {
    async fn variants(&self, family: &str) -> Vec<FontVariant> {
        self.map.get(family).cloned().unwrap_or_default()
    }
}
