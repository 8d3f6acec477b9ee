//! Shared test doubles: an in-memory font engine and fetcher.
//!
//! Mock font sources are spec strings such as `adv=0.5 missing=XY`
//! (per-glyph advance in em units, characters without glyph coverage);
//! a source starting with `bad` fails to parse.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use font_types::Tag;
use indexmap::IndexMap;

use crate::{
    error::{Error, Result},
    fetch::SourceFetcher,
    font::{FontEngine, FontMetrics, ParsedFont, ShapedGlyph},
    style::FontStyle,
    variant::FontVariant,
};

pub struct MockFont {
    pub advance: f32,
    pub missing: Vec<char>,
}

impl ParsedFont for MockFont {
    fn metrics(&self) -> FontMetrics {
        FontMetrics {
            units_per_em: 1000,
            ascent: 0.8,
            descent: -0.2,
            cap_height: 0.7,
            x_height: 0.5,
        }
    }

    fn has_glyph(&self, ch: char) -> bool {
        !self.missing.contains(&ch)
    }

    fn shape(&self, text: &str, size: f32, _features: &IndexMap<Tag, u32>) -> Vec<ShapedGlyph> {
        text.chars()
            .map(|ch| ShapedGlyph {
                glyph_id: ch as u32,
                advance_x: self.advance * size,
                ..ShapedGlyph::default()
            })
            .collect()
    }

    fn glyph_path(
        &self,
        _glyph_id: u32,
        size: f32,
        x: f64,
        y: f64,
        scale_x: f64,
        decimals: u8,
    ) -> String {
        let width = f64::from(self.advance * size) * scale_x;
        format!(
            "M{} {}H{}",
            fmt(x, decimals),
            fmt(y, decimals),
            fmt(x + width, decimals)
        )
    }

    fn variation_axes(&self) -> Vec<Tag> {
        Vec::new()
    }

    fn instance(&self, _coords: &[(Tag, f32)]) -> Arc<dyn ParsedFont> {
        Arc::new(MockFont { advance: self.advance, missing: self.missing.clone() })
    }
}

fn fmt(value: f64, decimals: u8) -> String {
    format!("{value:.prec$}", prec = usize::from(decimals))
}

pub struct MockEngine;

impl FontEngine for MockEngine {
    fn parse(&self, bytes: Arc<Vec<u8>>) -> Result<Arc<dyn ParsedFont>> {
        let spec = String::from_utf8_lossy(&bytes).into_owned();
        if spec.starts_with("bad") {
            return Err(Error::FontParse("unparseable test font".to_string()));
        }
        let mut advance = 0.5;
        let mut missing = Vec::new();
        for token in spec.split_whitespace() {
            if let Some(value) = token.strip_prefix("adv=") {
                advance = value.parse().unwrap();
            }
            if let Some(value) = token.strip_prefix("missing=") {
                missing = value.chars().collect();
            }
        }
        Ok(Arc::new(MockFont { advance, missing }))
    }
}

/// Fetcher returning the source string itself as the font bytes.
pub struct EchoFetcher;

#[async_trait]
impl SourceFetcher for EchoFetcher {
    async fn fetch(&self, source: &str) -> Result<Vec<u8>> {
        Ok(source.as_bytes().to_vec())
    }
}

/// Config-provider map with one default-axis variant per family.
pub fn config_map(entries: &[(&str, &str)]) -> HashMap<String, Vec<FontVariant>> {
    entries
        .iter()
        .map(|(family, spec)| (family.to_string(), vec![FontVariant::new(*spec)]))
        .collect()
}

pub fn style_for(families: &[&str]) -> Arc<FontStyle> {
    Arc::new(FontStyle::new(
        families.iter().map(|f| f.to_string()).collect(),
        IndexMap::new(),
        IndexMap::new(),
    ))
}
