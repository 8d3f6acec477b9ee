//! Filesystem font directory provider.
//!
//! One folder per family under the root directory:
//!
//! - static fonts: `<family>/<wght><i?>.ttf`, e.g. `400.ttf`, `700i.otf`
//! - variable fonts: semicolon-separated axis ranges in the file name,
//!   e.g. `wght,100..900;ital,0.ttf`

use std::{path::PathBuf, sync::Arc, time::Duration};

use async_trait::async_trait;
use font_types::Tag;
use indexmap::IndexMap;
use log::warn;

use crate::{
    cache::ResourceCache,
    provider::SourceProvider,
    variant::{AxisCoord, FontVariant, ITAL, WGHT},
};

pub struct DirProvider {
    root: PathBuf,
    cache: ResourceCache<String, Arc<Vec<FontVariant>>>,
}

impl DirProvider {
    /// Provider over a fonts directory. Scans are cached for `ttl`
    /// (`None` = for the provider's lifetime).
    pub fn new(root: impl Into<PathBuf>, ttl: Option<Duration>) -> Self {
        Self { root: root.into(), cache: ResourceCache::new(ttl) }
    }

    async fn scan(&self, family: &str) -> Vec<FontVariant> {
        let folder = self.root.join(family);
        let mut entries = match tokio::fs::read_dir(&folder).await {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };
        let mut result = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(err) => {
                    warn!("failed to scan {}: {err}", folder.display());
                    break;
                }
            };
            let path = entry.path();
            let stem = path.file_stem().and_then(|s| s.to_str());
            let ext = path.extension().and_then(|s| s.to_str());
            let (Some(stem), Some(ext)) = (stem, ext) else { continue };
            if !matches!(ext, "ttf" | "otf") {
                continue;
            }
            let source = path.to_string_lossy().into_owned();
            if let Some(variant) = parse_static_name(stem, &source) {
                result.push(variant);
            }
            if let Some(variant) = parse_axis_name(stem, &source) {
                result.push(variant);
            }
        }
        result
    }
}

/// `400.ttf` / `700i.ttf` style names.
fn parse_static_name(stem: &str, source: &str) -> Option<FontVariant> {
    let (digits, italic) = match stem.strip_suffix('i') {
        Some(rest) => (rest, true),
        None => (stem, false),
    };
    if digits.len() != 3 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let wght: f32 = digits.parse().ok()?;
    Some(
        FontVariant::new(source)
            .with_axis(WGHT, AxisCoord::Value(wght))
            .with_axis(ITAL, AxisCoord::Value(if italic { 1.0 } else { 0.0 })),
    )
}

/// `wght,100..900;ital,0` style names for variable fonts.
fn parse_axis_name(stem: &str, source: &str) -> Option<FontVariant> {
    let mut axes = IndexMap::new();
    for def in stem.split(';') {
        let (name, range) = def.split_once(',')?;
        if name.len() != 4 || !name.bytes().all(|b| b.is_ascii_alphabetic()) {
            return None;
        }
        let tag = Tag::new_checked(name.as_bytes()).ok()?;
        let coord = match range.split_once("..") {
            Some((lo, hi)) => AxisCoord::Range(lo.parse().ok()?, hi.parse().ok()?),
            None => AxisCoord::Value(range.parse().ok()?),
        };
        axes.insert(tag, coord);
    }
    if axes.is_empty() {
        return None;
    }
    Some(FontVariant { source: source.to_string(), axes })
}

#[async_trait]
impl SourceProvider for DirProvider {
    async fn variants(&self, family: &str) -> Vec<FontVariant> {
        let key = family.to_string();
        let list = self
            .cache
            .get_or_load(&key, move || async move { Arc::new(self.scan(family).await) })
            .await;
        (*list).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::WDTH;

    #[test]
    fn static_names_carry_weight_and_italic() {
        let variant = parse_static_name("700i", "p").unwrap();
        assert_eq!(variant.axis_bounds(WGHT), (700.0, 700.0));
        assert_eq!(variant.axis_bounds(ITAL), (1.0, 1.0));
        assert!(parse_static_name("70", "p").is_none());
        assert!(parse_static_name("Regular", "p").is_none());
    }

    #[test]
    fn axis_names_carry_ranges() {
        let variant = parse_axis_name("wght,100..900;wdth,75..125", "p").unwrap();
        assert_eq!(variant.axis_bounds(WGHT), (100.0, 900.0));
        assert_eq!(variant.axis_bounds(WDTH), (75.0, 125.0));
        assert!(parse_axis_name("whatever", "p").is_none());
    }
}
