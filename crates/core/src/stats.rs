//! Session facts and aggregate statistics.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Arc, Mutex},
};

use font_types::Tag;
use indexmap::IndexMap;
use serde_json::{Value, json};

use crate::{style::FontStyle, variant::FontVariant};

/// A used variant that did not exactly satisfy the requested axes.
#[derive(Debug, Clone)]
pub struct MismatchWarning {
    pub family: String,
    pub axes: IndexMap<Tag, f32>,
    pub variant: Arc<FontVariant>,
}

/// A located variant whose bytes could not be fetched or parsed.
#[derive(Debug, Clone)]
pub struct LoadError {
    pub family: String,
    pub variant: Arc<FontVariant>,
}

/// Recorded, non-fatal resolution facts for one element conversion.
///
/// Records are idempotent: each fact is keyed by a stable identity, so
/// aggregation is deterministic regardless of resolution order.
#[derive(Default)]
pub struct FactSink {
    missed: Mutex<BTreeSet<String>>,
    warnings: Mutex<BTreeMap<String, MismatchWarning>>,
    errors: Mutex<BTreeMap<String, LoadError>>,
}

impl FactSink {
    /// A family yielded no variant sources at all.
    pub fn missed_family(&self, family: &str) {
        self.missed.lock().unwrap().insert(family.to_string());
    }

    /// A variant was used without satisfying every requested axis.
    pub fn mismatch(&self, family: &str, style: &FontStyle, variant: &Arc<FontVariant>) {
        self.warnings
            .lock()
            .unwrap()
            .entry(style.key(family))
            .or_insert_with(|| MismatchWarning {
                family: family.to_string(),
                axes: style.axes.clone(),
                variant: Arc::clone(variant),
            });
    }

    /// A variant was located but failed to load or parse.
    pub fn load_error(&self, family: &str, variant: &Arc<FontVariant>) {
        self.errors
            .lock()
            .unwrap()
            .entry(variant.identity(family))
            .or_insert_with(|| LoadError {
                family: family.to_string(),
                variant: Arc::clone(variant),
            });
    }

    pub fn into_facts(self) -> ElementFacts {
        ElementFacts {
            missed: self.missed.into_inner().unwrap().into_iter().collect(),
            warnings: self.warnings.into_inner().unwrap(),
            errors: self.errors.into_inner().unwrap(),
        }
    }
}

/// Facts recorded while converting one element.
#[derive(Debug, Clone, Default)]
pub struct ElementFacts {
    pub missed: Vec<String>,
    pub warnings: BTreeMap<String, MismatchWarning>,
    pub errors: BTreeMap<String, LoadError>,
}

/// A variant that rendered characters, with its usage count.
#[derive(Debug, Clone)]
pub struct UsedVariant {
    pub family: String,
    pub variant: Arc<FontVariant>,
    pub chars: usize,
}

/// Aggregate conversion statistics for a whole document.
#[derive(Debug, Default)]
pub struct SessionStat {
    /// Elements matched by the selector.
    pub total: usize,
    /// Elements actually converted.
    pub replaced: usize,
    pub used: Vec<UsedVariant>,
    /// Characters left unrendered.
    pub skipped: usize,
    pub missed: Vec<String>,
    pub warnings: Vec<MismatchWarning>,
    pub errors: Vec<LoadError>,
}

impl SessionStat {
    pub fn to_json(&self) -> Value {
        json!({
            "total": self.total,
            "replaced": self.replaced,
            "used": self.used.iter().map(|u| json!({
                "family": u.family,
                "variant": u.variant.to_json(),
                "chars": u.chars,
            })).collect::<Vec<_>>(),
            "skipped": self.skipped,
            "missed": self.missed,
            "warnings": self.warnings.iter().map(|w| json!({
                "family": w.family,
                "axes": w.axes.iter()
                    .map(|(tag, value)| (tag.to_string(), json!(value)))
                    .collect::<serde_json::Map<_, _>>(),
                "variant": w.variant.to_json(),
            })).collect::<Vec<_>>(),
            "errors": self.errors.iter().map(|e| json!({
                "family": e.family,
                "variant": e.variant.to_json(),
            })).collect::<Vec<_>>(),
        })
    }
}
