//! Normalized font styles derived from computed presentation.

use font_types::Tag;
use indexmap::IndexMap;

use crate::{
    dom::{Document, NodeId, split_number_unit},
    variant::{AXIS_DEFAULTS, FontVariant, ITAL, SLNT, WDTH, WGHT, axis_default},
};

/// Family used when style lookup yields no families at all.
pub const DEFAULT_FAMILY: &str = "serif";

/// Oblique angle in degrees when `font-style: oblique` carries none.
const DEFAULT_OBLIQUE_DEG: f32 = 14.0;

/// CSS font-stretch keywords as wdth percentages.
const STRETCH_KEYWORDS: &[(&str, f32)] = &[
    ("ultra-condensed", 50.0),
    ("extra-condensed", 62.5),
    ("condensed", 75.0),
    ("semi-condensed", 87.5),
    ("normal", 100.0),
    ("semi-expanded", 112.5),
    ("expanded", 125.0),
    ("extra-expanded", 150.0),
    ("ultra-expanded", 200.0),
];

/// A normalized font request: family list, variable-axis targets and
/// typographic feature toggles. Immutable once built for an element.
#[derive(Debug, Clone, PartialEq)]
pub struct FontStyle {
    pub families: Vec<String>,
    pub axes: IndexMap<Tag, f32>,
    pub features: IndexMap<Tag, u32>,
}

impl FontStyle {
    /// Build a style; an empty family list falls back to the implicit
    /// default family.
    pub fn new(
        mut families: Vec<String>,
        axes: IndexMap<Tag, f32>,
        features: IndexMap<Tag, u32>,
    ) -> Self {
        if families.is_empty() {
            families.push(DEFAULT_FAMILY.to_string());
        }
        Self { families, axes, features }
    }

    pub fn axis(&self, tag: Tag) -> Option<f32> {
        self.axes.get(&tag).copied()
    }

    /// Requested value for an axis, defaulted per the axis table.
    pub fn requested(&self, tag: Tag) -> f32 {
        self.axis(tag).unwrap_or_else(|| axis_default(tag))
    }

    /// Whether a variant exactly satisfies every registered requested
    /// axis.
    pub fn matches(&self, variant: &FontVariant) -> bool {
        AXIS_DEFAULTS.iter().all(|&(tag, _)| variant.contains(tag, self.axis(tag)))
    }

    /// Stable key of the requested registered axes within a family, used
    /// to deduplicate mismatch warnings.
    pub fn key(&self, family: &str) -> String {
        let mut key = family.to_string();
        for &(tag, _) in AXIS_DEFAULTS.iter() {
            key.push_str(&format!("|{tag}={}", self.requested(tag)));
        }
        key
    }
}

/// Derive the normalized font style for a node from its computed
/// presentation.
pub fn font_style_for_node(doc: &Document, node: NodeId) -> FontStyle {
    let families = doc
        .style_prop(node, "font-family")
        .map(|val| {
            val.split(',')
                .map(|name| name.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
                .filter(|name| !name.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let mut axes = IndexMap::new();
    axes.insert(WGHT, parse_weight(doc.style_prop(node, "font-weight").as_deref()));

    let font_style = doc.style_prop(node, "font-style");
    let ital = match font_style.as_deref() {
        Some("italic") => 1.0,
        _ => 0.0,
    };
    axes.insert(ITAL, ital);
    if let Some(rest) = font_style.as_deref().and_then(|v| v.strip_prefix("oblique")) {
        let angle = rest.trim().trim_end_matches("deg").trim();
        let angle = if angle.is_empty() {
            DEFAULT_OBLIQUE_DEG
        } else {
            angle.parse().unwrap_or(0.0)
        };
        axes.insert(SLNT, -angle);
    }

    if let Some(val) = doc.style_prop(node, "font-stretch") {
        let val = val.trim().to_string();
        if val != "normal" && val != "100%" {
            axes.insert(WDTH, parse_stretch(&val));
        }
    }

    if let Some(val) = doc.style_prop(node, "font-variation-settings") {
        if val.trim() != "normal" {
            for (tag, value) in parse_variation_settings(&val) {
                axes.insert(tag, value);
            }
        }
    }

    let mut features = IndexMap::new();
    if doc.style_prop(node, "font-kerning").as_deref() == Some("none") {
        features.insert(Tag::new(b"kern"), 0);
    }
    if let Some(val) = doc.style_prop(node, "font-feature-settings") {
        if val.trim() != "normal" {
            for (tag, value) in parse_feature_settings(&val) {
                features.insert(tag, value);
            }
        }
    }

    FontStyle::new(families, axes, features)
}

fn parse_weight(value: Option<&str>) -> f32 {
    match value.map(str::trim) {
        Some("normal") => 400.0,
        Some("bold") => 700.0,
        Some(other) => split_number_unit(other).map(|(v, _)| v).filter(|v| *v > 0.0).unwrap_or(400.0),
        None => 400.0,
    }
}

fn parse_stretch(value: &str) -> f32 {
    if let Some(&(_, wdth)) = STRETCH_KEYWORDS.iter().find(|(name, _)| *name == value) {
        return wdth;
    }
    split_number_unit(value).map(|(v, _)| v).filter(|v| *v > 0.0).unwrap_or(100.0)
}

/// Parse `font-variation-settings`, e.g. `"wght" 632.5, 'slnt' -10`.
fn parse_variation_settings(input: &str) -> Vec<(Tag, f32)> {
    let mut out = Vec::new();
    for item in input.split(',') {
        let Some((tag, rest)) = parse_quoted_tag(item.trim()) else { continue };
        if let Ok(value) = rest.trim().parse::<f32>() {
            out.push((tag, value));
        }
    }
    out
}

/// Parse `font-feature-settings`, e.g. `"liga" off, "ss01", "tnum" 2`.
fn parse_feature_settings(input: &str) -> Vec<(Tag, u32)> {
    let mut out = Vec::new();
    for item in input.split(',') {
        let Some((tag, rest)) = parse_quoted_tag(item.trim()) else { continue };
        let value = match rest.trim() {
            "" | "on" => Some(1),
            "off" => Some(0),
            number => number.parse().ok(),
        };
        if let Some(value) = value {
            out.push((tag, value));
        }
    }
    out
}

fn parse_quoted_tag(input: &str) -> Option<(Tag, &str)> {
    let quote = input.chars().next()?;
    if quote != '"' && quote != '\'' {
        return None;
    }
    let rest = &input[1..];
    let end = rest.find(quote)?;
    let tag = Tag::new_checked(rest[..end].as_bytes()).ok()?;
    Some((tag, &rest[end + 1..]))
}
