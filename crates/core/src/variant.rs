//! Font variant descriptors and CSS-style variant matching.

use std::cmp::Ordering;

use font_types::Tag;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, de};
use serde_json::{Value, json};

use crate::style::FontStyle;

pub const WDTH: Tag = Tag::new(b"wdth");
pub const WGHT: Tag = Tag::new(b"wght");
pub const ITAL: Tag = Tag::new(b"ital");
pub const SLNT: Tag = Tag::new(b"slnt");

/// Registered axes with their default values, in matching order.
pub const AXIS_DEFAULTS: [(Tag, f32); 4] =
    [(WDTH, 100.0), (WGHT, 400.0), (ITAL, 0.0), (SLNT, 0.0)];

/// Default value for an axis; custom axes default to zero.
pub fn axis_default(tag: Tag) -> f32 {
    AXIS_DEFAULTS
        .iter()
        .find(|(t, _)| *t == tag)
        .map(|(_, v)| *v)
        .unwrap_or(0.0)
}

/// A fixed axis position or an inclusive variable-font range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AxisCoord {
    Value(f32),
    Range(f32, f32),
}

impl AxisCoord {
    pub fn bounds(self) -> (f32, f32) {
        match self {
            AxisCoord::Value(v) => (v, v),
            AxisCoord::Range(lo, hi) => (lo, hi),
        }
    }
}

/// One physical font resource: an opaque source locator plus the axis
/// values or ranges it covers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FontVariant {
    pub source: String,
    pub axes: IndexMap<Tag, AxisCoord>,
}

impl FontVariant {
    pub fn new(source: impl Into<String>) -> Self {
        Self { source: source.into(), axes: IndexMap::new() }
    }

    pub fn with_axis(mut self, tag: Tag, coord: AxisCoord) -> Self {
        self.axes.insert(tag, coord);
        self
    }

    /// Axis coverage, defaulted for absent axes.
    pub fn axis_bounds(&self, tag: Tag) -> (f32, f32) {
        match self.axes.get(&tag) {
            Some(coord) => coord.bounds(),
            None => {
                let d = axis_default(tag);
                (d, d)
            }
        }
    }

    /// Clamp a requested value into this variant's supported range.
    pub fn clamp(&self, tag: Tag, target: f32) -> f32 {
        let (lo, hi) = self.axis_bounds(tag);
        if target < lo {
            lo
        } else if target > hi {
            hi
        } else {
            target
        }
    }

    /// Whether the supported range contains the requested value
    /// (axis default when `None`).
    pub fn contains(&self, tag: Tag, target: Option<f32>) -> bool {
        let target = target.unwrap_or_else(|| axis_default(tag));
        let (lo, hi) = self.axis_bounds(tag);
        lo <= target && target <= hi
    }

    /// Normalized registered-axis signature, shared by all variants with
    /// equivalent coverage.
    pub fn axis_signature(&self) -> String {
        let mut sig = String::new();
        for (tag, _) in AXIS_DEFAULTS {
            let (lo, hi) = self.axis_bounds(tag);
            if !sig.is_empty() {
                sig.push(',');
            }
            sig.push_str(&format!("{tag}={lo}..{hi}"));
        }
        sig
    }

    /// Stable identity of this physical resource within a family.
    pub fn identity(&self, family: &str) -> String {
        format!("{family}|{}|{}", self.source, self.axis_signature())
    }

    pub fn to_json(&self) -> Value {
        let mut obj = serde_json::Map::new();
        for (tag, coord) in &self.axes {
            let value = match *coord {
                AxisCoord::Value(v) => json!(v),
                AxisCoord::Range(lo, hi) => json!([lo, hi]),
            };
            obj.insert(tag.to_string(), value);
        }
        obj.insert("source".to_string(), json!(self.source));
        Value::Object(obj)
    }
}

impl<'de> Deserialize<'de> for FontVariant {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawCoord {
            Value(f32),
            Range([f32; 2]),
        }

        #[derive(Deserialize)]
        struct Raw {
            source: String,
            #[serde(flatten)]
            axes: IndexMap<String, RawCoord>,
        }

        let raw = Raw::deserialize(deserializer)?;
        let mut axes = IndexMap::new();
        for (name, coord) in raw.axes {
            let tag = Tag::new_checked(name.as_bytes())
                .map_err(|_| de::Error::custom(format!("invalid axis tag '{name}'")))?;
            let coord = match coord {
                RawCoord::Value(v) => AxisCoord::Value(v),
                RawCoord::Range([lo, hi]) => AxisCoord::Range(lo, hi),
            };
            axes.insert(tag, coord);
        }
        Ok(FontVariant { source: raw.source, axes })
    }
}

/// Select the best variant for a requested style, or `None` for an empty
/// candidate set.
///
/// Follows the CSS Fonts 4 font style matching algorithm as successive
/// filter-and-sort passes over width, italic/slant and weight. Each pass
/// clamps a variant's range to the nearest supported value before
/// comparing, then narrows the candidates to those containing the pass's
/// resolved target.
pub fn best_variant<'a>(style: &FontStyle, variants: &'a [FontVariant]) -> Option<&'a FontVariant> {
    if variants.is_empty() {
        return None;
    }
    let mut candidates: Vec<&FontVariant> = variants.iter().collect();

    let wdth = style.axis(WDTH).unwrap_or(100.0);
    select(&mut candidates, WDTH, wdth, wdth <= 100.0, None);

    let ital = style.axis(ITAL).unwrap_or(0.0);
    let slnt = style.axis(SLNT).unwrap_or(0.0);
    if ital == 0.0 && slnt == 0.0 {
        select(&mut candidates, SLNT, 0.0, true, None);
        select(&mut candidates, ITAL, 0.0, false, None);
    } else if ital > 0.0 && candidates.iter().any(|v| v.clamp(ITAL, 1.0) > 0.0) {
        select(&mut candidates, ITAL, ital, false, None);
    } else if candidates.iter().any(|v| {
        // Oblique faces count when their slant points the requested way;
        // italic requests probe at the conventional -11 degrees.
        let probe = if ital <= 0.0 && slnt > 0.0 { 11.0 } else { -11.0 };
        let val = v.clamp(SLNT, probe);
        if slnt > 0.0 { val > 0.0 } else { val < 0.0 }
    }) {
        if ital > 0.0 {
            select(&mut candidates, SLNT, -11.0, true, None);
        } else {
            let bias_low = slnt <= -11.0 || (0.0..11.0).contains(&slnt);
            select(&mut candidates, SLNT, slnt, bias_low, None);
        }
    } else if candidates.iter().any(|v| v.clamp(ITAL, 1.0) > 0.0) {
        select(&mut candidates, ITAL, 1.0, slnt.abs() < 11.0, None);
    } else {
        select(&mut candidates, SLNT, 0.0, slnt > 0.0, None);
    }

    let wght = style.axis(WGHT).unwrap_or(400.0);
    select(&mut candidates, WGHT, wght, wght < 400.0, Some(500.0));

    candidates.first().copied()
}

/// One matching pass: stable-sort by clamped value under the pass's bias
/// rule, then keep only candidates whose range contains the resolved
/// target (the winner's clamped value).
fn select(
    candidates: &mut Vec<&FontVariant>,
    tag: Tag,
    target: f32,
    prefer_below: bool,
    threshold: Option<f32>,
) {
    if candidates.is_empty() {
        return;
    }
    candidates.sort_by(|a, b| {
        compare(a.clamp(tag, target), b.clamp(tag, target), target, prefer_below, threshold)
    });
    let resolved = candidates[0].clamp(tag, target);
    candidates.retain(|v| v.contains(tag, Some(resolved)));
}

fn compare(a: f32, b: f32, target: f32, prefer_below: bool, threshold: Option<f32>) -> Ordering {
    if prefer_below {
        // Values at or below the target win; above it, nearest first.
        return if a > target || b > target { a.total_cmp(&b) } else { b.total_cmp(&a) };
    }
    if let Some(thr) = threshold {
        // Tie-break boundary: requests at or under the threshold avoid
        // candidates beyond it when possible.
        if target <= thr && (a > thr || b > thr) {
            return a.total_cmp(&b);
        }
    }
    // Values at or above the target win; below it, nearest first.
    if a < target || b < target { b.total_cmp(&a) } else { a.total_cmp(&b) }
}
