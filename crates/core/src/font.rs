//! Contracts consumed from the font engine, and resolved font handles.

use std::{fmt, sync::Arc};

use font_types::Tag;
use indexmap::IndexMap;

use crate::{error::Result, style::FontStyle, variant::FontVariant};

/// Vertical metrics in font-size-relative units. `descent` is negative,
/// matching the font's own coordinate direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontMetrics {
    pub units_per_em: u16,
    pub ascent: f32,
    pub descent: f32,
    pub cap_height: f32,
    pub x_height: f32,
}

/// One positioned glyph from shaping, scaled to the requested font size.
/// Offsets and advances are in SVG's y-down space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ShapedGlyph {
    pub glyph_id: u32,
    pub advance_x: f32,
    pub advance_y: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

/// A parsed font resource.
pub trait ParsedFont: Send + Sync {
    fn metrics(&self) -> FontMetrics;

    /// Whether the font maps this codepoint to a glyph.
    fn has_glyph(&self, ch: char) -> bool;

    /// Shape text at `size`, honoring typographic feature toggles
    /// (kerning and ligatures included).
    fn shape(&self, text: &str, size: f32, features: &IndexMap<Tag, u32>) -> Vec<ShapedGlyph>;

    /// SVG path data for a glyph at an absolute position. `scale_x`
    /// stretches horizontally (length justification); `decimals` bounds
    /// coordinate precision.
    fn glyph_path(&self, glyph_id: u32, size: f32, x: f64, y: f64, scale_x: f64, decimals: u8)
    -> String;

    /// Tags of the variation axes this font supports.
    fn variation_axes(&self) -> Vec<Tag>;

    /// A concrete instance at the given axis coordinates.
    fn instance(&self, coords: &[(Tag, f32)]) -> Arc<dyn ParsedFont>;
}

/// Parses raw font bytes into a usable handle.
pub trait FontEngine: Send + Sync {
    fn parse(&self, bytes: Arc<Vec<u8>>) -> Result<Arc<dyn ParsedFont>>;
}

/// A parsed font bound to the family and variant it resolved from.
pub struct ResolvedFont {
    pub family: String,
    pub variant: Arc<FontVariant>,
    pub font: Arc<dyn ParsedFont>,
}

impl ResolvedFont {
    pub fn new(
        family: impl Into<String>,
        variant: Arc<FontVariant>,
        font: Arc<dyn ParsedFont>,
    ) -> Self {
        Self { family: family.into(), variant, font }
    }

    pub fn metrics(&self) -> FontMetrics {
        self.font.metrics()
    }

    pub fn shape(&self, text: &str, size: f32, features: &IndexMap<Tag, u32>) -> Vec<ShapedGlyph> {
        self.font.shape(text, size, features)
    }

    pub fn glyph_path(
        &self,
        glyph_id: u32,
        size: f32,
        x: f64,
        y: f64,
        scale_x: f64,
        decimals: u8,
    ) -> String {
        self.font.glyph_path(glyph_id, size, x, y, scale_x, decimals)
    }
}

impl fmt::Debug for ResolvedFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedFont")
            .field("family", &self.family)
            .field("variant", &self.variant)
            .finish_non_exhaustive()
    }
}

/// Resolution result for one requested character.
#[derive(Debug, Clone)]
pub struct FontForChar {
    pub font: Option<Arc<ResolvedFont>>,
    pub ch: char,
    pub style: Arc<FontStyle>,
    pub is_fallback: bool,
}
