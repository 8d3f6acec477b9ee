//! Default font engine: skrifa for metrics, glyph coverage and outline
//! extraction, rustybuzz for shaping.
//!
//! Fonts are kept as validated owned bytes; the zero-copy parser views
//! are re-created per call, so handles stay cheaply cloneable and
//! variable-font instances share the underlying data.

use std::sync::Arc;

use font_types::Tag;
use indexmap::IndexMap;
use kurbo::{Affine, BezPath, PathEl, Point};
use skrifa::{
    FontRef, GlyphId, MetadataProvider,
    instance::{Location, Size},
    outline::{DrawSettings, OutlinePen},
    setting::VariationSetting,
};
use textoutline_core::{Error, FontEngine, FontMetrics, ParsedFont, Result, ShapedGlyph};

/// Engine parsing raw sfnt bytes into [`OutlineFont`] handles.
#[derive(Debug, Default)]
pub struct OutlineFontEngine;

impl OutlineFontEngine {
    pub fn new() -> Self {
        Self
    }
}

impl FontEngine for OutlineFontEngine {
    fn parse(&self, bytes: Arc<Vec<u8>>) -> Result<Arc<dyn ParsedFont>> {
        FontRef::new(&bytes).map_err(|err| Error::FontParse(err.to_string()))?;
        if rustybuzz::Face::from_slice(&bytes, 0).is_none() {
            return Err(Error::FontParse("font tables unusable for shaping".to_string()));
        }
        Ok(Arc::new(OutlineFont { data: bytes, variations: Vec::new() }))
    }
}

/// A parsed font over owned bytes, optionally pinned to variation
/// coordinates.
pub struct OutlineFont {
    data: Arc<Vec<u8>>,
    variations: Vec<(Tag, f32)>,
}

impl OutlineFont {
    fn font(&self) -> FontRef<'_> {
        // Bytes were validated when the engine parsed them.
        FontRef::new(&self.data).expect("font data validated on load")
    }

    fn location(&self, font: &FontRef<'_>) -> Location {
        font.axes().location(
            self.variations.iter().map(|&(tag, value)| VariationSetting::new(tag, value)),
        )
    }

    fn buzz_tag(tag: Tag) -> rustybuzz::ttf_parser::Tag {
        rustybuzz::ttf_parser::Tag::from_bytes(&tag.to_be_bytes())
    }
}

impl ParsedFont for OutlineFont {
    fn metrics(&self) -> FontMetrics {
        let font = self.font();
        let location = self.location(&font);
        let metrics = skrifa::metrics::Metrics::new(&font, Size::unscaled(), &location);
        let upem = metrics.units_per_em.max(1);
        let scale = f32::from(upem);
        FontMetrics {
            units_per_em: upem,
            ascent: metrics.ascent / scale,
            descent: metrics.descent / scale,
            cap_height: metrics.cap_height.unwrap_or(metrics.ascent * 0.7) / scale,
            x_height: metrics.x_height.unwrap_or(metrics.ascent * 0.5) / scale,
        }
    }

    fn has_glyph(&self, ch: char) -> bool {
        self.font().charmap().map(ch).is_some()
    }

    fn shape(&self, text: &str, size: f32, features: &IndexMap<Tag, u32>) -> Vec<ShapedGlyph> {
        let Some(mut face) = rustybuzz::Face::from_slice(&self.data, 0) else {
            return Vec::new();
        };
        if !self.variations.is_empty() {
            let variations: Vec<rustybuzz::Variation> = self
                .variations
                .iter()
                .map(|&(tag, value)| rustybuzz::Variation {
                    tag: Self::buzz_tag(tag),
                    value,
                })
                .collect();
            face.set_variations(&variations);
        }
        let scale = size / face.units_per_em() as f32;
        let mut buffer = rustybuzz::UnicodeBuffer::new();
        buffer.push_str(text);
        let features: Vec<rustybuzz::Feature> = features
            .iter()
            .map(|(&tag, &value)| rustybuzz::Feature::new(Self::buzz_tag(tag), value, ..))
            .collect();
        let output = rustybuzz::shape(&face, &features, buffer);
        output
            .glyph_positions()
            .iter()
            .zip(output.glyph_infos())
            .map(|(pos, info)| ShapedGlyph {
                glyph_id: info.glyph_id,
                advance_x: pos.x_advance as f32 * scale,
                // Shaping output is y-up; layout composes in SVG's
                // y-down space.
                advance_y: -pos.y_advance as f32 * scale,
                offset_x: pos.x_offset as f32 * scale,
                offset_y: -pos.y_offset as f32 * scale,
            })
            .collect()
    }

    fn glyph_path(
        &self,
        glyph_id: u32,
        size: f32,
        x: f64,
        y: f64,
        scale_x: f64,
        decimals: u8,
    ) -> String {
        let font = self.font();
        let location = self.location(&font);
        let Some(outline) = font.outline_glyphs().get(GlyphId::new(glyph_id)) else {
            return String::new();
        };
        let mut pen = BezPen::default();
        let settings = DrawSettings::unhinted(Size::unscaled(), &location);
        if outline.draw(settings, &mut pen).is_err() {
            return String::new();
        }
        let metrics = skrifa::metrics::Metrics::new(&font, Size::unscaled(), &location);
        let scale = f64::from(size) / f64::from(metrics.units_per_em.max(1));
        let transform =
            Affine::translate((x, y)) * Affine::new([scale_x * scale, 0.0, 0.0, -scale, 0.0, 0.0]);
        write_path_data(&(transform * pen.path), decimals)
    }

    fn variation_axes(&self) -> Vec<Tag> {
        self.font().axes().iter().map(|axis| axis.tag()).collect()
    }

    fn instance(&self, coords: &[(Tag, f32)]) -> Arc<dyn ParsedFont> {
        let mut variations = self.variations.clone();
        for &(tag, value) in coords {
            match variations.iter_mut().find(|(t, _)| *t == tag) {
                Some(slot) => slot.1 = value,
                None => variations.push((tag, value)),
            }
        }
        Arc::new(OutlineFont { data: Arc::clone(&self.data), variations })
    }
}

/// Pen collecting skrifa outline callbacks into a kurbo path.
#[derive(Default)]
struct BezPen {
    path: BezPath,
}

impl OutlinePen for BezPen {
    fn move_to(&mut self, x: f32, y: f32) {
        self.path.move_to((f64::from(x), f64::from(y)));
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.path.line_to((f64::from(x), f64::from(y)));
    }

    fn quad_to(&mut self, cx0: f32, cy0: f32, x: f32, y: f32) {
        self.path
            .quad_to((f64::from(cx0), f64::from(cy0)), (f64::from(x), f64::from(y)));
    }

    fn curve_to(&mut self, cx0: f32, cy0: f32, cx1: f32, cy1: f32, x: f32, y: f32) {
        self.path.curve_to(
            (f64::from(cx0), f64::from(cy0)),
            (f64::from(cx1), f64::from(cy1)),
            (f64::from(x), f64::from(y)),
        );
    }

    fn close(&mut self) {
        self.path.close_path();
    }
}

/// Serialize a path as SVG path data with bounded decimal places.
fn write_path_data(path: &BezPath, decimals: u8) -> String {
    let mut out = String::new();
    for element in path.elements() {
        match element {
            PathEl::MoveTo(p) => {
                out.push('M');
                write_points(&mut out, &[*p], decimals);
            }
            PathEl::LineTo(p) => {
                out.push('L');
                write_points(&mut out, &[*p], decimals);
            }
            PathEl::QuadTo(c, p) => {
                out.push('Q');
                write_points(&mut out, &[*c, *p], decimals);
            }
            PathEl::CurveTo(c0, c1, p) => {
                out.push('C');
                write_points(&mut out, &[*c0, *c1, *p], decimals);
            }
            PathEl::ClosePath => out.push('Z'),
        }
    }
    out
}

fn write_points(out: &mut String, points: &[Point], decimals: u8) {
    for (i, point) in points.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&format_coord(point.x, decimals));
        out.push(' ');
        out.push_str(&format_coord(point.y, decimals));
    }
}

fn format_coord(value: f64, decimals: u8) -> String {
    let formatted = format!("{value:.prec$}", prec = usize::from(decimals));
    let trimmed = if formatted.contains('.') {
        formatted.trim_end_matches('0').trim_end_matches('.')
    } else {
        formatted.as_str()
    };
    if trimmed == "-0" { "0".to_string() } else { trimmed.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(data: &[u8]) -> Arc<dyn ParsedFont> {
        OutlineFontEngine::new().parse(Arc::new(data.to_vec())).unwrap()
    }

    #[test]
    fn parses_a_real_font_and_reads_metrics() {
        let font = parse(font_test_data::VAZIRMATN_VAR);
        let metrics = font.metrics();
        assert!(metrics.units_per_em > 0);
        assert!(metrics.ascent > 0.0);
        assert!(metrics.descent <= 0.0);
        assert!(metrics.ascent > metrics.x_height);
    }

    #[test]
    fn rejects_garbage_bytes() {
        assert!(OutlineFontEngine::new().parse(Arc::new(vec![0u8; 32])).is_err());
    }

    #[test]
    fn exposes_variation_axes_and_instances() {
        let font = parse(font_test_data::VAZIRMATN_VAR);
        let axes = font.variation_axes();
        assert!(axes.contains(&Tag::new(b"wght")));
        let instance = font.instance(&[(Tag::new(b"wght"), 700.0)]);
        assert_eq!(instance.metrics().units_per_em, font.metrics().units_per_em);
    }

    #[test]
    fn shapes_one_glyph_per_simple_char() {
        let font = parse(font_test_data::VAZIRMATN_VAR);
        let glyphs = font.shape("aa", 16.0, &IndexMap::new());
        assert_eq!(glyphs.len(), 2);
        assert!(font.shape("", 16.0, &IndexMap::new()).is_empty());
    }

    #[test]
    fn glyph_paths_are_valid_path_data() {
        let font = parse(font_test_data::VAZIRMATN_VAR);
        let glyphs = font.shape("a", 16.0, &IndexMap::new());
        let d = font.glyph_path(glyphs[0].glyph_id, 16.0, 10.0, 20.0, 1.0, 2);
        assert!(d.is_empty() || d.starts_with('M'));
    }

    #[test]
    fn coordinates_are_trimmed_to_precision() {
        let mut path = BezPath::new();
        path.move_to((1.04999, 2.0));
        path.line_to((3.5, -0.0004));
        path.close_path();
        assert_eq!(write_path_data(&path, 2), "M1.05 2L3.5 0Z");
    }

    #[test]
    fn unmapped_codepoints_are_reported_missing() {
        let font = parse(font_test_data::VAZIRMATN_VAR);
        assert!(!font.has_glyph('\u{10FF7D}'));
    }
}
