//! End-to-end conversion tests over an in-memory font engine.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use font_types::Tag;
use indexmap::IndexMap;
use textoutline_core::{
    FontEngine, FontMetrics, ParsedFont, Result, Session, SessionOptions, ShapedGlyph,
    dom::Document,
    error::Error,
    fetch::SourceFetcher,
    providers::ConfigProvider,
    resolver::NoFontAction,
    variant::FontVariant,
};

/// Fixed-advance font; the source spec (`adv=0.5 missing=XY`) selects
/// the advance and uncovered characters. Glyph paths are horizontal
/// strokes so emitted geometry is easy to measure.
struct StrokeFont {
    advance: f32,
    missing: Vec<char>,
}

impl ParsedFont for StrokeFont {
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
        let p = usize::from(decimals);
        format!("M{x:.p$} {y:.p$}H{:.p$}", x + width)
    }

    fn variation_axes(&self) -> Vec<Tag> {
        Vec::new()
    }

    fn instance(&self, _coords: &[(Tag, f32)]) -> Arc<dyn ParsedFont> {
        Arc::new(StrokeFont { advance: self.advance, missing: self.missing.clone() })
    }
}

struct StrokeEngine;

impl FontEngine for StrokeEngine {
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
        Ok(Arc::new(StrokeFont { advance, missing }))
    }
}

struct EchoFetcher;

#[async_trait]
impl SourceFetcher for EchoFetcher {
    async fn fetch(&self, source: &str) -> Result<Vec<u8>> {
        Ok(source.as_bytes().to_vec())
    }
}

fn session(svg: &str, families: &[(&str, &str)], mut options: SessionOptions) -> Session {
    let map: HashMap<String, Vec<FontVariant>> = families
        .iter()
        .map(|(family, spec)| (family.to_string(), vec![FontVariant::new(*spec)]))
        .collect();
    options.decimals = 0;
    let doc = Document::parse(svg).unwrap();
    Session::with_providers(
        doc,
        options,
        Arc::new(StrokeEngine),
        vec![Box::new(ConfigProvider::new(map))],
        Arc::new(EchoFetcher),
    )
}

#[tokio::test]
async fn characters_group_into_per_font_runs() {
    let svg = r#"<svg xmlns="http://www.w3.org/2000/svg"><text x="0" y="20" font-family="A, B" font-size="10">AB</text></svg>"#;
    let mut session = session(
        svg,
        &[("A", "adv=0.5 missing=B"), ("B", "adv=0.5")],
        SessionOptions::default(),
    );
    let text = session.document().select("text")[0];
    let outcome = session.replace_one(text).await.unwrap().unwrap();
    let runs = &outcome.runs[0].1;
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].text, "A");
    assert_eq!(runs[0].font.as_ref().unwrap().family, "A");
    assert_eq!(runs[1].text, "B");
    assert_eq!(runs[1].font.as_ref().unwrap().family, "B");
}

#[tokio::test]
async fn emits_merged_path_at_absolute_positions() {
    let svg = r#"<svg xmlns="http://www.w3.org/2000/svg"><text x="0" y="20" font-family="Mock" font-size="10">AB</text></svg>"#;
    let mut session = session(svg, &[("Mock", "adv=0.5")], SessionOptions::default());
    let stat = session.replace_all("text").await.unwrap();
    assert_eq!(stat.replaced, 1);
    let out = session.svg_string();
    assert!(out.contains(r#"<path d="M0 20H5M5 20H10"/>"#), "got: {out}");
    assert!(!out.contains("<text"));
    assert!(!out.contains("font-family"));
    assert!(out.contains("<g"));
}

#[tokio::test]
async fn sibling_text_nodes_collapse_boundary_whitespace() {
    let svg = r#"<svg xmlns="http://www.w3.org/2000/svg"><text x="0" y="20" font-family="Mock" font-size="10"><tspan>A </tspan><tspan> B</tspan></text></svg>"#;
    let mut session = session(svg, &[("Mock", "adv=0.5")], SessionOptions::default());
    let text = session.document().select("text")[0];
    let outcome = session.replace_one(text).await.unwrap().unwrap();
    assert_eq!(outcome.runs.len(), 2);
    assert_eq!(outcome.runs[0].1[0].text, "A ");
    assert_eq!(outcome.runs[1].1[0].text, "B");
}

#[tokio::test]
async fn middle_anchor_centers_the_run_on_its_anchor() {
    let svg = r#"<svg xmlns="http://www.w3.org/2000/svg"><text x="50" y="20" text-anchor="middle" font-family="Mock" font-size="10">AB</text></svg>"#;
    let mut session = session(svg, &[("Mock", "adv=0.5")], SessionOptions::default());
    session.replace_all("text").await.unwrap();
    let out = session.svg_string();
    assert!(out.contains(r#"d="M45 20H50M50 20H55""#), "got: {out}");
}

#[tokio::test]
async fn end_anchor_aligns_the_run_right_edge() {
    let svg = r#"<svg xmlns="http://www.w3.org/2000/svg"><text x="50" y="20" text-anchor="end" font-family="Mock" font-size="10">AB</text></svg>"#;
    let mut session = session(svg, &[("Mock", "adv=0.5")], SessionOptions::default());
    session.replace_all("text").await.unwrap();
    let out = session.svg_string();
    assert!(out.contains(r#"d="M40 20H45M45 20H50""#), "got: {out}");
}

#[tokio::test]
async fn middle_baseline_shifts_by_half_x_height() {
    let svg = r#"<svg xmlns="http://www.w3.org/2000/svg"><text x="0" y="20" dominant-baseline="middle" font-family="Mock" font-size="12">A</text></svg>"#;
    let mut session = session(svg, &[("Mock", "adv=0.5")], SessionOptions::default());
    session.replace_all("text").await.unwrap();
    // x-height 0.5 at size 12 lowers the baseline by 3.
    assert!(session.svg_string().contains(r#"d="M0 23H6""#));
}

#[tokio::test]
async fn text_length_scaling_stretches_glyphs_to_target() {
    let svg = r#"<svg xmlns="http://www.w3.org/2000/svg"><text x="0" y="20" textLength="20" lengthAdjust="spacingAndGlyphs" font-family="Mock" font-size="10">AB</text></svg>"#;
    let mut session = session(svg, &[("Mock", "adv=0.5")], SessionOptions::default());
    session.replace_all("text").await.unwrap();
    let out = session.svg_string();
    // Natural extent 10 scaled by 2: glyphs widen and the total measured
    // extent equals the declared length.
    assert!(out.contains(r#"d="M0 20H10M10 20H20""#), "got: {out}");
}

#[tokio::test]
async fn text_length_spacing_distributes_the_delta() {
    let svg = r#"<svg xmlns="http://www.w3.org/2000/svg"><text x="0" y="20" textLength="20" font-family="Mock" font-size="10">AB</text></svg>"#;
    let mut session = session(svg, &[("Mock", "adv=0.5")], SessionOptions::default());
    session.replace_all("text").await.unwrap();
    let out = session.svg_string();
    // Glyphs keep their width; the 10 extra units land between them.
    assert!(out.contains(r#"d="M0 20H5M15 20H20""#), "got: {out}");
}

#[tokio::test]
async fn skip_node_policy_leaves_the_element_and_converts_siblings() {
    let svg = r#"<svg xmlns="http://www.w3.org/2000/svg"><text x="0" y="10" font-family="Mock" font-size="10">AZ</text><text x="0" y="30" font-family="Mock" font-size="10">B</text></svg>"#;
    let options =
        SessionOptions { no_font_action: NoFontAction::SkipNode, ..SessionOptions::default() };
    let mut session = session(svg, &[("Mock", "adv=0.5 missing=Z")], options);
    let stat = session.replace_all("text").await.unwrap();
    assert_eq!(stat.total, 2);
    assert_eq!(stat.replaced, 1);
    let out = session.svg_string();
    assert!(out.contains(">AZ</text>"), "skipped element untouched: {out}");
    assert!(out.contains(r#"<path d="M0 30H5""#), "sibling converted: {out}");
}

#[tokio::test]
async fn silent_policy_drops_the_character_and_counts_it() {
    let svg = r#"<svg xmlns="http://www.w3.org/2000/svg"><text x="0" y="20" font-family="Mock" font-size="10">AZ</text></svg>"#;
    let mut session = session(svg, &[("Mock", "adv=0.5 missing=Z")], SessionOptions::default());
    let stat = session.replace_all("text").await.unwrap();
    assert_eq!(stat.skipped, 1);
    assert_eq!(stat.used.len(), 1);
    assert_eq!(stat.used[0].chars, 1);
    let out = session.svg_string();
    assert!(out.contains(r#"d="M0 20H5""#), "got: {out}");
    assert!(!out.contains('Z'));
}

#[tokio::test]
async fn split_mode_emits_one_path_per_glyph() {
    let svg = r#"<svg xmlns="http://www.w3.org/2000/svg"><text x="0" y="20" font-family="Mock" font-size="10">AB</text></svg>"#;
    let options = SessionOptions { split: true, ..SessionOptions::default() };
    let mut session = session(svg, &[("Mock", "adv=0.5")], options);
    session.replace_all("text").await.unwrap();
    let out = session.svg_string();
    assert!(out.contains(r#"<path d="M0 20H5"/>"#), "got: {out}");
    assert!(out.contains(r#"<path d="M5 20H10"/>"#), "got: {out}");
    assert!(!out.contains("<text"));
}

#[tokio::test]
async fn text_attr_preserves_original_content() {
    let svg = r#"<svg xmlns="http://www.w3.org/2000/svg"><text x="0" y="20" font-family="Mock" font-size="10">Hi</text></svg>"#;
    let options =
        SessionOptions { text_attr: Some("data-text".to_string()), ..SessionOptions::default() };
    let mut session = session(svg, &[("Mock", "adv=0.5")], options);
    session.replace_all("text").await.unwrap();
    assert!(session.svg_string().contains(r#"data-text="Hi""#));
}

#[tokio::test]
async fn nested_dx_offsets_shift_following_glyphs() {
    let svg = r#"<svg xmlns="http://www.w3.org/2000/svg"><text x="0" y="0" font-family="Mock" font-size="10"><tspan dx="2">A</tspan>B</text></svg>"#;
    let mut session = session(svg, &[("Mock", "adv=0.5")], SessionOptions::default());
    session.replace_all("text").await.unwrap();
    let out = session.svg_string();
    assert!(out.contains(r#"d="M2 0H7""#), "got: {out}");
    assert!(out.contains(r#"d="M7 0H12""#), "got: {out}");
}

#[tokio::test]
async fn explicit_x_list_starts_new_runs_per_glyph() {
    let svg = r#"<svg xmlns="http://www.w3.org/2000/svg"><text x="0 30" y="20" font-family="Mock" font-size="10">AB</text></svg>"#;
    let mut session = session(svg, &[("Mock", "adv=0.5")], SessionOptions::default());
    session.replace_all("text").await.unwrap();
    let out = session.svg_string();
    assert!(out.contains(r#"d="M0 20H5M30 20H35""#), "got: {out}");
}

#[tokio::test]
async fn keep_font_attrs_preserves_presentation() {
    let svg = r#"<svg xmlns="http://www.w3.org/2000/svg"><text x="0" y="20" font-family="Mock" font-size="10">A</text></svg>"#;
    let options = SessionOptions { keep_font_attrs: true, ..SessionOptions::default() };
    let mut session = session(svg, &[("Mock", "adv=0.5")], options);
    session.replace_all("text").await.unwrap();
    let out = session.svg_string();
    assert!(out.contains(r#"font-family="Mock""#), "got: {out}");
}

#[tokio::test]
async fn error_policy_aborts_the_whole_operation() {
    let svg = r#"<svg xmlns="http://www.w3.org/2000/svg"><text font-family="Mock">Z</text></svg>"#;
    let options =
        SessionOptions { no_font_action: NoFontAction::Error, ..SessionOptions::default() };
    let mut session = session(svg, &[("Mock", "adv=0.5 missing=Z")], options);
    let err = session.replace_all("text").await.unwrap_err();
    assert!(matches!(err, Error::NoFont { skip_node: false, .. }));
}
