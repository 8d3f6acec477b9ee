//! Glyph layout: absolute positions, justification and path emission.

use std::{collections::HashMap, sync::Arc};

use crate::{
    dom::{Document, NodeId},
    font::ResolvedFont,
    session::TextRun,
};

/// Position-list attributes consumed during layout, in overlay order.
const POS_PROPS: [&str; 4] = ["x", "y", "dx", "dy"];

/// Attributes stripped from converted elements unless configured
/// otherwise (`font-*` is stripped as a prefix).
const STRIP_ATTRS: [&str; 9] = [
    "x",
    "y",
    "dx",
    "dy",
    "lengthAdjust",
    "textLength",
    "text-anchor",
    "dominant-baseline",
    "letter-spacing",
];

/// Emission options shared by every element of a session.
#[derive(Debug, Clone)]
pub(crate) struct LayoutParams {
    pub split: bool,
    pub decimals: u8,
    pub text_attr: Option<String>,
    pub keep_font_attrs: bool,
}

/// Text presentation needed to place one run.
#[derive(Debug, Clone)]
struct TextStyle {
    size: f32,
    spacing: f64,
    align_x: String,
    align_y: String,
}

/// One pending glyph placement.
struct Placement {
    node: NodeId,
    font: Arc<ResolvedFont>,
    glyph: u32,
    size: f32,
    x: f64,
    y: f64,
    advance: f64,
    spacing: f64,
    scale: f64,
    /// Rigid-block marker: set once an enclosing `textLength` scope has
    /// adjusted this glyph. The value is the scope's start index plus
    /// one, so glyphs of one block compare equal.
    fix: Option<usize>,
}

/// Mutable layout context, scoped to one top-level text element.
#[derive(Default)]
struct LayoutState {
    stack: Vec<Placement>,
    /// Stacked coordinate-override lists per position attribute; inner
    /// elements overlay outer ones index by index.
    pos: [Vec<Vec<f64>>; 4],
    tag_start: Vec<usize>,
    /// Glyphs placed so far, which is how many override entries have
    /// been consumed.
    chars: usize,
    cx: Option<f64>,
    cy: Option<f64>,
    /// Anchor x of the current run.
    sx: Option<f64>,
    x_min: Option<f64>,
    x_max: Option<f64>,
    style: Option<TextStyle>,
    merge: String,
    prev: Option<NodeId>,
}

/// Apply the layout pass to one resolved element: place every glyph,
/// honor length constraints, emit paths and convert the markup.
pub(crate) fn layout_element(
    doc: &mut Document,
    params: &LayoutParams,
    top: NodeId,
    runs: &[(NodeId, Vec<TextRun>)],
) {
    let run_map: HashMap<NodeId, &Vec<TextRun>> =
        runs.iter().map(|(id, groups)| (*id, groups)).collect();
    let mut engine = LayoutEngine {
        doc,
        params,
        top,
        state: LayoutState::default(),
        placed: Vec::new(),
    };
    engine.walk(top, &run_map);
    // Text nodes whose characters all stayed unrenderable are dropped
    // rather than carried through as raw text.
    for (node, _) in runs {
        if !engine.placed.contains(node) && engine.doc.parent(*node).is_some() {
            engine.doc.remove_node(*node);
        }
    }
}

struct LayoutEngine<'a> {
    doc: &'a mut Document,
    params: &'a LayoutParams,
    top: NodeId,
    state: LayoutState,
    placed: Vec<NodeId>,
}

impl LayoutEngine<'_> {
    fn walk(&mut self, node: NodeId, runs: &HashMap<NodeId, &Vec<TextRun>>) {
        if self.doc.is_element(node) {
            self.open_element(node);
            for child in self.doc.children(node).to_vec() {
                self.walk(child, runs);
            }
            self.close_element(node);
        } else if let Some(groups) = runs.get(&node) {
            self.layout_text_node(node, groups);
        }
    }

    fn open_element(&mut self, node: NodeId) {
        self.consume_used_positions();
        for (i, prop) in POS_PROPS.iter().enumerate() {
            let values = self.doc.parse_length_list(node, prop);
            self.state.pos[i].push(values);
        }
        self.state.tag_start.push(self.state.stack.len());
    }

    fn close_element(&mut self, node: NodeId) {
        self.correct_length(node);
        for prop in &mut self.state.pos {
            prop.pop();
        }
        if node == self.top {
            self.render_stack(true);
        }
        self.convert_to_group(node);
    }

    /// Drop override entries already consumed by placed glyphs, then
    /// reset the consumption counter for the element being opened.
    fn consume_used_positions(&mut self) {
        let chars = self.state.chars;
        if chars > 0 {
            for prop in &mut self.state.pos {
                for values in prop.iter_mut() {
                    values.drain(..chars.min(values.len()));
                }
            }
        }
        self.state.chars = 0;
    }

    /// Overlay the stacked override lists into flat per-glyph arrays;
    /// inner (later-pushed) lists win index by index.
    fn merged_positions(&self) -> [Vec<f64>; 4] {
        std::array::from_fn(|i| {
            let mut merged: Vec<f64> = Vec::new();
            for values in &self.state.pos[i] {
                for (j, val) in values.iter().enumerate() {
                    if j < merged.len() {
                        merged[j] = *val;
                    } else {
                        merged.push(*val);
                    }
                }
            }
            merged
        })
    }

    fn layout_text_node(&mut self, node: NodeId, groups: &[TextRun]) {
        let style_node = self.doc.parent(node).unwrap_or(node);
        let style = self.parse_style(style_node);
        let mut props = self.merged_positions();
        for run in groups {
            if self.state.style.is_none() {
                self.state.style = Some(style.clone());
            }
            let Some(font) = &run.font else { continue };
            let glyphs = font.shape(&run.text, style.size, &run.style.features);
            if !glyphs.is_empty() && !self.placed.contains(&node) {
                self.placed.push(node);
            }
            let metrics = font.metrics();
            for glyph in glyphs {
                let idx = self.state.chars;
                self.state.chars += 1;
                let has_x = idx < props[0].len();
                let has_y = idx < props[1].len();
                // An explicit x or y starts a new run: the pending one is
                // rendered so its alignment resolves against its own box.
                if !self.state.stack.is_empty() && (has_x || has_y) {
                    self.render_stack(false);
                    self.state.style = Some(style.clone());
                }
                if has_x || has_y {
                    if has_x {
                        self.state.cx = Some(props[0][idx]);
                    }
                    if idx < props[2].len() {
                        self.state.cx = Some(self.state.cx.unwrap_or(0.0) + props[2][idx]);
                        props[2][idx] = 0.0;
                    }
                    self.state.sx = self.state.cx;
                }
                if has_y {
                    let mut cy = props[1][idx];
                    if idx < props[3].len() {
                        cy += props[3][idx];
                        props[3][idx] = 0.0;
                    }
                    self.state.cy = Some(cy);
                }
                let mut cx = self.state.cx.unwrap_or(0.0);
                let mut cy = self.state.cy.unwrap_or(0.0);
                cx += props[2].get(idx).copied().unwrap_or(0.0);
                cy += props[3].get(idx).copied().unwrap_or(0.0);
                let mut dy = f64::from(glyph.offset_y);
                match style.align_y.as_str() {
                    "middle" => dy += f64::from(metrics.x_height * style.size) / 2.0,
                    "ideographic" | "text-after-edge" => {
                        dy += f64::from(metrics.descent * style.size);
                    }
                    "text-before-edge" => dy += f64::from(metrics.ascent * style.size),
                    "central" => {
                        dy += f64::from((metrics.ascent + metrics.descent) * style.size) / 2.0;
                    }
                    "mathematical" => dy += f64::from(metrics.ascent * style.size) / 2.0,
                    "hanging" => dy += f64::from(metrics.ascent * style.size) * 0.8,
                    _ => {}
                }
                self.state.stack.push(Placement {
                    node,
                    font: Arc::clone(font),
                    glyph: glyph.glyph_id,
                    size: style.size,
                    x: cx + f64::from(glyph.offset_x),
                    y: cy + dy,
                    advance: f64::from(glyph.advance_x),
                    spacing: style.spacing,
                    scale: 1.0,
                    fix: None,
                });
                self.state.x_min = Some(self.state.x_min.map_or(cx, |m| m.min(cx)));
                cx += f64::from(glyph.advance_x) + style.spacing;
                cy += f64::from(glyph.advance_y);
                self.state.x_max = Some(self.state.x_max.map_or(cx, |m| m.max(cx)));
                self.state.cx = Some(cx);
                self.state.cy = Some(cy);
            }
        }
    }

    fn parse_style(&self, node: NodeId) -> TextStyle {
        let size = self.doc.font_size(node);
        let spacing = f64::from(self.doc.letter_spacing(node));
        let align_x = self.doc.style_prop(node, "text-anchor").unwrap_or_default();
        let mut align_y = self
            .doc
            .style_prop(node, "dominant-baseline")
            .unwrap_or_else(|| "auto".to_string());
        let align_y2 = self
            .doc
            .style_prop(node, "alignment-baseline")
            .unwrap_or_else(|| "auto".to_string());
        if align_y == "auto" && align_y2 != "auto" {
            align_y = align_y2;
        }
        TextStyle { size, spacing, align_x, align_y }
    }

    /// Apply `textLength`/`lengthAdjust` to the glyphs this element
    /// contributed. Glyph ranges already constrained by a nested length
    /// declaration move as rigid blocks.
    fn correct_length(&mut self, node: NodeId) {
        let Some(start) = self.state.tag_start.pop() else { return };
        let end = self.state.stack.len();
        if self.doc.attr(node, "textLength").is_none() {
            return;
        }
        let Some(&length) = self.doc.parse_length_list(node, "textLength").first() else {
            return;
        };
        if end <= start {
            return;
        }
        let scaling = self.doc.attr(node, "lengthAdjust") == Some("spacingAndGlyphs");

        // Measure the natural extent and count adjustable items, where a
        // rigid block counts once.
        let mut items = 0usize;
        let mut fixed = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut prev: Option<usize> = None;
        for i in start..end {
            let item = &self.state.stack[i];
            min = min.min(item.x);
            max = max.max(item.x + item.advance);
            if let Some(fix) = item.fix {
                let block_ends =
                    i == end - 1 || self.state.stack[i + 1].fix != Some(fix);
                if block_ends {
                    fixed += item.x + item.advance - self.state.stack[fix - 1].x;
                }
            }
            if item.fix.is_none() || item.fix != prev {
                items += 1;
                prev = item.fix;
            }
        }
        if items == 0 {
            return;
        }

        let scale = (length - fixed) / (max - min - fixed);
        let mut dx = 0.0;
        let mut last = length - (max - min);
        if items > 1 {
            dx = last / (items - 1) as f64;
            last = 0.0;
        }

        let mut delta = 0.0;
        for i in start..end {
            let next_fix = self.state.stack.get(i + 1).and_then(|p| p.fix);
            let last_in_range = i == end - 1;
            let (x, width) = {
                let item = &mut self.state.stack[i];
                item.x += delta;
                if scaling && item.fix.is_none() {
                    item.scale = scale;
                    item.advance *= scale;
                    item.spacing *= scale;
                }
                let width = item.advance + item.spacing;
                if scaling && item.fix.is_none() {
                    delta += width - width / scale;
                }
                if !scaling && (item.fix.is_none() || item.fix != next_fix) {
                    delta += if last_in_range { last } else { dx };
                }
                item.fix = item.fix.or(Some(start + 1));
                (item.x, width)
            };
            self.state.x_min = Some(self.state.x_min.map_or(x, |m| m.min(x)));
            self.state.x_max = Some(self.state.x_max.map_or(x + width, |m| m.max(x + width)));
            if last_in_range {
                self.state.cx = Some(x + width);
            }
        }
    }

    /// Render all pending placements as the current run, shifted per the
    /// run's horizontal anchor alignment.
    fn render_stack(&mut self, is_final: bool) {
        let mut dx = 0.0;
        if !self.state.stack.is_empty() {
            let sx = self.state.sx.unwrap_or(0.0);
            self.state.sx = Some(sx);
            let x_min = self.state.x_min.unwrap_or(0.0);
            let x_max = self.state.x_max.unwrap_or(0.0);
            dx = sx - x_min;
            if let Some(style) = &self.state.style {
                match style.align_x.as_str() {
                    "middle" => dx += (x_min - x_max) / 2.0,
                    "end" => dx = sx - x_max,
                    _ => {}
                }
            }
        }
        let stack = std::mem::take(&mut self.state.stack);
        for placement in &stack {
            if let Some(prev) = self.state.prev {
                if prev != placement.node {
                    self.flush_node(prev);
                }
            }
            let d = placement.font.glyph_path(
                placement.glyph,
                placement.size,
                placement.x + dx,
                placement.y,
                placement.scale,
                self.params.decimals,
            );
            if self.params.split {
                let path = self.doc.create_element("path");
                self.doc.set_attr(path, "d", &d);
                self.doc.insert_before(placement.node, path);
            } else {
                self.state.merge.push_str(&d);
            }
            self.state.prev = Some(placement.node);
        }
        if is_final && !stack.is_empty() {
            if let Some(prev) = self.state.prev {
                self.flush_node(prev);
            }
        }
        self.state.x_min = None;
        self.state.x_max = None;
        self.state.style = None;
    }

    /// Replace a finished text node with its accumulated path (merged
    /// mode) or drop it (split mode, paths already inserted).
    fn flush_node(&mut self, node: NodeId) {
        if self.params.split {
            self.doc.remove_node(node);
        } else {
            let d = std::mem::take(&mut self.state.merge);
            let path = self.doc.create_element("path");
            self.doc.set_attr(path, "d", &d);
            if let Some(attr) = self.params.text_attr.clone() {
                let text = self.doc.text(node).unwrap_or_default().to_string();
                self.doc.set_attr(path, &attr, &text);
            }
            self.doc.replace_node(node, path);
        }
    }

    /// Swap a converted element for a `<g>` carrying its remaining
    /// attributes.
    fn convert_to_group(&mut self, node: NodeId) {
        let g = self.doc.create_element("g");
        for (name, value) in self.doc.attrs(node) {
            if !self.params.keep_font_attrs && stripped(&name) {
                continue;
            }
            self.doc.set_attr(g, &name, &value);
        }
        self.doc.reparent_children(node, g);
        self.doc.replace_node(node, g);
    }
}

fn stripped(name: &str) -> bool {
    STRIP_ATTRS.contains(&name) || name.starts_with("font-")
}
