//! Mutable SVG document tree.
//!
//! The conversion core consumes a small document contract: traversal,
//! attribute access, element creation and replacement, computed-style
//! lookup and coordinate-list parsing. This arena implementation backs
//! the CLI and the tests. Computed-style lookup covers inline `style`
//! declarations, presentation attributes and inheritance; a richer
//! document implementation can be substituted behind the same surface.

use indexmap::IndexMap;

use crate::error::Result;

pub const SVG_NS: &str = "http://www.w3.org/2000/svg";

const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

/// Handle to a node in a [`Document`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
pub enum NodeKind {
    Element { tag: String, attrs: IndexMap<String, String> },
    Text(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
    root: NodeId,
}

impl Document {
    pub fn parse(text: &str) -> Result<Self> {
        let parsed = roxmltree::Document::parse(text)?;
        let mut doc = Document { nodes: Vec::new(), root: NodeId(0) };
        let root = doc.convert(parsed.root_element(), None);
        doc.root = root;
        doc.ensure_namespaces();
        Ok(doc)
    }

    fn convert(&mut self, node: roxmltree::Node<'_, '_>, parent: Option<NodeId>) -> NodeId {
        let mut attrs = IndexMap::new();
        for attr in node.attributes() {
            attrs.insert(qualified_name(&attr), attr.value().to_string());
        }
        let id = self.push(
            NodeKind::Element { tag: node.tag_name().name().to_string(), attrs },
            parent,
        );
        for child in node.children() {
            if child.is_element() {
                let child_id = self.convert(child, Some(id));
                self.nodes[id.0].children.push(child_id);
            } else if child.is_text() {
                if let Some(text) = child.text() {
                    let child_id = self.push(NodeKind::Text(text.to_string()), Some(id));
                    self.nodes[id.0].children.push(child_id);
                }
            }
        }
        id
    }

    /// Namespace declarations are not attributes in the parsed tree;
    /// restore them on the root so serialization round-trips.
    fn ensure_namespaces(&mut self) {
        let uses_xlink = self.descendants(self.root).iter().any(|&id| {
            matches!(self.kind(id), NodeKind::Element { attrs, .. }
                if attrs.keys().any(|k| k.starts_with("xlink:")))
        });
        if let NodeKind::Element { attrs, .. } = &mut self.nodes[self.root.0].kind {
            if !attrs.contains_key("xmlns") {
                attrs.shift_insert(0, "xmlns".to_string(), SVG_NS.to_string());
            }
            if uses_xlink && !attrs.contains_key("xmlns:xlink") {
                attrs.shift_insert(1, "xmlns:xlink".to_string(), XLINK_NS.to_string());
            }
        }
    }

    fn push(&mut self, kind: NodeKind, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData { kind, parent, children: Vec::new() });
        id
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn kind(&self, node: NodeId) -> &NodeKind {
        &self.nodes[node.0].kind
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    pub fn is_element(&self, node: NodeId) -> bool {
        matches!(self.kind(node), NodeKind::Element { .. })
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        match self.kind(node) {
            NodeKind::Element { tag, .. } => Some(tag),
            NodeKind::Text(_) => None,
        }
    }

    /// Content of a text node.
    pub fn text(&self, node: NodeId) -> Option<&str> {
        match self.kind(node) {
            NodeKind::Text(text) => Some(text),
            NodeKind::Element { .. } => None,
        }
    }

    /// Concatenated descendant text content.
    pub fn text_content(&self, node: NodeId) -> String {
        match self.kind(node) {
            NodeKind::Text(text) => text.clone(),
            NodeKind::Element { .. } => self
                .children(node)
                .to_vec()
                .into_iter()
                .map(|child| self.text_content(child))
                .collect(),
        }
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        match self.kind(node) {
            NodeKind::Element { attrs, .. } => attrs.get(name).map(String::as_str),
            NodeKind::Text(_) => None,
        }
    }

    pub fn attrs(&self, node: NodeId) -> Vec<(String, String)> {
        match self.kind(node) {
            NodeKind::Element { attrs, .. } => {
                attrs.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
            }
            NodeKind::Text(_) => Vec::new(),
        }
    }

    pub fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        if let NodeKind::Element { attrs, .. } = &mut self.nodes[node.0].kind {
            attrs.insert(name.to_string(), value.to_string());
        }
    }

    pub fn remove_attr(&mut self, node: NodeId, name: &str) {
        if let NodeKind::Element { attrs, .. } = &mut self.nodes[node.0].kind {
            attrs.shift_remove(name);
        }
    }

    /// New detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeKind::Element { tag: tag.to_string(), attrs: IndexMap::new() }, None)
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Insert `new` immediately before `reference` under the same parent.
    pub fn insert_before(&mut self, reference: NodeId, new: NodeId) {
        let Some(parent) = self.parent(reference) else { return };
        let children = &mut self.nodes[parent.0].children;
        let index = children.iter().position(|&c| c == reference).unwrap_or(children.len());
        children.insert(index, new);
        self.nodes[new.0].parent = Some(parent);
    }

    /// Swap `old` for `new` in the tree; `old` becomes detached.
    pub fn replace_node(&mut self, old: NodeId, new: NodeId) {
        let Some(parent) = self.parent(old) else { return };
        if let Some(slot) =
            self.nodes[parent.0].children.iter_mut().find(|c| **c == old)
        {
            *slot = new;
        }
        self.nodes[new.0].parent = Some(parent);
        self.nodes[old.0].parent = None;
    }

    /// Detach a node from its parent.
    pub fn remove_node(&mut self, node: NodeId) {
        let Some(parent) = self.parent(node) else { return };
        self.nodes[parent.0].children.retain(|&c| c != node);
        self.nodes[node.0].parent = None;
    }

    /// Move every child of `from` to the end of `to`.
    pub fn reparent_children(&mut self, from: NodeId, to: NodeId) {
        let children = std::mem::take(&mut self.nodes[from.0].children);
        for &child in &children {
            self.nodes[child.0].parent = Some(to);
        }
        self.nodes[to.0].children.extend(children);
    }

    /// Preorder traversal from `node`, inclusive.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut pending = vec![node];
        while let Some(id) = pending.pop() {
            out.push(id);
            for &child in self.children(id).iter().rev() {
                pending.push(child);
            }
        }
        out
    }

    /// Elements matching a comma-separated tag-name list.
    pub fn select(&self, selector: &str) -> Vec<NodeId> {
        let tags: Vec<&str> =
            selector.split(',').map(str::trim).filter(|t| !t.is_empty()).collect();
        self.descendants(self.root)
            .into_iter()
            .filter(|&id| {
                self.tag(id)
                    .map(|tag| tags.iter().any(|t| *t == "*" || *t == tag))
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Inherited style property: inline `style` declarations first, then
    /// the presentation attribute, walking up the tree.
    pub fn style_prop(&self, node: NodeId, prop: &str) -> Option<String> {
        let mut cur = self.element_or_parent(node);
        while let Some(id) = cur {
            if let Some(value) = self.own_style_value(id, prop) {
                return Some(value);
            }
            cur = self.parent(id);
        }
        None
    }

    fn element_or_parent(&self, node: NodeId) -> Option<NodeId> {
        if self.is_element(node) { Some(node) } else { self.parent(node) }
    }

    fn own_style_value(&self, node: NodeId, prop: &str) -> Option<String> {
        let NodeKind::Element { attrs, .. } = self.kind(node) else { return None };
        if let Some(style) = attrs.get("style") {
            if let Some(value) = style_declaration(style, prop) {
                return Some(value);
            }
        }
        attrs.get(prop).map(|v| v.trim().to_string())
    }

    /// Computed font size in px. Relative units accumulate through the
    /// ancestor chain; `rem` resolves against the root.
    pub fn font_size(&self, node: NodeId) -> f32 {
        let mut factor = 1.0;
        let mut cur = self.element_or_parent(node);
        while let Some(id) = cur {
            if let Some(raw) = self.own_style_value(id, "font-size") {
                match parse_css_length(&raw) {
                    Some(CssLength::Px(v)) => return v * factor,
                    Some(CssLength::Em(f)) => factor *= f,
                    Some(CssLength::Rem(f)) => return self.root_font_px() * f * factor,
                    None => {}
                }
            }
            cur = self.parent(id);
        }
        16.0 * factor
    }

    fn root_font_px(&self) -> f32 {
        match self.own_style_value(self.root, "font-size").as_deref().map(parse_css_length) {
            Some(Some(CssLength::Px(v))) => v,
            _ => 16.0,
        }
    }

    /// Computed letter spacing in px (0 when unspecified or `normal`).
    pub fn letter_spacing(&self, node: NodeId) -> f32 {
        let mut cur = self.element_or_parent(node);
        while let Some(id) = cur {
            if let Some(raw) = self.own_style_value(id, "letter-spacing") {
                let raw = raw.trim();
                if raw == "normal" {
                    return 0.0;
                }
                return match parse_css_length(raw) {
                    Some(CssLength::Px(v)) => v,
                    Some(CssLength::Em(f)) => f * self.font_size(id),
                    Some(CssLength::Rem(f)) => f * self.root_font_px(),
                    None => 0.0,
                };
            }
            cur = self.parent(id);
        }
        0.0
    }

    /// Parse a coordinate-list attribute (`x`, `y`, `dx`, `dy`,
    /// `textLength`) honoring SVG length units. Any malformed entry
    /// invalidates the whole list.
    pub fn parse_length_list(&self, node: NodeId, attr: &str) -> Vec<f64> {
        let Some(value) = self.attr(node, attr).map(str::to_string) else {
            return Vec::new();
        };
        let mut result = Vec::new();
        for token in value
            .split(|c: char| c.is_ascii_whitespace() || c == ',')
            .filter(|t| !t.is_empty())
        {
            let Some((val, unit)) = split_number_unit(token) else { return Vec::new() };
            let val = f64::from(val);
            let resolved = match unit {
                "" | "px" => val,
                "%" => {
                    let viewbox = self.viewbox().unwrap_or([0.0; 4]);
                    let dim = if attr == "y" || attr == "dy" { viewbox[3] } else { viewbox[2] };
                    val * dim / 100.0
                }
                "em" => val * f64::from(self.font_size(node)),
                // 1ex is approximated as 0.5em
                "ex" => val * f64::from(self.font_size(node)) * 0.5,
                "in" => val * 96.0,
                "mm" => val * 96.0 / 25.4,
                "cm" => val * 96.0 / 2.54,
                "pt" => val * 4.0 / 3.0,
                "pc" => val * 16.0,
                _ => return Vec::new(),
            };
            result.push(resolved);
        }
        result
    }

    /// `viewBox` of the root element.
    pub fn viewbox(&self) -> Option<[f64; 4]> {
        let raw = self.attr(self.root, "viewBox")?;
        let mut parts = raw
            .split(|c: char| c.is_ascii_whitespace() || c == ',')
            .filter(|t| !t.is_empty())
            .map(|t| t.parse::<f64>());
        let mut out = [0.0; 4];
        for slot in &mut out {
            *slot = parts.next()?.ok()?;
        }
        Some(out)
    }

    /// Serialize the whole document back to SVG text.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        self.write_node(self.root, &mut out);
        out
    }

    fn write_node(&self, node: NodeId, out: &mut String) {
        match self.kind(node) {
            NodeKind::Text(text) => out.push_str(&escape_text(text)),
            NodeKind::Element { tag, attrs } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&escape_attr(value));
                    out.push('"');
                }
                let children = self.children(node);
                if children.is_empty() {
                    out.push_str("/>");
                } else {
                    out.push('>');
                    for &child in children {
                        self.write_node(child, out);
                    }
                    out.push_str("</");
                    out.push_str(tag);
                    out.push('>');
                }
            }
        }
    }
}

fn qualified_name(attr: &roxmltree::Attribute<'_, '_>) -> String {
    match attr.namespace() {
        Some(XLINK_NS) => format!("xlink:{}", attr.name()),
        _ => attr.name().to_string(),
    }
}

fn style_declaration(style: &str, prop: &str) -> Option<String> {
    for decl in style.split(';') {
        let Some((name, value)) = decl.split_once(':') else { continue };
        if name.trim().eq_ignore_ascii_case(prop) {
            return Some(value.trim().to_string());
        }
    }
    None
}

enum CssLength {
    Px(f32),
    /// Factor relative to the inherited font size.
    Em(f32),
    /// Factor relative to the root font size.
    Rem(f32),
}

fn parse_css_length(raw: &str) -> Option<CssLength> {
    let (value, unit) = split_number_unit(raw.trim())?;
    match unit {
        "" | "px" => Some(CssLength::Px(value)),
        "%" => Some(CssLength::Em(value / 100.0)),
        "em" => Some(CssLength::Em(value)),
        // 1ex is approximated as 0.5em
        "ex" => Some(CssLength::Em(value / 2.0)),
        "rem" => Some(CssLength::Rem(value)),
        "in" => Some(CssLength::Px(value * 96.0)),
        "mm" => Some(CssLength::Px(value * 96.0 / 25.4)),
        "cm" => Some(CssLength::Px(value * 96.0 / 2.54)),
        "pt" => Some(CssLength::Px(value * 4.0 / 3.0)),
        "pc" => Some(CssLength::Px(value * 16.0)),
        _ => None,
    }
}

/// Split a token into its leading number and trailing unit.
pub(crate) fn split_number_unit(token: &str) -> Option<(f32, &str)> {
    let end = token
        .find(|c: char| !c.is_ascii_digit() && c != '.' && c != '-' && c != '+')
        .unwrap_or(token.len());
    let value: f32 = token[..end].parse().ok()?;
    Some((value, &token[end..]))
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}
