//! Conversion sessions: orchestration across a whole document.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use futures::future::join_all;
use log::debug;

use crate::{
    dom::{Document, NodeId},
    error::{Error, Result},
    fetch::{DiskHttpFetcher, SourceFetcher},
    font::{FontEngine, FontForChar, ResolvedFont},
    layout::{self, LayoutParams},
    provider::SourceProvider,
    providers::{ConfigProvider, DirProvider, GoogleProvider, HttpProvider},
    resolver::{FallbackGlyph, FontCache, FontResolver, NoFontAction, ResolverOptions},
    stats::{ElementFacts, FactSink, LoadError, MismatchWarning, SessionStat, UsedVariant},
    style::{FontStyle, font_style_for_node},
    variant::FontVariant,
};

/// Options governing one conversion session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Statically configured variants per family.
    pub fonts: HashMap<String, Vec<FontVariant>>,
    pub fonts_dir: Option<PathBuf>,
    pub fonts_dir_ttl: Option<Duration>,
    pub fonts_url: Option<String>,
    pub fonts_url_ttl: Option<Duration>,
    pub google_api_key: Option<String>,
    pub google_ttl: Option<Duration>,
    /// Family-class aliases, e.g. `sans-serif` to concrete families.
    pub family_classes: HashMap<String, Vec<String>>,
    pub fallback_families: Vec<String>,
    pub fallback_glyph: Option<FallbackGlyph>,
    pub no_font_action: NoFontAction,
    /// Emit one path per glyph instead of one per text node.
    pub split: bool,
    /// Decimal places in path coordinates.
    pub decimals: u8,
    /// Attribute on emitted paths carrying the replaced text content.
    pub text_attr: Option<String>,
    /// Keep positional and font attributes on converted elements.
    pub keep_font_attrs: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            fonts: HashMap::new(),
            fonts_dir: None,
            fonts_dir_ttl: None,
            fonts_url: None,
            fonts_url_ttl: None,
            google_api_key: None,
            google_ttl: None,
            family_classes: HashMap::new(),
            fallback_families: Vec::new(),
            fallback_glyph: None,
            no_font_action: NoFontAction::default(),
            split: false,
            decimals: 2,
            text_attr: None,
            keep_font_attrs: false,
        }
    }
}

/// A maximal span of consecutive characters sharing one resolved font,
/// in original order.
#[derive(Debug, Clone)]
pub struct TextRun {
    pub text: String,
    pub font: Option<Arc<ResolvedFont>>,
    pub style: Arc<FontStyle>,
    pub is_fallback: bool,
}

/// Result of converting one element: the run groups per source text
/// node, plus the facts recorded while resolving.
#[derive(Debug)]
pub struct ElementOutcome {
    pub runs: Vec<(NodeId, Vec<TextRun>)>,
    pub facts: ElementFacts,
}

/// Drives font resolution and layout across a document.
pub struct Session {
    doc: Document,
    resolver: FontResolver,
    layout: LayoutParams,
}

impl Session {
    /// Session with the default provider chain derived from the options.
    pub fn new(doc: Document, options: SessionOptions, engine: Arc<dyn FontEngine>) -> Self {
        let mut providers: Vec<Box<dyn SourceProvider>> = Vec::new();
        if !options.fonts.is_empty() {
            providers.push(Box::new(ConfigProvider::new(options.fonts.clone())));
        }
        if let Some(dir) = &options.fonts_dir {
            providers.push(Box::new(DirProvider::new(dir.clone(), options.fonts_dir_ttl)));
        }
        if let Some(url) = &options.fonts_url {
            providers.push(Box::new(HttpProvider::new(url.clone(), options.fonts_url_ttl)));
        }
        if let Some(key) = &options.google_api_key {
            providers.push(Box::new(GoogleProvider::new(key.clone(), options.google_ttl)));
        }
        Self::with_providers(doc, options, engine, providers, Arc::new(DiskHttpFetcher::new()))
    }

    /// Session with an explicit provider chain and byte fetcher.
    pub fn with_providers(
        doc: Document,
        options: SessionOptions,
        engine: Arc<dyn FontEngine>,
        providers: Vec<Box<dyn SourceProvider>>,
        fetcher: Arc<dyn SourceFetcher>,
    ) -> Self {
        let resolver_options = ResolverOptions {
            family_classes: options.family_classes.clone(),
            fallback_families: options.fallback_families.clone(),
            fallback_glyph: options.fallback_glyph.clone(),
            no_font_action: options.no_font_action.clone(),
        };
        let layout = LayoutParams {
            split: options.split,
            decimals: options.decimals,
            text_attr: options.text_attr.clone(),
            keep_font_attrs: options.keep_font_attrs,
        };
        let resolver = FontResolver::new(providers, fetcher, engine, resolver_options);
        Self { doc, resolver, layout }
    }

    /// Reuse a font-object cache that outlives this session, so parsed
    /// fonts survive across documents.
    pub fn with_font_cache(mut self, fonts: Arc<FontCache>) -> Self {
        self.resolver = self.resolver.with_font_cache(fonts);
        self
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Serialize the (possibly converted) document back to SVG text.
    pub fn svg_string(&self) -> String {
        self.doc.serialize()
    }

    /// Convert every element matched by `selector` (comma-separated tag
    /// names; `text` covers plain SVG documents).
    pub async fn replace_all(&mut self, selector: &str) -> Result<SessionStat> {
        let nodes = self.doc.select(selector);
        // Pass 1 for all elements runs concurrently; pass 2 is applied
        // per element once its own resolution has fully joined.
        let plans = join_all(nodes.iter().map(|&node| self.resolve_element(node))).await;

        let mut stat = SessionStat { total: nodes.len(), ..SessionStat::default() };
        let mut used: BTreeMap<String, UsedVariant> = BTreeMap::new();
        let mut missed: BTreeSet<String> = BTreeSet::new();
        let mut warnings: BTreeMap<String, MismatchWarning> = BTreeMap::new();
        let mut errors: BTreeMap<String, LoadError> = BTreeMap::new();

        for (&node, plan) in nodes.iter().zip(plans) {
            let outcome = match plan {
                Ok(Some(outcome)) => outcome,
                Ok(None) => {
                    debug!("skipped text element {node:?}");
                    continue;
                }
                Err(err) => return Err(err),
            };
            layout::layout_element(&mut self.doc, &self.layout, node, &outcome.runs);
            stat.replaced += 1;
            for (_, runs) in &outcome.runs {
                for run in runs {
                    let chars = run.text.chars().count();
                    match &run.font {
                        Some(font) if !run.is_fallback => {
                            used.entry(font.variant.identity(&font.family))
                                .or_insert_with(|| UsedVariant {
                                    family: font.family.clone(),
                                    variant: Arc::clone(&font.variant),
                                    chars: 0,
                                })
                                .chars += chars;
                        }
                        _ => stat.skipped += chars,
                    }
                }
            }
            missed.extend(outcome.facts.missed.iter().cloned());
            warnings.extend(outcome.facts.warnings.clone());
            errors.extend(outcome.facts.errors.clone());
        }

        stat.used = used.into_values().collect();
        stat.missed = missed.into_iter().collect();
        stat.warnings = warnings.into_values().collect();
        stat.errors = errors.into_values().collect();
        Ok(stat)
    }

    /// Convert a single element. `None` means the element was skipped by
    /// the skip-node policy and left untouched.
    pub async fn replace_one(&mut self, node: NodeId) -> Result<Option<ElementOutcome>> {
        match self.resolve_element(node).await? {
            Some(outcome) => {
                layout::layout_element(&mut self.doc, &self.layout, node, &outcome.runs);
                Ok(Some(outcome))
            }
            None => Ok(None),
        }
    }

    /// Pass 1: collect and collapse the element's text, resolve a font
    /// for every distinct character concurrently, group runs.
    async fn resolve_element(&self, node: NodeId) -> Result<Option<ElementOutcome>> {
        let facts = FactSink::default();
        let mut ws = WhitespaceState {
            last_char: ' ',
            last_text: self.find_last_text_node(node),
            done: false,
        };
        let mut texts: Vec<(NodeId, Vec<char>, Arc<FontStyle>)> = Vec::new();
        self.collect_text(node, &mut ws, &mut texts);

        let resolver = &self.resolver;
        let facts_ref = &facts;
        let node_results = join_all(texts.iter().map(|(id, chars, style)| async move {
            let mut distinct: Vec<char> = Vec::new();
            for &ch in chars {
                if !distinct.contains(&ch) {
                    distinct.push(ch);
                }
            }
            let resolved = join_all(
                distinct.iter().map(|&ch| resolver.font_for_char(ch, style, facts_ref)),
            )
            .await;
            let mut map: HashMap<char, FontForChar> = HashMap::new();
            for (ch, result) in distinct.into_iter().zip(resolved) {
                map.insert(ch, result?);
            }
            Ok::<_, Error>((*id, map))
        }))
        .await;

        let mut runs: Vec<(NodeId, Vec<TextRun>)> = Vec::new();
        for (result, (_, chars, _)) in node_results.into_iter().zip(&texts) {
            let (id, map) = match result {
                Ok(resolved) => resolved,
                Err(Error::NoFont { skip_node: true, .. }) => return Ok(None),
                Err(err) => return Err(err),
            };
            let groups = make_runs(chars, &map);
            if !groups.is_empty() {
                runs.push((id, groups));
            }
        }
        Ok(Some(ElementOutcome { runs, facts: facts.into_facts() }))
    }

    /// Depth-first text collection with cross-node whitespace collapsing
    /// tracked through a running last-character cursor.
    fn collect_text(
        &self,
        node: NodeId,
        ws: &mut WhitespaceState,
        out: &mut Vec<(NodeId, Vec<char>, Arc<FontStyle>)>,
    ) {
        if self.doc.is_element(node) {
            for &child in self.doc.children(node) {
                self.collect_text(child, ws, out);
            }
        } else if let Some(content) = self.doc.text(node) {
            if ws.done {
                return;
            }
            let mut chars: Vec<char> = Vec::new();
            let mut in_space = false;
            for ch in content.chars() {
                let ch = if matches!(ch, '\t' | '\n' | '\r') { ' ' } else { ch };
                if ch == ' ' {
                    if in_space {
                        continue;
                    }
                    in_space = true;
                } else {
                    in_space = false;
                }
                chars.push(ch);
            }
            if chars.first() == Some(&' ') && ws.last_char == ' ' {
                chars.remove(0);
            }
            if let Some(&last) = chars.last() {
                ws.last_char = last;
            }
            if Some(node) == ws.last_text {
                // Nothing after the last non-blank node is emitted, and
                // its own trailing boundary space is stripped.
                ws.done = true;
                if chars.last() == Some(&' ') {
                    chars.pop();
                }
            }
            let style_node = self.doc.parent(node).unwrap_or(node);
            let style = Arc::new(font_style_for_node(&self.doc, style_node));
            out.push((node, chars, style));
        }
    }

    /// Last descendant text node containing non-whitespace.
    fn find_last_text_node(&self, node: NodeId) -> Option<NodeId> {
        if let Some(text) = self.doc.text(node) {
            if text.chars().any(|c| !matches!(c, '\t' | '\n' | '\r' | ' ')) {
                return Some(node);
            }
            return None;
        }
        let mut result = None;
        for &child in self.doc.children(node) {
            result = self.find_last_text_node(child).or(result);
        }
        result
    }
}

struct WhitespaceState {
    last_char: char,
    last_text: Option<NodeId>,
    done: bool,
}

/// Group a character sequence into maximal same-font runs, preserving
/// order. Fallback substitutions contribute their substituted character.
fn make_runs(chars: &[char], map: &HashMap<char, FontForChar>) -> Vec<TextRun> {
    let mut groups = Vec::new();
    let mut text = String::new();
    let mut prev: Option<&FontForChar> = None;
    for ch in chars {
        let entry = &map[ch];
        if let Some(p) = prev {
            if !same_font(&p.font, &entry.font) {
                groups.push(TextRun {
                    text: std::mem::take(&mut text),
                    font: p.font.clone(),
                    style: Arc::clone(&p.style),
                    is_fallback: p.is_fallback,
                });
            }
        }
        text.push(entry.ch);
        prev = Some(entry);
    }
    if let Some(p) = prev {
        groups.push(TextRun {
            text,
            font: p.font.clone(),
            style: Arc::clone(&p.style),
            is_fallback: p.is_fallback,
        });
    }
    groups
}

fn same_font(a: &Option<Arc<ResolvedFont>>, b: &Option<Arc<ResolvedFont>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}
