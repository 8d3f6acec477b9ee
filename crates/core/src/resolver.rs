//! Per-character font resolution with aliasing and fallback policy.

use std::{collections::HashMap, fmt, future::Future, pin::Pin, sync::Arc};

use font_types::Tag;
use log::warn;

use crate::{
    cache::ResourceCache,
    error::{Error, Result},
    fetch::SourceFetcher,
    font::{FontEngine, FontForChar, ResolvedFont},
    provider::{SourceProvider, merged_variants},
    stats::FactSink,
    style::FontStyle,
    variant::{FontVariant, best_variant},
};

/// What to do when no family, fallback family or fallback glyph covers a
/// character.
#[derive(Clone, Default)]
pub enum NoFontAction {
    /// Abort the whole conversion.
    Error,
    /// Abort only the current text element.
    SkipNode,
    /// Drop the character and count it as skipped.
    #[default]
    Skip,
    /// Ask a handler to decide per character.
    Callback(Arc<dyn Fn(char, &FontStyle) -> NoFontDecision + Send + Sync>),
}

impl fmt::Debug for NoFontAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoFontAction::Error => f.write_str("Error"),
            NoFontAction::SkipNode => f.write_str("SkipNode"),
            NoFontAction::Skip => f.write_str("Skip"),
            NoFontAction::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

/// Decision returned by a no-font callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoFontDecision {
    Skip,
    SkipNode,
    Fail,
}

/// Glyph substituted when a character resolves nowhere.
#[derive(Debug, Clone)]
pub struct FallbackGlyph {
    pub family: String,
    pub ch: char,
}

/// Resolver configuration shared by one session.
#[derive(Debug, Clone, Default)]
pub struct ResolverOptions {
    /// Family-class aliases, tried before the class name itself.
    pub family_classes: HashMap<String, Vec<String>>,
    pub fallback_families: Vec<String>,
    pub fallback_glyph: Option<FallbackGlyph>,
    pub no_font_action: NoFontAction,
}

/// Session-scoped font object cache, keyed by family plus normalized
/// axis signature.
pub type FontCache = ResourceCache<String, Option<Arc<ResolvedFont>>>;

/// Resolves the font for each requested character through the provider
/// chain, applying family-class aliasing and the multi-level fallback
/// policy.
pub struct FontResolver {
    providers: Vec<Box<dyn SourceProvider>>,
    fetcher: Arc<dyn SourceFetcher>,
    engine: Arc<dyn FontEngine>,
    options: ResolverOptions,
    variant_lists: ResourceCache<String, Arc<Vec<FontVariant>>>,
    fonts: Arc<FontCache>,
}

impl FontResolver {
    pub fn new(
        providers: Vec<Box<dyn SourceProvider>>,
        fetcher: Arc<dyn SourceFetcher>,
        engine: Arc<dyn FontEngine>,
        options: ResolverOptions,
    ) -> Self {
        Self {
            providers,
            fetcher,
            engine,
            options,
            variant_lists: ResourceCache::unbounded(),
            fonts: Arc::new(FontCache::unbounded()),
        }
    }

    /// Share a font-object cache that outlives this resolver.
    pub fn with_font_cache(mut self, fonts: Arc<FontCache>) -> Self {
        self.fonts = fonts;
        self
    }

    /// Resolve the font for one character against the style's families
    /// and the configured fallback chain.
    pub async fn font_for_char(
        &self,
        ch: char,
        style: &Arc<FontStyle>,
        facts: &FactSink,
    ) -> Result<FontForChar> {
        self.resolve(ch, Arc::clone(style), None, facts, false).await
    }

    fn resolve<'a>(
        &'a self,
        ch: char,
        style: Arc<FontStyle>,
        families: Option<Vec<String>>,
        facts: &'a FactSink,
        is_fallback: bool,
    ) -> Pin<Box<dyn Future<Output = Result<FontForChar>> + Send + 'a>> {
        Box::pin(async move {
            let top_level = families.is_none();
            let list = families.unwrap_or_else(|| style.families.clone());
            for family in &list {
                if let Some(group) = self.options.family_classes.get(family) {
                    let result = self
                        .resolve(ch, Arc::clone(&style), Some(group.clone()), facts, is_fallback)
                        .await?;
                    if result.font.is_some() {
                        return Ok(result);
                    }
                }
                if let Some(font) = self.try_family(ch, &style, family, facts).await {
                    return Ok(FontForChar { font: Some(font), ch, style, is_fallback });
                }
            }
            if top_level {
                if !self.options.fallback_families.is_empty() {
                    let fallbacks = self.options.fallback_families.clone();
                    let result = self
                        .resolve(ch, Arc::clone(&style), Some(fallbacks), facts, is_fallback)
                        .await?;
                    if result.font.is_some() {
                        return Ok(result);
                    }
                }
                if let Some(fallback) = &self.options.fallback_glyph {
                    let fallback_style = Arc::new(FontStyle::new(
                        vec![fallback.family.clone()],
                        style.axes.clone(),
                        style.features.clone(),
                    ));
                    return self
                        .resolve(
                            fallback.ch,
                            fallback_style,
                            Some(vec![fallback.family.clone()]),
                            facts,
                            true,
                        )
                        .await;
                }
                match &self.options.no_font_action {
                    NoFontAction::Error => {
                        return Err(Error::NoFont {
                            ch,
                            families: style.families.clone(),
                            skip_node: false,
                        });
                    }
                    NoFontAction::SkipNode => {
                        return Err(Error::NoFont {
                            ch,
                            families: style.families.clone(),
                            skip_node: true,
                        });
                    }
                    NoFontAction::Callback(handler) => match handler(ch, &style) {
                        NoFontDecision::Fail => {
                            return Err(Error::NoFont {
                                ch,
                                families: style.families.clone(),
                                skip_node: false,
                            });
                        }
                        NoFontDecision::SkipNode => {
                            return Err(Error::NoFont {
                                ch,
                                families: style.families.clone(),
                                skip_node: true,
                            });
                        }
                        NoFontDecision::Skip => {}
                    },
                    NoFontAction::Skip => {}
                }
            }
            Ok(FontForChar { font: None, ch, style, is_fallback })
        })
    }

    /// One family of the candidate list: match a variant, load it, check
    /// glyph coverage.
    async fn try_family(
        &self,
        ch: char,
        style: &Arc<FontStyle>,
        family: &str,
        facts: &FactSink,
    ) -> Option<Arc<ResolvedFont>> {
        let variants = self.family_variants(family).await;
        if variants.is_empty() {
            facts.missed_family(family);
        }
        let variant = best_variant(style, &variants)?;
        let font = match self.font_for_variant(family, variant).await {
            Some(font) => font,
            None => {
                facts.load_error(family, &Arc::new(variant.clone()));
                return None;
            }
        };
        if !font.font.has_glyph(ch) {
            return None;
        }
        if !style.matches(variant) {
            facts.mismatch(family, style, &font.variant);
        }
        Some(self.for_style(&font, style).await)
    }

    /// Merged candidate variants for a family, provider order preserved.
    /// One in-flight load per family.
    async fn family_variants(&self, family: &str) -> Arc<Vec<FontVariant>> {
        let key = family.to_string();
        self.variant_lists
            .get_or_load(&key, move || async move {
                Arc::new(merged_variants(&self.providers, family).await)
            })
            .await
    }

    /// Parsed font for a variant; one in-flight load per (family, axis
    /// signature). Fetch and parse failures are cached as `None`.
    async fn font_for_variant(&self, family: &str, variant: &FontVariant) -> Option<Arc<ResolvedFont>> {
        let key = format!("{family}|{}", variant.axis_signature());
        self.fonts
            .get_or_load(&key, move || async move {
                match self.load_font(family, variant).await {
                    Ok(font) => Some(font),
                    Err(err) => {
                        warn!("failed to load '{family}' from {}: {err}", variant.source);
                        None
                    }
                }
            })
            .await
    }

    async fn load_font(&self, family: &str, variant: &FontVariant) -> Result<Arc<ResolvedFont>> {
        let bytes = self.fetcher.fetch(&variant.source).await?;
        let font = self.engine.parse(Arc::new(bytes))?;
        Ok(Arc::new(ResolvedFont::new(family, Arc::new(variant.clone()), font)))
    }

    /// A concrete instance when the style requests variable axes the font
    /// supports, cached under the full normalized axis signature so equal
    /// styles share one handle.
    async fn for_style(&self, font: &Arc<ResolvedFont>, style: &FontStyle) -> Arc<ResolvedFont> {
        let axes = font.font.variation_axes();
        let coords: Vec<(Tag, f32)> = style
            .axes
            .iter()
            .filter(|(tag, _)| axes.contains(tag))
            .map(|(tag, value)| (*tag, *value))
            .collect();
        if coords.is_empty() {
            return Arc::clone(font);
        }
        let mut key = format!("{}|{}", font.family, font.variant.axis_signature());
        for (tag, value) in &coords {
            key.push_str(&format!("|{tag}:{value}"));
        }
        let base = Arc::clone(font);
        let instance_coords = coords.clone();
        self.fonts
            .get_or_load(&key, move || async move {
                Some(Arc::new(ResolvedFont::new(
                    base.family.clone(),
                    Arc::clone(&base.variant),
                    base.font.instance(&instance_coords),
                )))
            })
            .await
            .unwrap_or_else(|| Arc::clone(font))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use indexmap::IndexMap;

    use super::*;
    use crate::{
        providers::ConfigProvider,
        testutil::{EchoFetcher, MockEngine, config_map, style_for},
        variant::{AxisCoord, WGHT},
    };

    fn resolver_with(
        map: std::collections::HashMap<String, Vec<FontVariant>>,
        options: ResolverOptions,
    ) -> FontResolver {
        FontResolver::new(
            vec![Box::new(ConfigProvider::new(map))],
            Arc::new(EchoFetcher),
            Arc::new(MockEngine),
            options,
        )
    }

    #[tokio::test]
    async fn resolves_through_family_order() {
        let map = config_map(&[("First", "missing=A"), ("Second", "adv=0.5")]);
        let resolver = resolver_with(map, ResolverOptions::default());
        let style = style_for(&["First", "Second"]);
        let facts = FactSink::default();
        let result = resolver.font_for_char('A', &style, &facts).await.unwrap();
        assert_eq!(result.font.unwrap().family, "Second");
        let result = resolver.font_for_char('B', &style, &facts).await.unwrap();
        assert_eq!(result.font.unwrap().family, "First");
    }

    #[tokio::test]
    async fn missing_family_is_recorded_once() {
        let map = config_map(&[("Known", "adv=0.5")]);
        let resolver = resolver_with(map, ResolverOptions::default());
        let style = style_for(&["Ghost", "Known"]);
        let facts = FactSink::default();
        resolver.font_for_char('A', &style, &facts).await.unwrap();
        resolver.font_for_char('B', &style, &facts).await.unwrap();
        let facts = facts.into_facts();
        assert_eq!(facts.missed, vec!["Ghost"]);
    }

    #[tokio::test]
    async fn load_failure_is_recorded_and_skipped() {
        let map = config_map(&[("Broken", "bad"), ("Good", "adv=0.5")]);
        let resolver = resolver_with(map, ResolverOptions::default());
        let style = style_for(&["Broken", "Good"]);
        let facts = FactSink::default();
        let result = resolver.font_for_char('A', &style, &facts).await.unwrap();
        assert_eq!(result.font.unwrap().family, "Good");
        resolver.font_for_char('B', &style, &facts).await.unwrap();
        assert_eq!(facts.into_facts().errors.len(), 1);
    }

    #[tokio::test]
    async fn mismatch_warning_for_inexact_variant() {
        let mut map = config_map(&[]);
        map.insert(
            "Only400".to_string(),
            vec![FontVariant::new("adv=0.5").with_axis(WGHT, AxisCoord::Value(400.0))],
        );
        let resolver = resolver_with(map, ResolverOptions::default());
        let mut axes = IndexMap::new();
        axes.insert(WGHT, 700.0);
        let style = Arc::new(FontStyle::new(vec!["Only400".to_string()], axes, IndexMap::new()));
        let facts = FactSink::default();
        let result = resolver.font_for_char('A', &style, &facts).await.unwrap();
        assert!(result.font.is_some());
        assert_eq!(facts.into_facts().warnings.len(), 1);
    }

    #[tokio::test]
    async fn family_class_alias_is_tried_first() {
        let map = config_map(&[("Actual", "adv=0.5")]);
        let mut options = ResolverOptions::default();
        options
            .family_classes
            .insert("sans-serif".to_string(), vec!["Actual".to_string()]);
        let resolver = resolver_with(map, options);
        let style = style_for(&["sans-serif"]);
        let facts = FactSink::default();
        let result = resolver.font_for_char('A', &style, &facts).await.unwrap();
        assert_eq!(result.font.unwrap().family, "Actual");
    }

    #[tokio::test]
    async fn fallback_families_are_tried_after_declared() {
        let map = config_map(&[("Backup", "adv=0.5")]);
        let options = ResolverOptions {
            fallback_families: vec!["Backup".to_string()],
            ..Default::default()
        };
        let resolver = resolver_with(map, options);
        let style = style_for(&["Declared"]);
        let facts = FactSink::default();
        let result = resolver.font_for_char('A', &style, &facts).await.unwrap();
        assert_eq!(result.font.unwrap().family, "Backup");
        assert!(!result.is_fallback);
    }

    #[tokio::test]
    async fn fallback_glyph_substitutes_and_marks() {
        let map = config_map(&[("Marker", "adv=0.5")]);
        let options = ResolverOptions {
            fallback_glyph: Some(FallbackGlyph { family: "Marker".to_string(), ch: '?' }),
            ..Default::default()
        };
        let resolver = resolver_with(map, options);
        let style = style_for(&["Nowhere"]);
        let facts = FactSink::default();
        let result = resolver.font_for_char('A', &style, &facts).await.unwrap();
        assert!(result.is_fallback);
        assert_eq!(result.ch, '?');
        assert_eq!(result.font.unwrap().family, "Marker");
    }

    #[tokio::test]
    async fn silent_policy_returns_no_font() {
        let resolver = resolver_with(config_map(&[]), ResolverOptions::default());
        let style = style_for(&["Nowhere"]);
        let facts = FactSink::default();
        let result = resolver.font_for_char('A', &style, &facts).await.unwrap();
        assert!(result.font.is_none());
    }

    #[tokio::test]
    async fn error_policy_fails_hard() {
        let options =
            ResolverOptions { no_font_action: NoFontAction::Error, ..Default::default() };
        let resolver = resolver_with(config_map(&[]), options);
        let style = style_for(&["Nowhere"]);
        let facts = FactSink::default();
        let err = resolver.font_for_char('A', &style, &facts).await.unwrap_err();
        assert!(matches!(err, Error::NoFont { skip_node: false, .. }));
    }

    #[tokio::test]
    async fn skip_node_policy_signals_node_skip() {
        let options =
            ResolverOptions { no_font_action: NoFontAction::SkipNode, ..Default::default() };
        let resolver = resolver_with(config_map(&[]), options);
        let style = style_for(&["Nowhere"]);
        let facts = FactSink::default();
        let err = resolver.font_for_char('A', &style, &facts).await.unwrap_err();
        assert!(matches!(err, Error::NoFont { skip_node: true, .. }));
    }

    /// Provider that counts how often it is actually queried.
    struct CountingProvider {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SourceProvider for CountingProvider {
        async fn variants(&self, _family: &str) -> Vec<FontVariant> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            vec![FontVariant::new("adv=0.5")]
        }
    }

    #[tokio::test]
    async fn concurrent_family_requests_share_one_provider_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let resolver = FontResolver::new(
            vec![Box::new(CountingProvider { calls: Arc::clone(&calls) })],
            Arc::new(EchoFetcher),
            Arc::new(MockEngine),
            ResolverOptions::default(),
        );
        let style = style_for(&["Shared"]);
        let facts = FactSink::default();
        let (a, b) = tokio::join!(
            resolver.font_for_char('A', &style, &facts),
            resolver.font_for_char('B', &style, &facts)
        );
        assert!(a.unwrap().font.is_some());
        assert!(b.unwrap().font.is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
