//! CLI definitions and dispatch.

use std::{
    collections::HashMap,
    io::{Read, Write},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, Result, bail};
use clap::Parser;
use textoutline_core::{
    Session, SessionOptions,
    dom::Document,
    resolver::{FallbackGlyph, NoFontAction},
};
use textoutline_engine::OutlineFontEngine;

use crate::{config::FileConfig, stat::print_stat};

/// Replace SVG `<text>` elements with glyph outline paths.
#[derive(Parser)]
#[command(name = "textoutline")]
#[command(about = "Replace SVG text elements with glyph outline paths")]
pub struct Cli {
    /// Input SVG file; stdin when omitted.
    pub input: Option<PathBuf>,

    /// Output file; the input file is rewritten in place when omitted.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// JSON config file (camelCase keys).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Fonts directory: `<family>/<wght><i?>.ttf` for static fonts,
    /// axis-range names like `wght,100..900.ttf` for variable fonts.
    #[arg(short = 'd', long)]
    pub fonts_dir: Option<PathBuf>,

    /// Font repository URL; a `--family--` placeholder is replaced per
    /// family, otherwise one request must return a family map.
    #[arg(short = 'u', long)]
    pub fonts_url: Option<String>,

    /// Google Fonts API key.
    #[arg(short = 'g', long)]
    pub google_api_key: Option<String>,

    /// Elements to convert (comma-separated tag names).
    #[arg(short = 'q', long, default_value = "text")]
    pub selector: String,

    /// Emit one path per glyph instead of one per text node.
    #[arg(short, long)]
    pub split: bool,

    /// Decimal places in path coordinates.
    #[arg(short = 'e', long)]
    pub decimals: Option<u8>,

    /// Save the replaced text content into this attribute.
    #[arg(short = 'a', long)]
    pub text_attr: Option<String>,

    /// Keep font presentation attributes on converted elements.
    #[arg(short = 'k', long)]
    pub keep_font_attrs: bool,

    /// Family classes, e.g. `sans-serif:Arial,Tahoma;serif:Georgia`.
    #[arg(short = 'f', long)]
    pub family_classes: Option<String>,

    /// Fallback families, e.g. `Arial,Times New Roman`.
    #[arg(short = 'm', long)]
    pub fallback_families: Option<String>,

    /// Fallback glyph as `family,codepoint`.
    #[arg(short = 'x', long)]
    pub fallback_glyph: Option<String>,

    /// When no font covers a char: `error`, `skipNode`, anything else
    /// skips the character.
    #[arg(short = 'n', long)]
    pub no_font_action: Option<String>,

    /// Write JSON statistics to a file, or print them when no file is
    /// given.
    #[arg(short = 'j', long, num_args = 0..=1)]
    pub stat: Option<Option<PathBuf>>,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let content = match &self.input {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?,
            None => {
                let mut buffer = String::new();
                std::io::stdin()
                    .read_to_string(&mut buffer)
                    .context("Failed to read stdin")?;
                buffer
            }
        };

        let options = self.build_options()?;
        let doc = Document::parse(&content)?;
        let mut session = Session::new(doc, options, Arc::new(OutlineFontEngine::new()));
        let stat = session.replace_all(&self.selector).await?;
        let svg = session.svg_string();

        match (&self.output, &self.input) {
            (Some(path), _) | (None, Some(path)) => std::fs::write(path, svg)
                .with_context(|| format!("Failed to write {}", path.display()))?,
            (None, None) => std::io::stdout().write_all(svg.as_bytes())?,
        }

        match &self.stat {
            Some(Some(path)) => {
                std::fs::write(path, serde_json::to_string_pretty(&stat.to_json())?)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
            }
            Some(None) => println!("{}", serde_json::to_string(&stat.to_json())?),
            None => {
                // Keep stdout clean when the document itself goes there.
                if self.output.is_some() || self.input.is_some() {
                    print_stat(&stat);
                }
            }
        }
        Ok(())
    }

    fn build_options(&self) -> Result<SessionOptions> {
        let config = match &self.config {
            Some(path) => {
                log::debug!("loading config from {}", path.display());
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                serde_json::from_str::<FileConfig>(&raw)
                    .with_context(|| format!("Invalid config {}", path.display()))?
            }
            None => FileConfig::default(),
        };

        let fallback_glyph = match &self.fallback_glyph {
            Some(raw) => Some(parse_fallback_glyph(raw)?),
            None => config
                .fallback_glyph
                .map(|(family, codepoint)| fallback_glyph_from(family, codepoint))
                .transpose()?,
        };

        let family_classes = match &self.family_classes {
            Some(raw) => parse_family_classes(raw)?,
            None => config.family_classes.unwrap_or_default(),
        };

        let fallback_families = match &self.fallback_families {
            Some(raw) => raw.split(',').map(|f| f.trim().to_string()).collect(),
            None => config.fallback_families.unwrap_or_default(),
        };

        let no_font_action = self
            .no_font_action
            .as_deref()
            .or(config.no_font_action.as_deref())
            .map(parse_no_font_action)
            .unwrap_or_default();

        Ok(SessionOptions {
            fonts: config.fonts,
            fonts_dir: self.fonts_dir.clone().or(config.fonts_dir),
            fonts_dir_ttl: config.fonts_dir_cache.map(Duration::from_secs),
            fonts_url: self.fonts_url.clone().or(config.fonts_url),
            fonts_url_ttl: config.fonts_url_cache.map(Duration::from_secs),
            google_api_key: self.google_api_key.clone().or(config.google_api_key),
            google_ttl: config.google_cache.map(Duration::from_secs),
            family_classes,
            fallback_families,
            fallback_glyph,
            no_font_action,
            split: self.split || config.split.unwrap_or(false),
            decimals: self.decimals.or(config.decimals).unwrap_or(2),
            text_attr: self.text_attr.clone().or(config.text_attr),
            keep_font_attrs: self.keep_font_attrs || config.keep_font_attrs.unwrap_or(false),
        })
    }
}

fn parse_no_font_action(value: &str) -> NoFontAction {
    match value {
        "error" => NoFontAction::Error,
        "skipNode" => NoFontAction::SkipNode,
        _ => NoFontAction::Skip,
    }
}

/// Parse `cls:Family,Family;cls2:Family` alias lists.
fn parse_family_classes(input: &str) -> Result<HashMap<String, Vec<String>>> {
    let mut classes = HashMap::new();
    for item in input.split(';').filter(|i| !i.trim().is_empty()) {
        let Some((class, families)) = item.split_once(':') else {
            bail!("invalid family class '{item}', expected 'class:Family,Family'");
        };
        let families: Vec<String> =
            families.split(',').map(|f| f.trim().to_string()).filter(|f| !f.is_empty()).collect();
        if !class.trim().is_empty() && !families.is_empty() {
            classes.insert(class.trim().to_string(), families);
        }
    }
    Ok(classes)
}

/// Parse `Family,codepoint` fallback glyph specs.
fn parse_fallback_glyph(input: &str) -> Result<FallbackGlyph> {
    let Some((family, codepoint)) = input.split_once(',') else {
        bail!("invalid fallback glyph '{input}', expected 'Family,codepoint'");
    };
    let codepoint: u32 = codepoint
        .trim()
        .parse()
        .with_context(|| format!("invalid fallback codepoint in '{input}'"))?;
    fallback_glyph_from(family.trim().to_string(), codepoint)
}

fn fallback_glyph_from(family: String, codepoint: u32) -> Result<FallbackGlyph> {
    let ch = char::from_u32(codepoint)
        .with_context(|| format!("codepoint {codepoint} is not a character"))?;
    Ok(FallbackGlyph { family, ch })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_classes_parse_nested_lists() {
        let classes =
            parse_family_classes("sans-serif:Arial,Tahoma;serif:Times New Roman").unwrap();
        assert_eq!(classes["sans-serif"], vec!["Arial", "Tahoma"]);
        assert_eq!(classes["serif"], vec!["Times New Roman"]);
        assert!(parse_family_classes("no-colon").is_err());
    }

    #[test]
    fn fallback_glyphs_parse_codepoints() {
        let glyph = parse_fallback_glyph("Arial,63").unwrap();
        assert_eq!(glyph.family, "Arial");
        assert_eq!(glyph.ch, '?');
        assert!(parse_fallback_glyph("Arial").is_err());
    }

    #[test]
    fn no_font_action_defaults_to_skip() {
        assert!(matches!(parse_no_font_action("error"), NoFontAction::Error));
        assert!(matches!(parse_no_font_action("skipNode"), NoFontAction::SkipNode));
        assert!(matches!(parse_no_font_action("whatever"), NoFontAction::Skip));
    }
}
