//! JSON configuration file support.
//!
//! Keys are camelCase and mirror the command-line options; explicit
//! command-line flags win over config values.

use std::{collections::HashMap, path::PathBuf};

use serde::Deserialize;
use textoutline_core::variant::FontVariant;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileConfig {
    /// Static variant lists per family, e.g.
    /// `{"Fira Sans": [{"wght": 400, "source": "fonts/fira.ttf"}]}`.
    pub fonts: HashMap<String, Vec<FontVariant>>,
    pub fonts_dir: Option<PathBuf>,
    /// Directory scan cache lifetime in seconds.
    pub fonts_dir_cache: Option<u64>,
    pub fonts_url: Option<String>,
    /// Repository response cache lifetime in seconds.
    pub fonts_url_cache: Option<u64>,
    pub google_api_key: Option<String>,
    /// Catalog cache lifetime in seconds.
    pub google_cache: Option<u64>,
    pub family_classes: Option<HashMap<String, Vec<String>>>,
    pub fallback_families: Option<Vec<String>>,
    /// Substitute glyph as `[family, codepoint]`.
    pub fallback_glyph: Option<(String, u32)>,
    pub no_font_action: Option<String>,
    pub split: Option<bool>,
    pub decimals: Option<u8>,
    pub text_attr: Option<String>,
    pub keep_font_attrs: Option<bool>,
}
