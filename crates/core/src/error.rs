use std::result;

/// Error types for text-to-path conversion.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No family, fallback family or fallback glyph produced a font
    /// containing the character. `skip_node` carries the skip-node
    /// policy: the current element is abandoned instead of the whole
    /// document operation.
    #[error("no font found for char {ch:?} in families {families:?}")]
    NoFont {
        ch: char,
        families: Vec<String>,
        skip_node: bool,
    },

    #[error("failed to parse document: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("failed to parse font: {0}")]
    FontParse(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = result::Result<T, Error>;
