//! textoutline core - font resolution and glyph layout for SVG
//! text-to-path conversion.
//!
//! A [`session::Session`] walks `<text>` elements of a parsed document,
//! resolves a font for every character through an ordered provider chain
//! with CSS-style variant matching and fallback policies, then replaces
//! the text with absolutely positioned `<path>` outlines.

pub mod cache;
pub mod dom;
pub mod error;
pub mod fetch;
pub mod font;
mod layout;
pub mod provider;
pub mod providers;
pub mod resolver;
pub mod session;
pub mod stats;
pub mod style;
pub mod variant;

pub use error::{Error, Result};
pub use font::{FontEngine, FontForChar, FontMetrics, ParsedFont, ResolvedFont, ShapedGlyph};
pub use session::{ElementOutcome, Session, SessionOptions, TextRun};
pub use stats::SessionStat;
pub use style::FontStyle;
pub use variant::{AxisCoord, FontVariant, best_variant};

#[cfg(test)]
pub(crate) mod testutil;
