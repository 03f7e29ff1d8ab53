/*!
 * Fonts shared by extraction and reconstruction: core font metrics and
 * encodings, ToUnicode maps, and the font translated text is rendered in.
 */

pub mod cmap;
pub mod standard;
pub mod truetype;

use std::path::Path;
use std::sync::Arc;

use log::{info, warn};

use crate::errors::RenderError;

pub use cmap::ToUnicodeMap;
pub use truetype::TrueTypeFont;

/// Unicode TrueType fonts tried in order when no font file is configured
pub const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
    "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial Unicode.ttf",
    "/Library/Fonts/Arial Unicode.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/System/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
    "C:\\Windows\\Fonts\\calibri.ttf",
];

/// Font used to draw translated text
#[derive(Debug, Clone, Default)]
pub enum RenderFont {
    /// Core Helvetica, WinAnsi encoded, never embedded
    #[default]
    Helvetica,
    /// Embedded as a composite font with UTF-16 codes
    TrueType(Arc<TrueTypeFont>),
}

impl RenderFont {
    /// The TrueType font file at `path`, or the first usable system font
    pub fn load(path: Option<&str>) -> Result<Self, RenderError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::discover(SYSTEM_FONT_CANDIDATES)),
        }
    }

    /// First candidate that exists and parses, else Helvetica
    pub fn discover(candidates: &[&str]) -> Self {
        for path in candidates {
            if !Path::new(path).is_file() {
                continue;
            }
            match Self::from_file(path) {
                Ok(font) => {
                    info!("Rendering with system font {}", path);
                    return font;
                }
                Err(e) => warn!("Skipping system font: {}", e),
            }
        }
        info!("No system TrueType font found, rendering with Helvetica");
        Self::Helvetica
    }

    fn from_file(path: &str) -> Result<Self, RenderError> {
        let data = std::fs::read(path).map_err(|e| RenderError::Font(format!("cannot read font '{}': {}", path, e)))?;
        let name = Path::new(path)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::TrueType(Arc::new(TrueTypeFont::from_bytes(name, data)?)))
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Helvetica => "Helvetica",
            Self::TrueType(font) => font.name(),
        }
    }

    /// Advance of one character in thousandths of an em
    pub fn char_width(&self, ch: char) -> f32 {
        match self {
            Self::Helvetica => standard::helvetica_width(ch) as f32,
            Self::TrueType(font) => font.advance(ch),
        }
    }

    /// Width of `text` at `size` points
    pub fn text_width(&self, text: &str, size: f32) -> f32 {
        text.chars().map(|c| self.char_width(c)).sum::<f32>() * size / 1000.0
    }

    pub fn can_encode(&self, ch: char) -> bool {
        match self {
            Self::Helvetica => standard::winansi_encode(ch).is_some(),
            Self::TrueType(font) => font.glyph_index(ch).is_some(),
        }
    }

    /// First character of `text` the font cannot draw
    pub fn first_unencodable(&self, text: &str) -> Option<char> {
        text.chars().find(|c| !c.is_whitespace() && !self.can_encode(*c))
    }

    /// Baseline offset below the top of a line, as a fraction of the size
    pub fn ascent(&self) -> f32 {
        match self {
            Self::Helvetica => 0.8,
            Self::TrueType(font) => font.ascent().clamp(0.5, 1.2),
        }
    }

    /// String operand bytes for a text showing operator
    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            Self::Helvetica => text
                .chars()
                .map(|c| if c.is_whitespace() { b' ' } else { standard::winansi_encode(c).unwrap_or(b'?') })
                .collect(),
            Self::TrueType(_) => text
                .chars()
                .map(|c| if c.is_whitespace() { ' ' } else { c })
                .flat_map(|c| {
                    let mut units = [0u16; 2];
                    c.encode_utf16(&mut units).iter().flat_map(|u| u.to_be_bytes()).collect::<Vec<u8>>()
                })
                .collect(),
        }
    }
}
