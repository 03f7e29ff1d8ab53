/*!
 * User supplied TrueType font used for rendering translated text.
 */

use std::sync::Arc;

use ab_glyph::{Font, FontVec, GlyphId};

use crate::errors::RenderError;

/// Parsed TrueType font plus the raw bytes embedded as `FontFile2`
pub struct TrueTypeFont {
    name: String,
    data: Arc<Vec<u8>>,
    font: FontVec,
    units_per_em: f32,
}

impl std::fmt::Debug for TrueTypeFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrueTypeFont")
            .field("name", &self.name)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl TrueTypeFont {
    pub fn from_bytes(name: impl Into<String>, data: Vec<u8>) -> Result<Self, RenderError> {
        let name = sanitize_font_name(&name.into());
        let font = FontVec::try_from_vec(data.clone())
            .map_err(|e| RenderError::Font(format!("cannot parse font '{}': {}", name, e)))?;
        let units_per_em = font
            .units_per_em()
            .filter(|u| *u > 0.0)
            .ok_or_else(|| RenderError::Font(format!("font '{}' has no units per em", name)))?;
        Ok(Self {
            name,
            data: Arc::new(data),
            font,
            units_per_em,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Glyph index for a character, `None` when the font lacks it
    pub fn glyph_index(&self, ch: char) -> Option<u16> {
        if (ch as u32) > 0xFFFF {
            return None;
        }
        match self.font.glyph_id(ch) {
            GlyphId(0) => None,
            GlyphId(id) => Some(id),
        }
    }

    /// Advance width in thousandths of an em
    pub fn advance(&self, ch: char) -> f32 {
        let id = self.font.glyph_id(ch);
        self.font.h_advance_unscaled(id) * 1000.0 / self.units_per_em
    }

    /// Ascent as a fraction of the em
    pub fn ascent(&self) -> f32 {
        self.font.ascent_unscaled() / self.units_per_em
    }

    /// Descent as a (negative) fraction of the em
    pub fn descent(&self) -> f32 {
        self.font.descent_unscaled() / self.units_per_em
    }
}

/// PDF names may not contain whitespace or delimiters
fn sanitize_font_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if cleaned.is_empty() { "EmbeddedFont".to_string() } else { cleaned }
}
