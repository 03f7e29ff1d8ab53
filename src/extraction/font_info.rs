/*!
 * Fonts referenced by page resources, reduced to what text extraction needs:
 * how to split a string into character codes, what each code means, and how
 * far each one advances.
 */

use std::collections::HashMap;

use lopdf::{Dictionary, Document, Object};

use super::objects::{as_f32, as_i64, name_of, resolve, resolve_dict, stream_bytes};
use crate::fonts::standard::{self, COURIER_WIDTH};
use crate::fonts::ToUnicodeMap;

/// One decoded character code
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedGlyph {
    pub text: String,
    /// Advance in thousandths of text space units
    pub width: f32,
    /// Single-byte code 32, which receives word spacing
    pub is_word_space: bool,
}

#[derive(Debug, Clone)]
enum Widths {
    Simple { first_char: u32, widths: Vec<f32>, missing: f32 },
    Cid { widths: HashMap<u32, f32>, default: f32 },
    Helvetica,
    Monospaced,
}

/// Extraction view of one PDF font
#[derive(Debug, Clone)]
pub struct PdfFont {
    pub family: String,
    code_len: usize,
    to_unicode: Option<ToUnicodeMap>,
    differences: HashMap<u32, char>,
    widths: Widths,
}

impl PdfFont {
    /// Fallback when a `Tf` names a font missing from the resources
    pub fn fallback() -> Self {
        Self {
            family: "Helvetica".to_string(),
            code_len: 1,
            to_unicode: None,
            differences: HashMap::new(),
            widths: Widths::Helvetica,
        }
    }

    pub fn from_dict(doc: &Document, dict: &Dictionary) -> Self {
        let base_font = dict.get(b"BaseFont").ok().and_then(|o| name_of(doc, o)).unwrap_or_default();
        let subtype = dict.get(b"Subtype").ok().and_then(|o| name_of(doc, o)).unwrap_or_default();
        let composite = subtype == "Type0";

        let to_unicode = dict
            .get(b"ToUnicode")
            .ok()
            .and_then(|o| stream_bytes(doc, o))
            .map(|bytes| ToUnicodeMap::parse(&bytes))
            .filter(|map| !map.is_empty());

        let widths = if composite {
            cid_widths(doc, dict)
        } else {
            simple_widths(doc, dict, &base_font)
        };

        Self {
            family: normalize_font_name(&base_font),
            code_len: if composite { 2 } else { 1 },
            to_unicode,
            differences: if composite { HashMap::new() } else { differences(doc, dict) },
            widths,
        }
    }

    /// Split a string operand into codes and decode each
    pub fn decode(&self, bytes: &[u8]) -> Vec<DecodedGlyph> {
        bytes
            .chunks(self.code_len)
            .map(|chunk| {
                let code = chunk.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32);
                DecodedGlyph {
                    text: self.code_to_text(code),
                    width: self.width_of(code),
                    is_word_space: self.code_len == 1 && code == 32,
                }
            })
            .collect()
    }

    fn code_to_text(&self, code: u32) -> String {
        if let Some(text) = self.to_unicode.as_ref().and_then(|m| m.lookup(code)) {
            return text.to_string();
        }
        if let Some(ch) = self.differences.get(&code) {
            return ch.to_string();
        }
        if self.code_len == 1 {
            return standard::winansi_decode(code as u8).map(String::from).unwrap_or_default();
        }
        // Identity encoding without a ToUnicode map: guess the code is Unicode.
        char::from_u32(code).filter(|c| !c.is_control()).map(String::from).unwrap_or_default()
    }

    fn width_of(&self, code: u32) -> f32 {
        match &self.widths {
            Widths::Simple { first_char, widths, missing } => code
                .checked_sub(*first_char)
                .and_then(|i| widths.get(i as usize))
                .copied()
                .unwrap_or(*missing),
            Widths::Cid { widths, default } => widths.get(&code).copied().unwrap_or(*default),
            Widths::Helvetica => {
                let ch = self.code_to_text(code).chars().next().unwrap_or(' ');
                standard::helvetica_width(ch) as f32
            }
            Widths::Monospaced => COURIER_WIDTH as f32,
        }
    }
}

fn simple_widths(doc: &Document, dict: &Dictionary, base_font: &str) -> Widths {
    let first_char = dict.get(b"FirstChar").ok().and_then(|o| as_i64(doc, o)).unwrap_or(0).max(0) as u32;
    let widths: Vec<f32> = dict
        .get(b"Widths")
        .ok()
        .and_then(|o| resolve(doc, o))
        .and_then(|o| o.as_array().ok())
        .map(|arr| arr.iter().map(|w| as_f32(doc, w).unwrap_or(0.0)).collect())
        .unwrap_or_default();

    if !widths.is_empty() {
        let missing = dict
            .get(b"FontDescriptor")
            .ok()
            .and_then(|o| resolve_dict(doc, o))
            .and_then(|fd| fd.get(b"MissingWidth").ok().and_then(|o| as_f32(doc, o)))
            .unwrap_or(0.0);
        return Widths::Simple { first_char, widths, missing };
    }
    if standard::is_core_font(base_font) && base_font.starts_with("Courier") {
        Widths::Monospaced
    } else {
        Widths::Helvetica
    }
}

fn cid_widths(doc: &Document, dict: &Dictionary) -> Widths {
    let descendant = dict
        .get(b"DescendantFonts")
        .ok()
        .and_then(|o| resolve(doc, o))
        .and_then(|o| o.as_array().ok())
        .and_then(|arr| arr.first())
        .and_then(|o| resolve_dict(doc, o));
    let Some(descendant) = descendant else {
        return Widths::Cid { widths: HashMap::new(), default: 1000.0 };
    };

    let default = descendant.get(b"DW").ok().and_then(|o| as_f32(doc, o)).unwrap_or(1000.0);
    let mut widths = HashMap::new();
    let entries: Vec<&Object> = descendant
        .get(b"W")
        .ok()
        .and_then(|o| resolve(doc, o))
        .and_then(|o| o.as_array().ok())
        .map(|arr| arr.iter().collect())
        .unwrap_or_default();

    // Entries are either `c [w1 w2 ...]` or `c_first c_last w`.
    let mut i = 0;
    while i < entries.len() {
        let Some(start) = as_i64(doc, entries[i]) else { break };
        match entries.get(i + 1).and_then(|o| resolve(doc, o)) {
            Some(Object::Array(list)) => {
                for (offset, w) in list.iter().enumerate() {
                    if let Some(w) = as_f32(doc, w) {
                        widths.insert(start as u32 + offset as u32, w);
                    }
                }
                i += 2;
            }
            Some(end) => {
                let (Some(end), Some(w)) = (as_i64(doc, end), entries.get(i + 2).and_then(|o| as_f32(doc, o))) else {
                    break;
                };
                for code in start..=end.min(start + 0xFFFF) {
                    widths.insert(code as u32, w);
                }
                i += 3;
            }
            None => break,
        }
    }
    Widths::Cid { widths, default }
}

fn differences(doc: &Document, dict: &Dictionary) -> HashMap<u32, char> {
    let mut map = HashMap::new();
    let Some(encoding) = dict.get(b"Encoding").ok().and_then(|o| resolve_dict(doc, o)) else {
        return map;
    };
    let Some(list) = encoding
        .get(b"Differences")
        .ok()
        .and_then(|o| resolve(doc, o))
        .and_then(|o| o.as_array().ok())
    else {
        return map;
    };

    let mut code = 0u32;
    for item in list {
        match item {
            Object::Integer(start) => code = (*start).max(0) as u32,
            Object::Name(name) => {
                if let Some(ch) = standard::glyph_name_to_char(&String::from_utf8_lossy(name)) {
                    map.insert(code, ch);
                }
                code += 1;
            }
            _ => {}
        }
    }
    map
}

/// Strip the subset tag and style suffix: `ABCDEF+Arial-BoldMT` becomes `Arial`
pub fn normalize_font_name(base_font: &str) -> String {
    let name = match base_font.split_once('+') {
        Some((tag, rest)) if tag.len() == 6 && tag.chars().all(|c| c.is_ascii_uppercase()) => rest,
        _ => base_font,
    };
    let family = name.split([',', '-']).next().unwrap_or(name).trim();
    if family.is_empty() { "Unknown".to_string() } else { family.to_string() }
}
