/*!
 * Objects written into the output document besides page content: the
 * rendering font, re-embedded images and pages imported from the source.
 */

use std::collections::{BTreeSet, HashMap};

use log::warn;
use lopdf::content::Content;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};

use crate::document::{ColorSpace, RasterImage};
use crate::errors::RenderError;
use crate::extraction::objects::{inherited, number_array, resolve_dict};
use crate::fonts::{cmap, RenderFont, TrueTypeFont};

/// Add the font dictionary for `font`, covering the characters in `used`
pub fn embed_font(doc: &mut Document, font: &RenderFont, used: &BTreeSet<char>) -> Result<ObjectId, RenderError> {
    match font {
        RenderFont::Helvetica => Ok(doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        })),
        RenderFont::TrueType(truetype) => embed_truetype(doc, truetype, used),
    }
}

/// Type0 font with Identity-H encoding: codes are UTF-16 units, used as CIDs
fn embed_truetype(doc: &mut Document, font: &TrueTypeFont, used: &BTreeSet<char>) -> Result<ObjectId, RenderError> {
    let mut glyphs: Vec<(u16, u16, f32)> = Vec::new();
    for &ch in used.iter().chain(std::iter::once(&' ')) {
        let cid = u16::try_from(ch as u32)
            .map_err(|_| RenderError::Font(format!("character U+{:04X} is outside the BMP", ch as u32)))?;
        let gid = match font.glyph_index(ch) {
            Some(gid) => gid,
            None if ch == ' ' => 0,
            None => {
                return Err(RenderError::Font(format!(
                    "font '{}' has no glyph for '{}' (U+{:04X})",
                    font.name(),
                    ch,
                    ch as u32
                )))
            }
        };
        glyphs.push((cid, gid, font.advance(ch)));
    }
    glyphs.sort_by_key(|(cid, _, _)| *cid);
    glyphs.dedup_by_key(|(cid, _, _)| *cid);

    let max_cid = glyphs.last().map(|(cid, _, _)| *cid as usize).unwrap_or(0);
    let mut cid_to_gid = vec![0u8; (max_cid + 1) * 2];
    for (cid, gid, _) in &glyphs {
        let offset = *cid as usize * 2;
        cid_to_gid[offset..offset + 2].copy_from_slice(&gid.to_be_bytes());
    }

    let widths: Vec<Object> = glyphs
        .iter()
        .flat_map(|(cid, _, width)| {
            [
                Object::Integer(*cid as i64),
                Object::Array(vec![Object::Integer(width.round() as i64)]),
            ]
        })
        .collect();

    let ascent = (font.ascent() * 1000.0).round() as i64;
    let descent = (font.descent() * 1000.0).round() as i64;
    let data = font.data().to_vec();
    let font_file_id = doc.add_object(Stream::new(dictionary! { "Length1" => data.len() as i64 }, data));
    let descriptor_id = doc.add_object(dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => Object::Name(font.name().as_bytes().to_vec()),
        "Flags" => 32,
        "FontBBox" => vec![Object::Integer(-200), Object::Integer(descent), Object::Integer(1200), Object::Integer(ascent)],
        "ItalicAngle" => 0,
        "Ascent" => ascent,
        "Descent" => descent,
        "CapHeight" => (ascent as f32 * 0.9).round() as i64,
        "StemV" => 80,
        "FontFile2" => font_file_id,
    });
    let cid_map_id = doc.add_object(Stream::new(dictionary! {}, cid_to_gid));
    let cid_font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "CIDFontType2",
        "BaseFont" => Object::Name(font.name().as_bytes().to_vec()),
        "CIDSystemInfo" => dictionary! {
            "Registry" => Object::string_literal("Adobe"),
            "Ordering" => Object::string_literal("Identity"),
            "Supplement" => 0,
        },
        "FontDescriptor" => descriptor_id,
        "DW" => 1000,
        "W" => widths,
        "CIDToGIDMap" => cid_map_id,
    });
    let to_unicode_id = doc.add_object(Stream::new(dictionary! {}, cmap::identity_utf16_cmap()));

    Ok(doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type0",
        "BaseFont" => Object::Name(font.name().as_bytes().to_vec()),
        "Encoding" => "Identity-H",
        "DescendantFonts" => vec![Object::Reference(cid_font_id)],
        "ToUnicode" => to_unicode_id,
    }))
}

/// Re-embed an image from its original encoded payload
pub fn embed_image(doc: &mut Document, image: &RasterImage) -> ObjectId {
    let encoding = &image.encoding;
    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => encoding.width as i64,
        "Height" => encoding.height as i64,
    };

    if encoding.image_mask {
        dict.set("ImageMask", true);
    } else {
        dict.set("BitsPerComponent", encoding.bits_per_component as i64);
        if let Some(space) = &encoding.color_space {
            dict.set("ColorSpace", color_space_object(space));
        }
    }

    match encoding.filters.as_slice() {
        [] => {}
        [single] => dict.set("Filter", Object::Name(single.as_bytes().to_vec())),
        many => dict.set(
            "Filter",
            many.iter().map(|f| Object::Name(f.as_bytes().to_vec())).collect::<Vec<Object>>(),
        ),
    }
    if !encoding.decode_parms.is_empty() {
        let mut parms = Dictionary::new();
        for (key, value) in &encoding.decode_parms {
            parms.set(key.as_bytes().to_vec(), *value);
        }
        dict.set("DecodeParms", parms);
    }
    if let Some(decode) = &encoding.decode {
        dict.set("Decode", decode.iter().map(|v| Object::Real(*v)).collect::<Vec<Object>>());
    }
    if let Some(mask) = &image.soft_mask {
        let mask_id = embed_image(doc, mask);
        dict.set("SMask", mask_id);
    }

    let mut stream = Stream::new(dict, image.payload.to_vec());
    stream.allows_compression = false;
    doc.add_object(stream)
}

fn color_space_object(space: &ColorSpace) -> Object {
    match space {
        ColorSpace::DeviceGray => Object::Name(b"DeviceGray".to_vec()),
        ColorSpace::DeviceRgb => Object::Name(b"DeviceRGB".to_vec()),
        ColorSpace::DeviceCmyk => Object::Name(b"DeviceCMYK".to_vec()),
        ColorSpace::Indexed { base, hival, lookup } => Object::Array(vec![
            Object::Name(b"Indexed".to_vec()),
            color_space_object(base),
            Object::Integer(*hival as i64),
            Object::String(lookup.clone(), StringFormat::Hexadecimal),
        ]),
    }
}

/// Operators that paint glyphs
const TEXT_SHOWING: [&str; 4] = ["Tj", "TJ", "'", "\""];

/// Drop the glyph-painting operators from a content stream
///
/// Text state, colour and positioning operators stay, so the graphics that
/// follow a text object are painted exactly as before.
pub fn strip_text(content: &[u8]) -> Result<Vec<u8>, RenderError> {
    let mut decoded = Content::decode(content)?;
    decoded
        .operations
        .retain(|op| !TEXT_SHOWING.contains(&op.operator.as_str()));
    Ok(decoded.encode()?)
}

/// Deep copy of objects from a source document, each source object copied once
pub struct ObjectImporter<'a> {
    source: &'a Document,
    imported: HashMap<ObjectId, ObjectId>,
    without_text: bool,
}

impl<'a> ObjectImporter<'a> {
    pub fn new(source: &'a Document) -> Self {
        Self {
            source,
            imported: HashMap::new(),
            without_text: false,
        }
    }

    /// Strip text from every imported page and Form XObject
    pub fn without_text(mut self) -> Self {
        self.without_text = true;
        self
    }

    /// Copy `object` and everything it references into `target`
    pub fn import(&mut self, target: &mut Document, object: &Object) -> Object {
        match object {
            Object::Reference(id) => Object::Reference(self.import_reference(target, *id)),
            Object::Array(items) => Object::Array(items.iter().map(|o| self.import(target, o)).collect()),
            Object::Dictionary(dict) => Object::Dictionary(self.import_dictionary(target, dict)),
            Object::Stream(stream) => {
                let mut copy = Stream::new(self.import_dictionary(target, &stream.dict), stream.content.clone());
                copy.allows_compression = stream.allows_compression;
                if self.without_text && is_form(&stream.dict) {
                    self.strip_form_text(&mut copy);
                }
                Object::Stream(copy)
            }
            other => other.clone(),
        }
    }

    fn import_dictionary(&mut self, target: &mut Document, dict: &Dictionary) -> Dictionary {
        let mut copy = Dictionary::new();
        for (key, value) in dict.iter() {
            // back links into the source page tree
            if key.as_slice() == b"Parent" || key.as_slice() == b"P" {
                continue;
            }
            copy.set(key.clone(), self.import(target, value));
        }
        copy
    }

    fn import_reference(&mut self, target: &mut Document, id: ObjectId) -> ObjectId {
        if let Some(existing) = self.imported.get(&id) {
            return *existing;
        }
        let new_id = target.new_object_id();
        self.imported.insert(id, new_id);
        let copy = match self.source.get_object(id) {
            Ok(object) => self.import(target, object),
            Err(_) => Object::Null,
        };
        target.objects.insert(new_id, copy);
        new_id
    }

    /// The source page as a Form XObject drawn at the origin of the output page
    pub fn page_as_form(&mut self, target: &mut Document, page_id: ObjectId) -> Result<ObjectId, RenderError> {
        let source = self.source;
        let page = source.get_dictionary(page_id)?;
        let mut content = source.get_page_content(page_id)?;
        if self.without_text {
            content = strip_text(&content)?;
        }

        let bbox = inherited(source, page, b"MediaBox")
            .and_then(|o| number_array(source, o))
            .filter(|values| values.len() == 4)
            .unwrap_or_else(|| vec![0.0, 0.0, 612.0, 792.0]);
        let (llx, lly) = (bbox[0].min(bbox[2]), bbox[1].min(bbox[3]));

        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => bbox.iter().map(|v| Object::Real(*v)).collect::<Vec<Object>>(),
            "Matrix" => vec![1.into(), 0.into(), 0.into(), 1.into(), Object::Real(-llx), Object::Real(-lly)],
        };
        if let Some(resources) = inherited(source, page, b"Resources").and_then(|r| resolve_dict(source, r)) {
            dict.set("Resources", self.import_dictionary(target, resources));
        }
        Ok(target.add_object(Stream::new(dict, content)))
    }

    fn strip_form_text(&self, form: &mut Stream) {
        let stripped = form.get_plain_content().map_err(RenderError::from).and_then(|c| strip_text(&c));
        match stripped {
            Ok(content) => form.set_plain_content(content),
            Err(e) => warn!("Keeping a form XObject whose content cannot be parsed: {}", e),
        }
    }
}

fn is_form(dict: &Dictionary) -> bool {
    dict.get(b"Subtype").and_then(Object::as_name).is_ok_and(|name| name == b"Form")
}
