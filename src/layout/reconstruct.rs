/*!
 * Writes the output document: one page per source page, with translated
 * text fitted into the source boxes.
 *
 * When the parsed source is available, replacement mode draws the source
 * page with its glyphs removed underneath the translation, so rules, fills
 * and images stay where they were. Without it, only the extracted images are
 * re-embedded.
 */

use std::collections::{BTreeSet, HashMap};

use chrono::Utc;
use log::{debug, info, warn};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Object, ObjectId, Stream, StringFormat};
use serde::{Deserialize, Serialize};

use super::fitting::TextFitter;
use super::resources::{embed_font, embed_image, ObjectImporter};
use crate::app_config::{LayoutConfig, RenderMode};
use crate::document::{Document, Page, SourcePdf, TextBlock};
use crate::errors::RenderError;
use crate::extraction::objects::{resolve, resolve_dict};
use crate::fonts::RenderFont;
use crate::jobs::CancellationToken;
use crate::translation::TranslationUnit;

const FONT_RESOURCE: &str = "F1";
const ORIGINAL_RESOURCE: &str = "Orig";
const SEPARATOR_GRAY: f32 = 0.6;
const PRODUCER: &str = "folio";

/// Descriptive entries carried over from the source's information dictionary
const INFO_KEYS: [&str; 6] = ["Title", "Author", "Subject", "Keywords", "Creator", "CreationDate"];

/// A block whose translation did not fit even at the smallest size
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverflowWarning {
    pub page_index: usize,
    pub reading_order: usize,
    /// Size the truncated text was drawn at
    pub font_size: f32,
    pub detail: String,
}

#[derive(Debug, Clone)]
pub struct ReconstructOutput {
    pub bytes: Vec<u8>,
    pub warnings: Vec<OverflowWarning>,
}

/// Renders translated units back onto the pages they came from
#[derive(Debug, Clone)]
pub struct Reconstructor {
    fitter: TextFitter,
    mode: RenderMode,
}

impl Reconstructor {
    pub fn new(font: RenderFont, config: &LayoutConfig) -> Self {
        Self {
            fitter: TextFitter::new(font, config),
            mode: config.render_mode,
        }
    }

    pub fn with_mode(mut self, mode: RenderMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    /// Build the output document
    ///
    /// Every text block must have a unit at the same (page, reading order)
    /// address. `on_page(done, total)` runs after each page; cancellation is
    /// checked before each page.
    pub fn reconstruct<F>(
        &self,
        document: &Document,
        units: &[TranslationUnit],
        cancel: &CancellationToken,
        mut on_page: F,
    ) -> Result<ReconstructOutput, RenderError>
    where
        F: FnMut(usize, usize),
    {
        let by_address: HashMap<(usize, usize), &TranslationUnit> = units.iter().map(|u| (u.address(), u)).collect();
        let used = self.check_encodable(document, &by_address)?;

        let source = match self.mode {
            RenderMode::SideBySide => Some(document.source.as_ref().ok_or_else(|| {
                RenderError::Layout("side-by-side output needs the parsed source document".to_string())
            })?),
            RenderMode::Replacement => document.source.as_ref(),
        };

        let mut output = lopdf::Document::with_version("1.7");
        let pages_id = output.new_object_id();
        let font_id = embed_font(&mut output, self.fitter.font(), &used)?;
        let mut importer = source.map(|s| match self.mode {
            RenderMode::SideBySide => ObjectImporter::new(&s.document),
            RenderMode::Replacement => ObjectImporter::new(&s.document).without_text(),
        });

        let total = document.pages.len();
        let mut kids = Vec::with_capacity(total);
        let mut warnings = Vec::new();
        for (done, page) in document.pages.iter().enumerate() {
            if cancel.is_cancelled() {
                info!("Reconstruction cancelled after {} of {} pages", done, total);
                return Err(RenderError::Cancelled);
            }

            let mut xobjects = Dictionary::new();
            let mut operations = Vec::new();
            let mut offset_x = 0.0;
            let mut page_width = page.width;
            let mut images_in_background = false;

            if let (Some(importer), Some(source)) = (importer.as_mut(), source) {
                let page_id = source.page_ids.get(page.index).copied().ok_or_else(|| {
                    RenderError::Layout(format!("page {} is missing from the source document", page.index))
                })?;
                match self.mode {
                    RenderMode::SideBySide => {
                        let form_id = importer.page_as_form(&mut output, page_id)?;
                        xobjects.set(ORIGINAL_RESOURCE, form_id);
                        operations.extend(draw_original(page.width, page.height));
                        offset_x = page.width;
                        page_width = page.width * 2.0;
                    }
                    RenderMode::Replacement => match importer.page_as_form(&mut output, page_id) {
                        Ok(form_id) => {
                            xobjects.set(ORIGINAL_RESOURCE, form_id);
                            operations.extend(draw_background());
                            images_in_background = true;
                        }
                        Err(e) => warn!(
                            "Page {}: source graphics dropped, only images are kept: {}",
                            page.index + 1,
                            e
                        ),
                    },
                }
            }

            if !images_in_background {
                operations.extend(self.draw_images(&mut output, page, offset_x, &mut xobjects));
            }
            operations.extend(self.draw_text(page, &by_address, offset_x, &mut warnings)?);

            let content = Content { operations };
            let content_id = output.add_object(Stream::new(dictionary! {}, content.encode()?));
            let page_id = output.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), Object::Real(page_width), Object::Real(page.height)],
                "Resources" => dictionary! {
                    "Font" => dictionary! { FONT_RESOURCE => font_id },
                    "XObject" => xobjects,
                },
                "Contents" => content_id,
            });
            kids.push(Object::Reference(page_id));
            on_page(done + 1, total);
        }

        output.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => total as i64,
            }),
        );
        let catalog_id = output.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        output.trailer.set("Root", catalog_id);
        let info_id = output.add_object(document_info(document.source.as_ref()));
        output.trailer.set("Info", info_id);
        output.compress();

        let mut bytes = Vec::new();
        output
            .save_to(&mut bytes)
            .map_err(|e| RenderError::Output(format!("cannot serialize output: {}", e)))?;
        info!(
            "Rendered {} pages ({} bytes, {} overflow warnings)",
            total,
            bytes.len(),
            warnings.len()
        );
        Ok(ReconstructOutput { bytes, warnings })
    }

    /// Fail before writing anything when a block has no unit or cannot be drawn
    fn check_encodable(
        &self,
        document: &Document,
        by_address: &HashMap<(usize, usize), &TranslationUnit>,
    ) -> Result<BTreeSet<char>, RenderError> {
        let font = self.fitter.font();
        let mut used = BTreeSet::new();
        for block in document.text_blocks() {
            let unit = unit_for(block, by_address)?;
            let text = unit.output_text();
            if let Some(ch) = font.first_unencodable(text) {
                return Err(RenderError::Font(format!(
                    "font '{}' cannot draw '{}' (U+{:04X}) on page {}",
                    font.name(),
                    ch,
                    ch as u32,
                    block.page_index
                )));
            }
            used.extend(text.chars().filter(|c| !c.is_whitespace()));
        }
        used.extend(self.overflow_marker_chars());
        Ok(used)
    }

    fn overflow_marker_chars(&self) -> Vec<char> {
        self.fitter
            .overflow_marker()
            .chars()
            .filter(|c| !c.is_whitespace() && self.fitter.font().can_encode(*c))
            .collect()
    }

    fn draw_images(
        &self,
        output: &mut lopdf::Document,
        page: &Page,
        offset_x: f32,
        xobjects: &mut Dictionary,
    ) -> Vec<Operation> {
        let mut images: Vec<_> = page.images().collect();
        images.sort_by_key(|image| image.z_order);

        let mut operations = Vec::new();
        for (n, image) in images.into_iter().enumerate() {
            let name = format!("Im{}", n + 1);
            let id: ObjectId = embed_image(output, &image.image);
            xobjects.set(name.as_bytes().to_vec(), id);

            let bbox = &image.bbox;
            operations.push(Operation::new("q", vec![]));
            operations.push(Operation::new(
                "cm",
                vec![
                    Object::Real(bbox.width),
                    0.into(),
                    0.into(),
                    Object::Real(bbox.height),
                    Object::Real(bbox.x + offset_x),
                    Object::Real(page.height - bbox.bottom()),
                ],
            ));
            operations.push(Operation::new("Do", vec![Object::Name(name.into_bytes())]));
            operations.push(Operation::new("Q", vec![]));
        }
        debug!("Page {}: {} images re-embedded", page.index, operations.len() / 4);
        operations
    }

    fn draw_text(
        &self,
        page: &Page,
        by_address: &HashMap<(usize, usize), &TranslationUnit>,
        offset_x: f32,
        warnings: &mut Vec<OverflowWarning>,
    ) -> Result<Vec<Operation>, RenderError> {
        let font = self.fitter.font();
        let mut operations = Vec::new();

        for block in page.text_blocks() {
            let unit = unit_for(block, by_address)?;
            let fit = self.fitter.fit(unit.output_text(), block.bbox.width, block.bbox.height, block.font_size);
            if fit.lines.is_empty() {
                continue;
            }
            if fit.truncated {
                warn!(
                    "Text overflows its box on page {} (block {}); truncated at {:.1}pt",
                    block.page_index, block.reading_order, fit.font_size
                );
                warnings.push(OverflowWarning {
                    page_index: block.page_index,
                    reading_order: block.reading_order,
                    font_size: fit.font_size,
                    detail: format!(
                        "{} of the translated text's lines fit a {:.1}x{:.1} box",
                        fit.lines.len(),
                        block.bbox.width,
                        block.bbox.height
                    ),
                });
            }

            let color = &block.color;
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new(
                "Tf",
                vec![Object::Name(FONT_RESOURCE.as_bytes().to_vec()), Object::Real(fit.font_size)],
            ));
            operations.push(Operation::new(
                "rg",
                vec![Object::Real(color.r), Object::Real(color.g), Object::Real(color.b)],
            ));
            let baseline = block.bbox.y + font.ascent() * fit.font_size;
            let advance = fit.font_size * self.fitter.line_spacing();
            for (i, line) in fit.lines.iter().enumerate() {
                let y = page.height - (baseline + i as f32 * advance);
                operations.push(Operation::new(
                    "Tm",
                    vec![
                        1.into(),
                        0.into(),
                        0.into(),
                        1.into(),
                        Object::Real(block.bbox.x + offset_x),
                        Object::Real(y),
                    ],
                ));
                operations.push(Operation::new("Tj", vec![text_operand(font, line)]));
            }
            operations.push(Operation::new("ET", vec![]));
        }
        Ok(operations)
    }
}

fn unit_for<'a>(
    block: &TextBlock,
    by_address: &HashMap<(usize, usize), &'a TranslationUnit>,
) -> Result<&'a TranslationUnit, RenderError> {
    by_address
        .get(&(block.page_index, block.reading_order))
        .copied()
        .ok_or_else(|| {
            RenderError::Layout(format!(
                "no translation unit for block {} on page {}",
                block.reading_order, block.page_index
            ))
        })
}

fn text_operand(font: &RenderFont, line: &str) -> Object {
    let format = match font {
        RenderFont::Helvetica => StringFormat::Literal,
        RenderFont::TrueType(_) => StringFormat::Hexadecimal,
    };
    Object::String(font.encode(line), format)
}

/// The source's title, author and similar entries, with our producer and date
fn document_info(source: Option<&SourcePdf>) -> Dictionary {
    let mut info = Dictionary::new();
    if let Some(source) = source {
        let doc = source.document.as_ref();
        if let Some(dict) = doc.trailer.get(b"Info").ok().and_then(|o| resolve_dict(doc, o)) {
            for key in INFO_KEYS {
                if let Some(value @ Object::String(..)) = dict.get(key.as_bytes()).ok().and_then(|v| resolve(doc, v)) {
                    info.set(key, value.clone());
                }
            }
        }
    }
    info.set("Producer", Object::string_literal(PRODUCER));
    info.set(
        "ModDate",
        Object::string_literal(Utc::now().format("D:%Y%m%d%H%M%SZ").to_string()),
    );
    info
}

/// Source page without its text, under the translation
fn draw_background() -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        Operation::new("Do", vec![Object::Name(ORIGINAL_RESOURCE.as_bytes().to_vec())]),
        Operation::new("Q", vec![]),
    ]
}

/// Source page on the left half, then the seam line
fn draw_original(width: f32, height: f32) -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        Operation::new("Do", vec![Object::Name(ORIGINAL_RESOURCE.as_bytes().to_vec())]),
        Operation::new("Q", vec![]),
        Operation::new("q", vec![]),
        Operation::new("G", vec![Object::Real(SEPARATOR_GRAY)]),
        Operation::new("w", vec![Object::Real(0.5)]),
        Operation::new("m", vec![Object::Real(width), 0.into()]),
        Operation::new("l", vec![Object::Real(width), Object::Real(height)]),
        Operation::new("S", vec![]),
        Operation::new("Q", vec![]),
    ]
}
