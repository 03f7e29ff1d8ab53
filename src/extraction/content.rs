/*!
 * Content stream interpreter.
 *
 * Walks the operators of a page (and of the form XObjects it paints),
 * tracking the graphics and text state, and records every shown string as a
 * [`RawRun`] and every painted image as a [`PlacedImage`]. Output positions
 * are in default user space, y growing upwards.
 */

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, warn};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId};

use super::font_info::PdfFont;
use super::images::parse_raster;
use super::objects::{as_f32, decoded_stream, name_of, number_array, resolve, resolve_dict};
use crate::document::{Color, RasterImage};
use crate::errors::ExtractError;

const MAX_FORM_DEPTH: usize = 8;

/// TJ adjustments wider than this (in thousandths of an em) read as a space
const TJ_SPACE_THRESHOLD: f32 = 200.0;

/// Affine transform `[a b c d e f]`, applied to row vectors
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix { a: 1.0, b: 0.0, c: 0.0, d: 1.0, e: 0.0, f: 0.0 };

    pub fn new(values: &[f32]) -> Option<Self> {
        match values {
            [a, b, c, d, e, f] => Some(Self { a: *a, b: *b, c: *c, d: *d, e: *e, f: *f }),
            _ => None,
        }
    }

    pub fn translate(tx: f32, ty: f32) -> Self {
        Self { e: tx, f: ty, ..Self::IDENTITY }
    }

    /// `self` followed by `other`
    pub fn then(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (self.a * x + self.c * y + self.e, self.b * x + self.d * y + self.f)
    }

    /// Length of the transformed vertical unit vector
    pub fn vertical_scale(&self) -> f32 {
        (self.c * self.c + self.d * self.d).sqrt()
    }
}

/// One shown string
#[derive(Debug, Clone, PartialEq)]
pub struct RawRun {
    pub x0: f32,
    pub x1: f32,
    pub baseline: f32,
    pub size: f32,
    pub family: String,
    pub color: Color,
    pub text: String,
}

/// One painted image with its user-space corners
#[derive(Debug, Clone)]
pub struct PlacedImage {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
    pub image: RasterImage,
}

#[derive(Debug, Default)]
pub struct PageContent {
    pub runs: Vec<RawRun>,
    pub images: Vec<PlacedImage>,
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    fill: Color,
    font: Arc<PdfFont>,
    font_size: f32,
    char_spacing: f32,
    word_spacing: f32,
    horizontal_scale: f32,
    leading: f32,
    rise: f32,
}

impl GraphicsState {
    fn new(ctm: Matrix) -> Self {
        Self {
            ctm,
            fill: Color::BLACK,
            font: Arc::new(PdfFont::fallback()),
            font_size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

/// Interprets the content of one page
pub struct ContentInterpreter<'a> {
    doc: &'a Document,
    fonts: HashMap<ObjectId, Arc<PdfFont>>,
    output: PageContent,
}

fn operand(op: &Operation, doc: &Document, index: usize) -> f32 {
    op.operands.get(index).and_then(|o| as_f32(doc, o)).unwrap_or(0.0)
}

fn numbers(op: &Operation, doc: &Document) -> Vec<f32> {
    op.operands.iter().filter_map(|o| as_f32(doc, o)).collect()
}

fn color_from_components(values: &[f32]) -> Option<Color> {
    match values {
        [g] => Some(Color::gray(*g)),
        [r, g, b] => Some(Color::rgb(*r, *g, *b)),
        [c, m, y, k] => Some(Color::cmyk(*c, *m, *y, *k)),
        _ => None,
    }
}

impl<'a> ContentInterpreter<'a> {
    pub fn new(doc: &'a Document) -> Self {
        Self {
            doc,
            fonts: HashMap::new(),
            output: PageContent::default(),
        }
    }

    pub fn finish(self) -> PageContent {
        self.output
    }

    /// Interpret a content stream under the given resources and initial CTM
    pub fn run(&mut self, content: &[u8], resources: Option<&'a Dictionary>, ctm: Matrix) -> Result<(), ExtractError> {
        let content = Content::decode(content)
            .map_err(|e| ExtractError::CorruptInput(format!("undecodable content stream: {}", e)))?;
        self.interpret(&content.operations, resources, ctm, 0);
        Ok(())
    }

    fn interpret(&mut self, operations: &[Operation], resources: Option<&'a Dictionary>, ctm: Matrix, depth: usize) {
        let doc = self.doc;
        let mut state = GraphicsState::new(ctm);
        let mut stack: Vec<GraphicsState> = Vec::new();
        let mut text_matrix = Matrix::IDENTITY;
        let mut line_matrix = Matrix::IDENTITY;

        for op in operations {
            match op.operator.as_str() {
                "q" => stack.push(state.clone()),
                "Q" => {
                    if let Some(saved) = stack.pop() {
                        state = saved;
                    }
                }
                "cm" => {
                    if let Some(m) = Matrix::new(&numbers(op, doc)) {
                        state.ctm = m.then(&state.ctm);
                    }
                }
                "g" | "rg" | "k" | "sc" | "scn" => {
                    if let Some(color) = color_from_components(&numbers(op, doc)) {
                        state.fill = color;
                    }
                }
                "cs" => state.fill = Color::BLACK,
                "BT" => {
                    text_matrix = Matrix::IDENTITY;
                    line_matrix = Matrix::IDENTITY;
                }
                "ET" => {}
                "Tf" => {
                    if let Some(name) = op.operands.first().and_then(|o| name_of(doc, o)) {
                        state.font = self.font(resources, &name);
                    }
                    state.font_size = operand(op, doc, 1);
                }
                "Tc" => state.char_spacing = operand(op, doc, 0),
                "Tw" => state.word_spacing = operand(op, doc, 0),
                "Tz" => state.horizontal_scale = operand(op, doc, 0) / 100.0,
                "TL" => state.leading = operand(op, doc, 0),
                "Ts" => state.rise = operand(op, doc, 0),
                "Td" => {
                    line_matrix = Matrix::translate(operand(op, doc, 0), operand(op, doc, 1)).then(&line_matrix);
                    text_matrix = line_matrix;
                }
                "TD" => {
                    state.leading = -operand(op, doc, 1);
                    line_matrix = Matrix::translate(operand(op, doc, 0), operand(op, doc, 1)).then(&line_matrix);
                    text_matrix = line_matrix;
                }
                "Tm" => {
                    if let Some(m) = Matrix::new(&numbers(op, doc)) {
                        line_matrix = m;
                        text_matrix = m;
                    }
                }
                "T*" => {
                    line_matrix = Matrix::translate(0.0, -state.leading).then(&line_matrix);
                    text_matrix = line_matrix;
                }
                "Tj" => self.show(&state, &mut text_matrix, &op.operands[..op.operands.len().min(1)]),
                "TJ" => {
                    if let Some(Object::Array(items)) = op.operands.first() {
                        self.show(&state, &mut text_matrix, items);
                    }
                }
                "'" | "\"" => {
                    if op.operator == "\"" {
                        state.word_spacing = operand(op, doc, 0);
                        state.char_spacing = operand(op, doc, 1);
                    }
                    line_matrix = Matrix::translate(0.0, -state.leading).then(&line_matrix);
                    text_matrix = line_matrix;
                    let shown = op.operands.len().saturating_sub(1);
                    self.show(&state, &mut text_matrix, &op.operands[shown..]);
                }
                "Do" => {
                    if let Some(name) = op.operands.first().and_then(|o| name_of(doc, o)) {
                        self.paint_xobject(resources, &name, &state, depth);
                    }
                }
                _ => {}
            }
        }
    }

    fn font(&mut self, resources: Option<&'a Dictionary>, name: &str) -> Arc<PdfFont> {
        let doc = self.doc;
        let entry = resources
            .and_then(|r| r.get(b"Font").ok())
            .and_then(|fonts| resolve_dict(doc, fonts))
            .and_then(|fonts| fonts.get(name.as_bytes()).ok());
        let Some(entry) = entry else {
            debug!("Font /{} not found in resources, using Helvetica metrics", name);
            return Arc::new(PdfFont::fallback());
        };
        if let Object::Reference(id) = entry {
            if let Some(cached) = self.fonts.get(id) {
                return Arc::clone(cached);
            }
        }
        let font = match resolve_dict(doc, entry) {
            Some(dict) => Arc::new(PdfFont::from_dict(doc, dict)),
            None => Arc::new(PdfFont::fallback()),
        };
        if let Object::Reference(id) = entry {
            self.fonts.insert(*id, Arc::clone(&font));
        }
        font
    }

    /// Show strings and TJ adjustments as one run, advancing the text matrix
    fn show(&mut self, state: &GraphicsState, text_matrix: &mut Matrix, items: &[Object]) {
        let size = state.font_size;
        let scale = state.horizontal_scale;
        let to_user = text_matrix.then(&state.ctm);
        let start = to_user.apply(0.0, state.rise);
        let mut advance = 0.0f32;
        let mut text = String::new();

        for item in items {
            match item {
                Object::String(bytes, _) => {
                    for glyph in state.font.decode(bytes) {
                        let spacing = state.char_spacing + if glyph.is_word_space { state.word_spacing } else { 0.0 };
                        advance += (glyph.width / 1000.0 * size + spacing) * scale;
                        text.push_str(&glyph.text);
                    }
                }
                Object::Integer(_) | Object::Real(_) => {
                    let adjust = as_f32(self.doc, item).unwrap_or(0.0);
                    advance -= adjust / 1000.0 * size * scale;
                    if adjust <= -TJ_SPACE_THRESHOLD && !text.is_empty() && !text.ends_with(char::is_whitespace) {
                        text.push(' ');
                    }
                }
                _ => {}
            }
        }

        let end = to_user.apply(advance, state.rise);
        *text_matrix = Matrix::translate(advance, 0.0).then(text_matrix);

        let effective_size = size.abs() * to_user.vertical_scale();
        if text.trim().is_empty() || effective_size <= 0.0 {
            return;
        }
        self.output.runs.push(RawRun {
            x0: start.0.min(end.0),
            x1: start.0.max(end.0),
            baseline: start.1,
            size: effective_size,
            family: state.font.family.clone(),
            color: state.fill,
            text,
        });
    }

    fn paint_xobject(&mut self, resources: Option<&'a Dictionary>, name: &str, state: &GraphicsState, depth: usize) {
        let doc = self.doc;
        let Some(stream) = resources
            .and_then(|r| r.get(b"XObject").ok())
            .and_then(|x| resolve_dict(doc, x))
            .and_then(|x| x.get(name.as_bytes()).ok())
            .and_then(|o| resolve(doc, o))
            .and_then(|o| o.as_stream().ok())
        else {
            debug!("XObject /{} not found in resources", name);
            return;
        };

        let subtype = stream.dict.get(b"Subtype").ok().and_then(|o| name_of(doc, o)).unwrap_or_default();
        match subtype.as_str() {
            "Image" => {
                let Some(image) = parse_raster(doc, stream) else {
                    warn!("Skipping image /{} with an unreadable dictionary", name);
                    return;
                };
                let corners = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)].map(|(x, y)| state.ctm.apply(x, y));
                let xs = corners.map(|c| c.0);
                let ys = corners.map(|c| c.1);
                self.output.images.push(PlacedImage {
                    x0: xs.iter().copied().fold(f32::INFINITY, f32::min),
                    y0: ys.iter().copied().fold(f32::INFINITY, f32::min),
                    x1: xs.iter().copied().fold(f32::NEG_INFINITY, f32::max),
                    y1: ys.iter().copied().fold(f32::NEG_INFINITY, f32::max),
                    image,
                });
            }
            "Form" => {
                if depth >= MAX_FORM_DEPTH {
                    warn!("Form XObject /{} nested too deeply, skipping", name);
                    return;
                }
                let matrix = stream
                    .dict
                    .get(b"Matrix")
                    .ok()
                    .and_then(|m| number_array(doc, m))
                    .and_then(|m| Matrix::new(&m))
                    .unwrap_or(Matrix::IDENTITY);
                let form_resources = stream
                    .dict
                    .get(b"Resources")
                    .ok()
                    .and_then(|r| resolve_dict(doc, r))
                    .or(resources);
                let Some(bytes) = decoded_stream(stream) else {
                    warn!("Form XObject /{} has an undecodable stream", name);
                    return;
                };
                match Content::decode(&bytes) {
                    Ok(content) => {
                        self.interpret(&content.operations, form_resources, matrix.then(&state.ctm), depth + 1)
                    }
                    Err(e) => warn!("Form XObject /{} has undecodable content: {}", name, e),
                }
            }
            other => debug!("Ignoring XObject /{} of subtype {}", name, other),
        }
    }
}
