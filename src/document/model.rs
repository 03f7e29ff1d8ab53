/*!
 * Content model produced by extraction and consumed by reconstruction.
 *
 * Coordinates are PDF points with the origin at the top-left corner of the
 * page and y growing downwards.
 */

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in page space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Build from two opposite corners in any order
    pub fn from_corners(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            x: x0.min(x1),
            y: y0.min(y1),
            width: (x1 - x0).abs(),
            height: (y1 - y0).abs(),
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center_x(&self) -> f32 {
        self.x + self.width / 2.0
    }

    pub fn center_y(&self) -> f32 {
        self.y + self.height / 2.0
    }

    /// Smallest box covering both
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox::from_corners(
            self.x.min(other.x),
            self.y.min(other.y),
            self.right().max(other.right()),
            self.bottom().max(other.bottom()),
        )
    }

    /// Intersect with the page rectangle `[0, width] x [0, height]`
    pub fn clamp_to(&self, page_width: f32, page_height: f32) -> BoundingBox {
        let x0 = self.x.clamp(0.0, page_width);
        let y0 = self.y.clamp(0.0, page_height);
        let x1 = self.right().clamp(0.0, page_width);
        let y1 = self.bottom().clamp(0.0, page_height);
        BoundingBox::from_corners(x0, y0, x1, y1)
    }

    pub fn is_within(&self, page_width: f32, page_height: f32) -> bool {
        self.x >= 0.0 && self.y >= 0.0 && self.right() <= page_width + f32::EPSILON && self.bottom() <= page_height + f32::EPSILON
    }

    /// Horizontal extent shared with another box
    pub fn horizontal_overlap(&self, other: &BoundingBox) -> f32 {
        (self.right().min(other.right()) - self.x.max(other.x)).max(0.0)
    }
}

/// RGB color with components in `0.0..=1.0`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color { r: 0.0, g: 0.0, b: 0.0 };
    pub const WHITE: Color = Color { r: 1.0, g: 1.0, b: 1.0 };

    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self {
            r: r.clamp(0.0, 1.0),
            g: g.clamp(0.0, 1.0),
            b: b.clamp(0.0, 1.0),
        }
    }

    pub fn gray(level: f32) -> Self {
        Self::rgb(level, level, level)
    }

    pub fn cmyk(c: f32, m: f32, y: f32, k: f32) -> Self {
        Self::rgb((1.0 - c) * (1.0 - k), (1.0 - m) * (1.0 - k), (1.0 - y) * (1.0 - k))
    }

    /// Colors compare equal for merging when every channel is within half a step of 8-bit
    pub fn approx_eq(&self, other: &Color) -> bool {
        const TOLERANCE: f32 = 0.5 / 255.0;
        (self.r - other.r).abs() <= TOLERANCE
            && (self.g - other.g).abs() <= TOLERANCE
            && (self.b - other.b).abs() <= TOLERANCE
    }
}

/// A run of source-language text with its styling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub page_index: usize,
    pub bbox: BoundingBox,
    pub reading_order: usize,
    pub font_family: String,
    pub font_size: f32,
    pub color: Color,
    pub text: String,
}

/// Color space of an embedded raster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColorSpace {
    DeviceGray,
    DeviceRgb,
    DeviceCmyk,
    Indexed {
        base: Box<ColorSpace>,
        hival: u8,
        lookup: Vec<u8>,
    },
}

impl ColorSpace {
    /// Components per pixel before indexing
    pub fn components(&self) -> usize {
        match self {
            Self::DeviceGray | Self::Indexed { .. } => 1,
            Self::DeviceRgb => 3,
            Self::DeviceCmyk => 4,
        }
    }
}

/// Everything needed to re-embed an image payload without decoding it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageEncoding {
    pub width: u32,
    pub height: u32,
    pub bits_per_component: u8,
    /// `None` for stencil masks
    pub color_space: Option<ColorSpace>,
    /// Filter names in application order, e.g. `DCTDecode`
    pub filters: Vec<String>,
    /// Integer decode parameters of the first filter
    pub decode_parms: BTreeMap<String, i64>,
    pub decode: Option<Vec<f32>>,
    pub image_mask: bool,
}

/// Raw, still-encoded image stream plus its optional soft mask
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    pub encoding: ImageEncoding,
    pub payload: Bytes,
    pub soft_mask: Option<Box<RasterImage>>,
}

/// An image placed on a page; never translated
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBlock {
    pub page_index: usize,
    pub bbox: BoundingBox,
    /// Paint order among the images of the page
    pub z_order: usize,
    pub image: RasterImage,
}

/// One extracted block
#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    Text(TextBlock),
    Image(ImageBlock),
}

impl ContentBlock {
    pub fn bbox(&self) -> &BoundingBox {
        match self {
            Self::Text(block) => &block.bbox,
            Self::Image(block) => &block.bbox,
        }
    }

    pub fn page_index(&self) -> usize {
        match self {
            Self::Text(block) => block.page_index,
            Self::Image(block) => block.page_index,
        }
    }
}

/// A page with its blocks: text in reading order, then images in paint order
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub index: usize,
    pub width: f32,
    pub height: f32,
    pub blocks: Vec<ContentBlock>,
}

impl Page {
    pub fn new(index: usize, width: f32, height: f32) -> Self {
        Self { index, width, height, blocks: Vec::new() }
    }

    pub fn text_blocks(&self) -> impl Iterator<Item = &TextBlock> {
        self.blocks.iter().filter_map(|b| match b {
            ContentBlock::Text(t) => Some(t),
            ContentBlock::Image(_) => None,
        })
    }

    pub fn images(&self) -> impl Iterator<Item = &ImageBlock> {
        self.blocks.iter().filter_map(|b| match b {
            ContentBlock::Image(i) => Some(i),
            ContentBlock::Text(_) => None,
        })
    }
}

/// The parsed source file, kept so the original page can be redrawn
#[derive(Clone)]
pub struct SourcePdf {
    pub document: Arc<lopdf::Document>,
    /// Object id of each page, indexed like [`Document::pages`]
    pub page_ids: Vec<lopdf::ObjectId>,
}

impl fmt::Debug for SourcePdf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourcePdf")
            .field("pages", &self.page_ids.len())
            .finish()
    }
}

/// Summary counts over a document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentStatistics {
    pub page_count: usize,
    pub text_block_count: usize,
    pub image_count: usize,
    pub total_chars: usize,
    pub total_words: usize,
    /// Font family to number of text blocks using it
    pub fonts: BTreeMap<String, usize>,
}

/// Ordered pages of a document
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub pages: Vec<Page>,
    pub source: Option<SourcePdf>,
}

impl Document {
    pub fn new(pages: Vec<Page>) -> Self {
        Self { pages, source: None }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// All text blocks of all pages, in page then reading order
    pub fn text_blocks(&self) -> impl Iterator<Item = &TextBlock> {
        self.pages.iter().flat_map(|p| p.text_blocks())
    }

    pub fn statistics(&self) -> DocumentStatistics {
        let mut stats = DocumentStatistics {
            page_count: self.pages.len(),
            ..Default::default()
        };
        for page in &self.pages {
            for block in &page.blocks {
                match block {
                    ContentBlock::Text(text) => {
                        stats.text_block_count += 1;
                        stats.total_chars += text.text.chars().count();
                        stats.total_words += text.text.split_whitespace().count();
                        *stats.fonts.entry(text.font_family.clone()).or_insert(0) += 1;
                    }
                    ContentBlock::Image(_) => stats.image_count += 1,
                }
            }
        }
        stats
    }
}
