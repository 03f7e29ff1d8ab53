/*!
 * Content model extraction.
 *
 * [`Extractor::open`] validates and parses the source bytes and returns a
 * [`PageStream`], a lazy iterator that builds one [`Page`] per call to
 * `next`. [`Extractor::extract`] drains the stream into a [`Document`].
 */

pub mod content;
pub mod font_info;
pub mod images;
pub mod merge;
pub mod objects;

use std::sync::Arc;

use log::{debug, info, warn};
use lopdf::{Dictionary, ObjectId};

use crate::app_config::LayoutConfig;
use crate::document::{
    assign_reading_order, BoundingBox, ContentBlock, Document, ImageBlock, Page, SourcePdf, TextBlock,
};
use crate::errors::ExtractError;
use content::{ContentInterpreter, Matrix};
use merge::{merge_runs, MergeThresholds, PlacedRun};
use objects::{inherited, number_array, resolve_dict};

/// US Letter, used when a page has no usable MediaBox
const DEFAULT_PAGE_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// How far into the file the `%PDF-` marker may appear
const HEADER_SEARCH_WINDOW: usize = 1024;

/// Grouping thresholds used while extracting
#[derive(Debug, Clone, Copy)]
pub struct ExtractionSettings {
    pub row_gap_threshold: f32,
    pub line_merge_gap: f32,
    pub word_gap: f32,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self::from(&LayoutConfig::default())
    }
}

impl From<&LayoutConfig> for ExtractionSettings {
    fn from(config: &LayoutConfig) -> Self {
        Self {
            row_gap_threshold: config.row_gap_threshold,
            line_merge_gap: config.line_merge_gap,
            word_gap: config.word_gap,
        }
    }
}

/// Builds the content model from PDF bytes
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    settings: ExtractionSettings,
}

impl Extractor {
    pub fn new(settings: ExtractionSettings) -> Self {
        Self { settings }
    }

    /// Parse the document and prepare page-by-page extraction
    pub fn open(&self, source: &[u8]) -> Result<PageStream, ExtractError> {
        let window = &source[..source.len().min(HEADER_SEARCH_WINDOW)];
        if !window.windows(5).any(|w| w == b"%PDF-") {
            return Err(ExtractError::CorruptInput("missing %PDF header".to_string()));
        }

        let document = lopdf::Document::load_mem(source)?;
        // the parser keeps the trailer entry even when an empty password decrypts the objects
        if document.trailer.get(b"Encrypt").is_ok() {
            return Err(ExtractError::Unsupported("document is encrypted".to_string()));
        }

        let page_ids: Vec<ObjectId> = document.get_pages().into_values().collect();
        if page_ids.is_empty() {
            return Err(ExtractError::CorruptInput("document has no pages".to_string()));
        }
        info!("Opened document with {} page(s)", page_ids.len());

        Ok(PageStream {
            document: Arc::new(document),
            page_ids,
            next_page: 0,
            settings: self.settings,
        })
    }

    /// Extract every page eagerly
    pub fn extract(&self, source: &[u8]) -> Result<Document, ExtractError> {
        let mut stream = self.open(source)?;
        let mut pages = Vec::with_capacity(stream.page_count());
        for page in stream.by_ref() {
            pages.push(page?);
        }
        Ok(stream.into_document(pages))
    }
}

/// Lazy, finite, non-restartable sequence of extracted pages
pub struct PageStream {
    document: Arc<lopdf::Document>,
    page_ids: Vec<ObjectId>,
    next_page: usize,
    settings: ExtractionSettings,
}

impl PageStream {
    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// Assemble the pages produced by this stream into a document
    pub fn into_document(self, pages: Vec<Page>) -> Document {
        Document {
            pages,
            source: Some(SourcePdf {
                document: self.document,
                page_ids: self.page_ids,
            }),
        }
    }

    fn extract_page(&self, index: usize) -> Result<Page, ExtractError> {
        let doc = self.document.as_ref();
        let page_id = self.page_ids[index];
        let page_dict = doc
            .get_dictionary(page_id)
            .map_err(|e| ExtractError::CorruptInput(format!("page {}: {}", index + 1, e)))?;

        let [llx, lly, urx, ury] = page_box(doc, page_dict);
        let (width, height) = (urx - llx, ury - lly);
        let resources: Option<&Dictionary> = inherited(doc, page_dict, b"Resources").and_then(|r| resolve_dict(doc, r));

        let content = doc
            .get_page_content(page_id)
            .map_err(|e| ExtractError::CorruptInput(format!("page {}: unreadable content: {}", index + 1, e)))?;

        let mut interpreter = ContentInterpreter::new(doc);
        interpreter.run(&content, resources, Matrix::IDENTITY)?;
        let raw = interpreter.finish();

        let runs: Vec<PlacedRun> = raw
            .runs
            .into_iter()
            .map(|run| PlacedRun {
                x0: run.x0 - llx,
                x1: run.x1 - llx,
                baseline: ury - run.baseline,
                size: run.size,
                family: run.family,
                color: run.color,
                text: run.text,
            })
            .collect();

        let thresholds = MergeThresholds {
            word_gap: self.settings.word_gap,
            line_gap: self.settings.line_merge_gap,
        };
        let mut text_blocks: Vec<TextBlock> = merge_runs(runs, thresholds)
            .into_iter()
            .filter_map(|mut block| {
                block.page_index = index;
                block.bbox = block.bbox.clamp_to(width, height);
                (block.bbox.width > 0.0 && block.bbox.height > 0.0).then_some(block)
            })
            .collect();
        assign_reading_order(&mut text_blocks, self.settings.row_gap_threshold);

        let mut page = Page::new(index, width, height);
        page.blocks.extend(text_blocks.into_iter().map(ContentBlock::Text));

        let mut z_order = 0;
        for placed in raw.images {
            let bbox = BoundingBox::from_corners(placed.x0 - llx, ury - placed.y1, placed.x1 - llx, ury - placed.y0)
                .clamp_to(width, height);
            if bbox.width <= 0.0 || bbox.height <= 0.0 {
                debug!("Skipping image outside page {}", index + 1);
                continue;
            }
            page.blocks.push(ContentBlock::Image(ImageBlock {
                page_index: index,
                bbox,
                z_order,
                image: placed.image,
            }));
            z_order += 1;
        }

        debug!(
            "Page {}: {:.0}x{:.0}pt, {} text block(s), {} image(s)",
            index + 1,
            width,
            height,
            page.text_blocks().count(),
            z_order
        );
        Ok(page)
    }
}

impl Iterator for PageStream {
    type Item = Result<Page, ExtractError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_page >= self.page_ids.len() {
            return None;
        }
        let index = self.next_page;
        self.next_page += 1;
        Some(self.extract_page(index))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.page_ids.len() - self.next_page;
        (remaining, Some(remaining))
    }
}

fn page_box(doc: &lopdf::Document, page: &Dictionary) -> [f32; 4] {
    let values = inherited(doc, page, b"MediaBox").and_then(|o| number_array(doc, o));
    match values.as_deref() {
        Some([x0, y0, x1, y1]) if (x1 - x0).abs() > 0.0 && (y1 - y0).abs() > 0.0 => {
            [x0.min(*x1), y0.min(*y1), x0.max(*x1), y0.max(*y1)]
        }
        _ => {
            warn!("Page without a usable MediaBox, assuming US Letter");
            DEFAULT_PAGE_BOX
        }
    }
}
