/*!
 * Translation units and their partition into batches.
 */

use serde::{Deserialize, Serialize};

use crate::document::{Document, TextBlock};

/// One text block's worth of translation work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationUnit {
    /// Page of the source block
    pub page_index: usize,
    /// Reading-order index of the source block on its page
    pub reading_order: usize,
    /// Source-language text
    pub source: String,
    /// Translated text, `None` until the unit is processed
    pub target: Option<String>,
    /// Set when every attempt failed and `target` is the source fallback
    pub failed: bool,
}

impl TranslationUnit {
    pub fn new(page_index: usize, reading_order: usize, source: impl Into<String>) -> Self {
        Self {
            page_index,
            reading_order,
            source: source.into(),
            target: None,
            failed: false,
        }
    }

    pub fn from_block(block: &TextBlock) -> Self {
        Self::new(block.page_index, block.reading_order, block.text.clone())
    }

    /// (page, reading order) address of the unit's block
    pub fn address(&self) -> (usize, usize) {
        (self.page_index, self.reading_order)
    }

    pub fn is_blank(&self) -> bool {
        self.source.trim().is_empty()
    }

    /// Text to render: the translation, or the source when there is none
    pub fn output_text(&self) -> &str {
        self.target.as_deref().unwrap_or(&self.source)
    }

    pub(crate) fn fill(&mut self, target: String) {
        self.target = Some(target);
        self.failed = false;
    }

    pub(crate) fn fall_back(&mut self) {
        self.target = Some(self.source.clone());
        self.failed = true;
    }
}

/// Units for every text block of the document, in page then reading order
pub fn units_for_document(document: &Document) -> Vec<TranslationUnit> {
    document.text_blocks().map(TranslationUnit::from_block).collect()
}

/// Split `len` items into consecutive index ranges of at most `max_batch_size`
pub fn partition(len: usize, max_batch_size: usize) -> Vec<std::ops::Range<usize>> {
    let size = max_batch_size.max(1);
    (0..len).step_by(size).map(|start| start..(start + size).min(len)).collect()
}
