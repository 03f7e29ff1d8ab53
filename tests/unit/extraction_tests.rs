/*!
 * Tests for content extraction and the content model
 */

use folio::document::{BoundingBox, Color, TextBlock, assign_reading_order};
use folio::errors::{ErrorCategory, ExtractError};
use folio::extraction::{ExtractionSettings, Extractor};

use crate::common::{PdfBuilder, TextLine};

fn block_at(x: f32, y: f32, text: &str) -> TextBlock {
    TextBlock {
        page_index: 0,
        bbox: BoundingBox::new(x, y, 100.0, 12.0),
        reading_order: 0,
        font_family: "Helvetica".to_string(),
        font_size: 12.0,
        color: Color::BLACK,
        text: text.to_string(),
    }
}

/// Test that blocks whose centers are within the row threshold read left to right
#[test]
fn test_assign_reading_order_withSlightlyOffsetRow_shouldReadLeftToRight() {
    let mut blocks = vec![block_at(300.0, 101.5, "second"), block_at(72.0, 100.0, "first"), block_at(72.0, 200.0, "third")];
    assign_reading_order(&mut blocks, 3.0);

    let texts: Vec<&str> = blocks.iter().map(|b| b.text.as_str()).collect();
    assert_eq!(texts, vec!["first", "second", "third"]);
    let orders: Vec<usize> = blocks.iter().map(|b| b.reading_order).collect();
    assert_eq!(orders, vec![0, 1, 2]);
}

/// Test that a tighter threshold splits the same blocks into two rows
#[test]
fn test_assign_reading_order_withTightThreshold_shouldSplitRows() {
    let mut blocks = vec![block_at(300.0, 101.5, "upper right?"), block_at(72.0, 100.0, "upper left")];
    assign_reading_order(&mut blocks, 1.0);
    assert_eq!(blocks[0].text, "upper left");
    assert_eq!(blocks[1].text, "upper right?");
}

/// Test a two-page document end to end
#[test]
fn test_extract_withTwoPages_shouldKeepPageOrder() {
    let bytes = PdfBuilder::new()
        .single_line_page("Introduction")
        .single_line_page("Conclusion")
        .build();
    let document = Extractor::default().extract(&bytes).unwrap();

    assert_eq!(document.page_count(), 2);
    let texts: Vec<(usize, &str)> = document.text_blocks().map(|b| (b.page_index, b.text.as_str())).collect();
    assert_eq!(texts, vec![(0, "Introduction"), (1, "Conclusion")]);
    assert!(document.source.is_some());
}

/// Test that lines close together merge into one paragraph block
#[test]
fn test_extract_withAdjacentLines_shouldMergeParagraph() {
    let bytes = PdfBuilder::new()
        .page(vec![
            TextLine::new(72.0, 700.0, 12.0, "The quick brown fox"),
            TextLine::new(72.0, 686.0, 12.0, "jumps over the lazy dog."),
            TextLine::new(72.0, 500.0, 12.0, "A separate paragraph."),
        ])
        .build();
    let document = Extractor::new(ExtractionSettings::default()).extract(&bytes).unwrap();

    let texts: Vec<&str> = document.text_blocks().map(|b| b.text.as_str()).collect();
    assert_eq!(texts, vec!["The quick brown fox jumps over the lazy dog.", "A separate paragraph."]);
}

/// Test document statistics
#[test]
fn test_statistics_shouldCountBlocksAndWords() {
    let bytes = PdfBuilder::new()
        .page(vec![TextLine::new(72.0, 700.0, 12.0, "Hello world"), TextLine::new(72.0, 400.0, 12.0, "Again")])
        .build();
    let stats = Extractor::default().extract(&bytes).unwrap().statistics();

    assert_eq!(stats.page_count, 1);
    assert_eq!(stats.text_block_count, 2);
    assert_eq!(stats.image_count, 0);
    assert_eq!(stats.total_words, 3);
    assert_eq!(stats.fonts.get("Helvetica"), Some(&2));
}

/// Test an encrypted document
#[test]
fn test_extract_withEncryptedDocument_shouldBeUnsupported() {
    let bytes = PdfBuilder::new().single_line_page("Secret").encrypted().build();
    let err = Extractor::default().extract(&bytes).unwrap_err();
    assert!(matches!(err, ExtractError::Unsupported(_)));
    assert_eq!(err.category(), ErrorCategory::Unsupported);
}

/// Test that a page merely mentioning the encryption key is still read
#[test]
fn test_extract_withEncryptNameInText_shouldSucceed() {
    let bytes = PdfBuilder::new().single_line_page("Remove /Encrypt first").build();
    let document = Extractor::default().extract(&bytes).unwrap();
    let texts: Vec<&str> = document.text_blocks().map(|b| b.text.as_str()).collect();
    assert_eq!(texts, vec!["Remove /Encrypt first"]);
}

/// Test truncated input
#[test]
fn test_extract_withTruncatedFile_shouldBeCorrupt() {
    let bytes = PdfBuilder::new().single_line_page("Cut short").build();
    let err = Extractor::default().extract(&bytes[..40]).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::CorruptInput);
}
