/*!
 * Tests for text fitting and document reconstruction
 */

use folio::app_config::{LayoutConfig, RenderMode};
use folio::document::ColorSpace;
use folio::extraction::Extractor;
use folio::fonts::RenderFont;
use folio::jobs::CancellationToken;
use folio::layout::{Reconstructor, TextFitter};
use folio::translation::{TranslationUnit, units_for_document};

use crate::common::{PdfBuilder, TextLine};

/// Test that no fitted size ever exceeds the original size
#[test]
fn test_fit_acrossSizesAndWidths_shouldNeverGrowText() {
    let fitter = TextFitter::new(RenderFont::Helvetica, &LayoutConfig::default());
    let text = "Les réseaux de neurones apprennent des représentations hiérarchiques";
    for original in [4.0_f32, 6.0, 9.0, 12.0, 18.0, 30.0] {
        for width in [20.0_f32, 80.0, 200.0, 600.0] {
            for lines in [1usize, 2, 5] {
                let height = fitter.block_height(lines, original);
                let fit = fitter.fit(text, width, height, original);
                assert!(fit.font_size <= original, "{} > {}", fit.font_size, original);
                assert!(fit.font_size >= fitter.floor(original));
                if !fit.truncated {
                    assert!(fitter.block_height(fit.lines.len(), fit.font_size) <= height + 0.01);
                }
            }
        }
    }
}

/// Test that a text three times wider than its box wraps into the box
#[test]
fn test_fit_withTripleWidth_shouldWrapWithinHeight() {
    let config = LayoutConfig::default();
    let fitter = TextFitter::new(RenderFont::Helvetica, &config);
    let text = "this translation turned out three times as wide as the source";
    let width = RenderFont::Helvetica.text_width(text, 12.0) / 3.0;
    let height = fitter.block_height(4, fitter.floor(12.0));

    let fit = fitter.fit(text, width, height, 12.0);
    assert!(!fit.truncated);
    assert!(fit.lines.len() > 1);
    assert!(fitter.block_height(fit.lines.len(), fit.font_size) <= height + 0.01);
    assert_eq!(fit.lines.join(" "), text);
}

/// Test that overflow marks the last line
#[test]
fn test_fit_withOverflow_shouldEndWithMarker() {
    let mut config = LayoutConfig::default();
    config.overflow_marker = "...".to_string();
    let fitter = TextFitter::new(RenderFont::Helvetica, &config);
    let fit = fitter.fit("far too many words for a tiny single line box on the page", 50.0, 8.0, 8.0);
    assert!(fit.truncated);
    assert!(fit.lines.last().unwrap().ends_with("..."));
}

fn translate_all(document: &folio::Document, prefix: &str) -> Vec<TranslationUnit> {
    units_for_document(document)
        .into_iter()
        .map(|mut unit| {
            unit.target = Some(format!("{} {}", prefix, unit.source));
            unit
        })
        .collect()
}

/// Test side-by-side output doubles the page width and keeps the original text
#[test]
fn test_reconstruct_sideBySide_shouldDoubleWidthAndShowBothTexts() {
    let bytes = PdfBuilder::new()
        .page(vec![TextLine::new(72.0, 700.0, 12.0, "Hello")])
        .build();
    let document = Extractor::default().extract(&bytes).unwrap();
    let units = translate_all(&document, "Bonjour");

    let output = Reconstructor::new(RenderFont::Helvetica, &LayoutConfig::default())
        .with_mode(RenderMode::SideBySide)
        .reconstruct(&document, &units, &CancellationToken::new(), |_, _| {})
        .unwrap();

    let reread = Extractor::default().extract(&output.bytes).unwrap();
    assert_eq!(reread.page_count(), 1);
    assert_eq!(reread.pages[0].width, 1224.0);
    let texts: Vec<&str> = reread.text_blocks().map(|b| b.text.as_str()).collect();
    assert!(texts.contains(&"Hello"), "{:?}", texts);
    assert!(texts.contains(&"Bonjour Hello"), "{:?}", texts);
    let translated = reread.text_blocks().find(|b| b.text == "Bonjour Hello").unwrap();
    assert!(translated.bbox.x >= 612.0);
}

/// Test that replacement output keeps one page per source page
#[test]
fn test_reconstruct_replacement_shouldKeepPageCountAndProgress() {
    let bytes = PdfBuilder::new()
        .single_line_page("First page")
        .single_line_page("Second page")
        .single_line_page("Third page")
        .build();
    let document = Extractor::default().extract(&bytes).unwrap();
    let units = translate_all(&document, "FR");

    let mut progress = Vec::new();
    let output = Reconstructor::new(RenderFont::Helvetica, &LayoutConfig::default())
        .reconstruct(&document, &units, &CancellationToken::new(), |done, total| progress.push((done, total)))
        .unwrap();

    assert_eq!(progress, vec![(1, 3), (2, 3), (3, 3)]);
    let reread = Extractor::default().extract(&output.bytes).unwrap();
    let texts: Vec<&str> = reread.text_blocks().map(|b| b.text.as_str()).collect();
    assert_eq!(texts, vec!["FR First page", "FR Second page", "FR Third page"]);
    for (source, rendered) in document.text_blocks().zip(reread.text_blocks()) {
        assert!(rendered.font_size <= source.font_size + 0.001);
    }
}

/// Test the gray color space helper used for separation images
#[test]
fn test_color_space_components_shouldMatchDeviceSpaces() {
    assert_eq!(ColorSpace::DeviceGray.components(), 1);
    assert_eq!(ColorSpace::DeviceRgb.components(), 3);
    assert_eq!(ColorSpace::DeviceCmyk.components(), 4);
}
