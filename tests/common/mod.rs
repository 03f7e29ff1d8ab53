/*!
 * Common test utilities for the folio test suite
 */

use anyhow::Result;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Object, Stream};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

use folio::app_config::Config;
use folio::jobs::{JobId, JobStatusReport};
use folio::JobOrchestrator;

/// Route library logs to the test output when RUST_LOG is set
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Configuration with millisecond backoff so retry tests stay fast
pub fn fast_config() -> Config {
    let mut config = Config::default();
    config.source_language = "en".to_string();
    config.target_language = "fr".to_string();
    config.batch.backoff_base_ms = 1;
    config
}

/// A line of Helvetica text placed at a PDF (bottom-left origin) baseline
#[derive(Debug, Clone)]
pub struct TextLine {
    pub x: f32,
    pub baseline: f32,
    pub size: f32,
    pub text: String,
}

impl TextLine {
    pub fn new(x: f32, baseline: f32, size: f32, text: impl Into<String>) -> Self {
        Self { x, baseline, size, text: text.into() }
    }
}

/// Builds small in-memory PDFs: US Letter pages with Helvetica text lines
#[derive(Debug, Default)]
pub struct PdfBuilder {
    pages: Vec<Vec<TextLine>>,
    encrypted: bool,
}

impl PdfBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, lines: Vec<TextLine>) -> Self {
        self.pages.push(lines);
        self
    }

    /// One page holding a single 12pt line at the top left
    pub fn single_line_page(self, text: &str) -> Self {
        self.page(vec![TextLine::new(72.0, 700.0, 12.0, text)])
    }

    /// Mark the trailer as encrypted
    pub fn encrypted(mut self) -> Self {
        self.encrypted = true;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });

        let mut kids = Vec::new();
        for lines in self.pages {
            let mut operations = Vec::new();
            for line in lines {
                operations.push(Operation::new("BT", vec![]));
                operations.push(Operation::new("Tf", vec!["F1".into(), Object::Real(line.size)]));
                operations.push(Operation::new("Td", vec![Object::Real(line.x), Object::Real(line.baseline)]));
                operations.push(Operation::new("Tj", vec![Object::string_literal(line.text.as_str())]));
                operations.push(Operation::new("ET", vec![]));
            }
            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
                "Contents" => content_id,
            });
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! { "Type" => "Pages", "Kids" => kids, "Count" => count }),
        );
        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog_id);
        if self.encrypted {
            let encrypt_id = doc.add_object(dictionary! {
                "Filter" => "Standard",
                "V" => 1,
                "R" => 2,
            });
            doc.trailer.set("Encrypt", encrypt_id);
        }

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }
}

/// Wait for a job to finish, failing the test after `timeout`
pub async fn wait_for_job(orchestrator: &JobOrchestrator, id: &JobId, timeout: Duration) -> JobStatusReport {
    tokio::time::timeout(timeout, orchestrator.wait(id))
        .await
        .expect("job did not finish in time")
        .expect("job is unknown")
}
