/*!
 * End-to-end tests of the job pipeline: submit, extract, translate,
 * reconstruct, and observe the status as a poller would
 */

use std::sync::Arc;
use std::time::Duration;

use folio::app_config::{Config, RenderMode};
use folio::errors::ErrorCategory;
use folio::extraction::Extractor;
use folio::fonts::RenderFont;
use folio::jobs::{JobOrchestrator, JobRequest, JobStatus};
use folio::providers::mock::MockBackend;
use folio::terminology::{Terminology, TerminologyEntry};

use crate::common::{self, PdfBuilder, TextLine, fast_config, wait_for_job};

const TIMEOUT: Duration = Duration::from_secs(30);

fn orchestrator(config: Config, backend: &MockBackend) -> JobOrchestrator {
    JobOrchestrator::new(config, Arc::new(backend.clone()), RenderFont::Helvetica)
}

fn output_texts(bytes: &[u8]) -> Vec<String> {
    Extractor::default()
        .extract(bytes)
        .unwrap()
        .text_blocks()
        .map(|b| b.text.clone())
        .collect()
}

/// Test a two-page document through the whole pipeline
#[tokio::test]
async fn test_job_withTwoPages_shouldCompleteWithTranslatedOutput() {
    common::init_logging();
    let backend = MockBackend::working();
    let orchestrator = orchestrator(fast_config(), &backend);
    let source = PdfBuilder::new()
        .single_line_page("Chapter one")
        .single_line_page("Chapter two")
        .build();

    let id = orchestrator.submit(JobRequest::new(source)).unwrap();
    let report = wait_for_job(&orchestrator, &id, TIMEOUT).await;

    assert_eq!(report.status, JobStatus::Completed, "{:?}", report.error);
    assert_eq!(report.progress, 100);
    assert!(report.output_available);
    assert!(report.warnings.is_empty());
    assert!(report.started_at.is_some() && report.finished_at.is_some());

    let output = orchestrator.output(&id).unwrap();
    assert_eq!(output_texts(&output), vec!["[fr] Chapter one", "[fr] Chapter two"]);
    assert_eq!(Extractor::default().extract(&output).unwrap().page_count(), 2);
    orchestrator.shutdown().await;
}

/// Test that a backend failing on every block fails the job
#[tokio::test]
async fn test_job_withFailingBackend_shouldExceedFailureThreshold() {
    let backend = MockBackend::failing();
    let orchestrator = orchestrator(fast_config(), &backend);
    let lines = (0..10)
        .map(|i| TextLine::new(72.0, 740.0 - i as f32 * 60.0, 12.0, format!("Block number {}", i)))
        .collect();
    let source = PdfBuilder::new().page(lines).build();

    let id = orchestrator.submit(JobRequest::new(source)).unwrap();
    let report = wait_for_job(&orchestrator, &id, TIMEOUT).await;

    assert_eq!(report.status, JobStatus::Failed);
    let failure = report.error.unwrap();
    assert_eq!(failure.category, ErrorCategory::JobFailureThresholdExceeded);
    assert!(failure.detail.contains("10 of 10"), "{}", failure.detail);
    assert!(!report.output_available);
    assert!(orchestrator.output(&id).is_none());
    orchestrator.shutdown().await;
}

/// Test that text too long for its box completes with an overflow warning
#[tokio::test]
async fn test_job_withOversizedTranslation_shouldWarnAndComplete() {
    let backend = MockBackend::working().with_custom_response(|_, _| {
        "a considerably longer translation that can never fit inside such a narrow box".to_string()
    });
    let orchestrator = orchestrator(fast_config(), &backend);
    let source = PdfBuilder::new().single_line_page("Hi").build();

    let id = orchestrator.submit(JobRequest::new(source)).unwrap();
    let report = wait_for_job(&orchestrator, &id, TIMEOUT).await;

    assert_eq!(report.status, JobStatus::Completed, "{:?}", report.error);
    assert_eq!(report.warnings.len(), 1);
    let warning = &report.warnings[0];
    assert_eq!(warning.category, ErrorCategory::RenderOverflow);
    assert_eq!((warning.page, warning.block), (Some(0), Some(0)));
    orchestrator.shutdown().await;
}

/// Test that terminology wins over the model output
#[tokio::test]
async fn test_job_withTerminology_shouldUseRequiredTranslation() {
    let backend = MockBackend::working().with_custom_response(|text, _| text.to_string());
    let orchestrator = orchestrator(fast_config(), &backend);
    let source = PdfBuilder::new().single_line_page("The cloud is fast").build();
    let terminology = Terminology::new(vec![TerminologyEntry::new("cloud", "nuage")]);

    let id = orchestrator
        .submit(JobRequest::new(source).with_terminology(terminology))
        .unwrap();
    let report = wait_for_job(&orchestrator, &id, TIMEOUT).await;

    assert_eq!(report.status, JobStatus::Completed, "{:?}", report.error);
    let output = orchestrator.output(&id).unwrap();
    assert_eq!(output_texts(&output), vec!["The nuage is fast"]);
    orchestrator.shutdown().await;
}

/// Test that a subscriber never sees status or progress go backwards
#[tokio::test]
async fn test_job_statusUpdates_shouldBeMonotonic() {
    let backend = MockBackend::staggered(vec![5, 1, 3]);
    let mut config = fast_config();
    config.batch.max_batch_size = 1;
    let orchestrator = orchestrator(config, &backend);
    let lines = (0..6)
        .map(|i| TextLine::new(72.0, 740.0 - i as f32 * 80.0, 12.0, format!("Paragraph {}", i)))
        .collect();
    let source = PdfBuilder::new().page(lines).single_line_page("Last page").build();

    let id = orchestrator.submit(JobRequest::new(source)).unwrap();
    let mut updates = orchestrator.subscribe(&id).unwrap();
    let mut seen = vec![updates.borrow_and_update().clone()];
    let collect = async {
        while updates.changed().await.is_ok() {
            let report = updates.borrow_and_update().clone();
            let done = report.is_terminal();
            seen.push(report);
            if done {
                break;
            }
        }
    };
    tokio::time::timeout(TIMEOUT, collect).await.unwrap();

    let last = seen.last().unwrap();
    assert_eq!(last.status, JobStatus::Completed, "{:?}", last.error);
    for pair in seen.windows(2) {
        assert!(pair[1].status >= pair[0].status, "{} after {}", pair[1].status, pair[0].status);
        assert!(pair[1].progress >= pair[0].progress, "{} after {}", pair[1].progress, pair[0].progress);
    }
    orchestrator.shutdown().await;
}

/// Test cancelling a running job
#[tokio::test]
async fn test_job_whenCancelled_shouldFailAsCancelled() {
    let backend = MockBackend::slow(300);
    let mut config = fast_config();
    config.batch.max_batch_size = 1;
    let orchestrator = orchestrator(config, &backend);
    let lines = (0..4)
        .map(|i| TextLine::new(72.0, 740.0 - i as f32 * 100.0, 12.0, format!("Slow block {}", i)))
        .collect();
    let source = PdfBuilder::new().page(lines).build();

    let id = orchestrator.submit(JobRequest::new(source)).unwrap();
    assert!(orchestrator.cancel(&id));
    let report = wait_for_job(&orchestrator, &id, TIMEOUT).await;

    assert_eq!(report.status, JobStatus::Failed);
    assert_eq!(report.error.unwrap().category, ErrorCategory::Cancelled);
    assert!(orchestrator.output(&id).is_none());
    assert!(!orchestrator.cancel(&id));
    assert!(backend.call_count() <= 1);
    orchestrator.shutdown().await;
}

/// Test an encrypted source
#[tokio::test]
async fn test_job_withEncryptedSource_shouldFailAsUnsupported() {
    let backend = MockBackend::working();
    let orchestrator = orchestrator(fast_config(), &backend);
    let source = PdfBuilder::new().single_line_page("Secret").encrypted().build();

    let id = orchestrator.submit(JobRequest::new(source)).unwrap();
    let report = wait_for_job(&orchestrator, &id, TIMEOUT).await;

    assert_eq!(report.status, JobStatus::Failed);
    assert_eq!(report.error.unwrap().category, ErrorCategory::Unsupported);
    assert_eq!(backend.call_count(), 0);
    orchestrator.shutdown().await;
}

/// Test that `auto` asks the backend for the source language
#[tokio::test]
async fn test_job_withAutoSource_shouldTranslateFromDetectedLanguage() {
    let backend = MockBackend::working().with_detected_language("de");
    let orchestrator = orchestrator(fast_config(), &backend);
    let source = PdfBuilder::new().single_line_page("Guten Tag").build();

    let id = orchestrator
        .submit(JobRequest::new(source).with_languages("auto", "en"))
        .unwrap();
    let report = wait_for_job(&orchestrator, &id, TIMEOUT).await;

    assert_eq!(report.status, JobStatus::Completed, "{:?}", report.error);
    let calls = backend.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].source_language, "de");
    assert_eq!(calls[0].target_language, "en");
    orchestrator.shutdown().await;
}

/// Test side-by-side output through a job
#[tokio::test]
async fn test_job_withSideBySide_shouldDoublePageWidth() {
    let backend = MockBackend::working();
    let orchestrator = orchestrator(fast_config(), &backend);
    let source = PdfBuilder::new().single_line_page("Original").build();

    let id = orchestrator
        .submit(JobRequest::new(source).with_render_mode(RenderMode::SideBySide))
        .unwrap();
    let report = wait_for_job(&orchestrator, &id, TIMEOUT).await;

    assert_eq!(report.status, JobStatus::Completed, "{:?}", report.error);
    let document = Extractor::default().extract(&orchestrator.output(&id).unwrap()).unwrap();
    assert_eq!(document.pages[0].width, 1224.0);
    orchestrator.shutdown().await;
}

/// Test that finished jobs disappear once their retention has passed
#[tokio::test]
async fn test_purge_expired_withZeroTtl_shouldForgetFinishedJobs() {
    let backend = MockBackend::working();
    let mut config = fast_config();
    config.jobs.retention_ttl_secs = 0;
    config.jobs.sweep_interval_secs = 3600;
    let orchestrator = orchestrator(config, &backend);

    let id = orchestrator
        .submit(JobRequest::new(PdfBuilder::new().single_line_page("Short lived").build()))
        .unwrap();
    let report = wait_for_job(&orchestrator, &id, TIMEOUT).await;
    assert_eq!(report.status, JobStatus::Completed);

    assert_eq!(orchestrator.purge_expired(), 1);
    assert!(orchestrator.get_status(&id).is_none());
    assert!(orchestrator.output(&id).is_none());
    orchestrator.shutdown().await;
}

/// Test that with one worker a second job waits in the queue
#[tokio::test]
async fn test_job_withSingleWorker_shouldQueueSecondJob() {
    let backend = MockBackend::slow(200);
    let mut config = fast_config();
    config.jobs.worker_count = 1;
    config.batch.max_batch_size = 1;
    config.batch.max_concurrent_batches = 1;
    let orchestrator = orchestrator(config, &backend);
    let lines = (0..3)
        .map(|i| TextLine::new(72.0, 740.0 - i as f32 * 100.0, 12.0, format!("First job block {}", i)))
        .collect();

    let first = orchestrator.submit(JobRequest::new(PdfBuilder::new().page(lines).build())).unwrap();
    let second = orchestrator
        .submit(JobRequest::new(PdfBuilder::new().single_line_page("Second job").build()))
        .unwrap();

    let mut updates = orchestrator.subscribe(&first).unwrap();
    let translating = async {
        loop {
            if updates.borrow_and_update().status >= JobStatus::Translating {
                break;
            }
            if updates.changed().await.is_err() {
                break;
            }
        }
    };
    tokio::time::timeout(TIMEOUT, translating).await.unwrap();
    assert_eq!(orchestrator.get_status(&first).unwrap().status, JobStatus::Translating);
    let waiting = orchestrator.get_status(&second).unwrap();
    assert_eq!(waiting.status, JobStatus::Queued);
    assert!(waiting.started_at.is_none());

    let first_report = wait_for_job(&orchestrator, &first, TIMEOUT).await;
    let second_report = wait_for_job(&orchestrator, &second, TIMEOUT).await;
    assert_eq!(first_report.status, JobStatus::Completed, "{:?}", first_report.error);
    assert_eq!(second_report.status, JobStatus::Completed, "{:?}", second_report.error);
    assert!(second_report.started_at.unwrap() >= first_report.finished_at.unwrap());
    orchestrator.shutdown().await;
}

/// Test cancelling a job after some batches were committed
#[tokio::test]
async fn test_job_whenCancelledMidTranslation_shouldStopSendingBatches() {
    let backend = MockBackend::slow(150);
    let mut config = fast_config();
    config.batch.max_batch_size = 1;
    config.batch.max_concurrent_batches = 1;
    let orchestrator = orchestrator(config, &backend);
    let total_batches = 6;
    let lines = (0..total_batches)
        .map(|i| TextLine::new(72.0, 740.0 - i as f32 * 100.0, 12.0, format!("Long block {}", i)))
        .collect();
    let source = PdfBuilder::new().page(lines).build();

    let id = orchestrator.submit(JobRequest::new(source)).unwrap();
    let mut updates = orchestrator.subscribe(&id).unwrap();
    let partway = async {
        loop {
            let report = updates.borrow_and_update().clone();
            if report.is_terminal() || (report.status == JobStatus::Translating && report.progress > 25) {
                return report;
            }
            if updates.changed().await.is_err() {
                return report;
            }
        }
    };
    let seen = tokio::time::timeout(TIMEOUT, partway).await.unwrap();
    assert_eq!(seen.status, JobStatus::Translating);
    assert!(orchestrator.cancel(&id));

    let report = wait_for_job(&orchestrator, &id, TIMEOUT).await;
    assert_eq!(report.status, JobStatus::Failed);
    assert_eq!(report.error.unwrap().category, ErrorCategory::Cancelled);
    assert!(!report.output_available);
    assert!(orchestrator.output(&id).is_none());
    assert!(backend.call_count() < total_batches, "{} calls", backend.call_count());
    orchestrator.shutdown().await;
}

/// Test that a header repeated on every page is sent to the backend once
#[tokio::test]
async fn test_job_withRepeatedHeader_shouldTranslateItOnce() {
    let backend = MockBackend::working();
    let mut config = fast_config();
    config.batch.max_batch_size = 20;
    let orchestrator = orchestrator(config, &backend);
    let mut builder = PdfBuilder::new();
    for page in 0..3 {
        builder = builder.page(vec![
            TextLine::new(72.0, 750.0, 10.0, "Annual report"),
            TextLine::new(72.0, 600.0, 12.0, format!("Body of page {}", page)),
        ]);
    }

    let id = orchestrator.submit(JobRequest::new(builder.build())).unwrap();
    let report = wait_for_job(&orchestrator, &id, TIMEOUT).await;

    assert_eq!(report.status, JobStatus::Completed, "{:?}", report.error);
    let calls = backend.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].texts.iter().filter(|t| t.as_str() == "Annual report").count(), 1);
    assert_eq!(calls[0].texts.len(), 4);
    let texts = output_texts(&orchestrator.output(&id).unwrap());
    assert_eq!(texts.iter().filter(|t| t.as_str() == "[fr] Annual report").count(), 3);
    orchestrator.shutdown().await;
}
