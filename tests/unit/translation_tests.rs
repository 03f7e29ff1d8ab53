/*!
 * Tests for batch translation, context windows and unit partitioning
 */

use std::sync::{Arc, Mutex};

use folio::app_config::BatchConfig;
use folio::errors::{ErrorCategory, TranslationError};
use folio::jobs::CancellationToken;
use folio::providers::mock::MockBackend;
use folio::terminology::Terminology;
use folio::translation::{BatchTranslator, ContextPair, ContextWindow, TranslationUnit, partition};

fn batch_config(max_batch_size: usize, max_concurrent_batches: usize) -> BatchConfig {
    BatchConfig {
        max_batch_size,
        context_pairs: 5,
        max_concurrent_batches,
        max_attempts: 3,
        backoff_base_ms: 1,
        failure_ceiling: 0.2,
    }
}

fn units(count: usize) -> Vec<TranslationUnit> {
    (0..count).map(|i| TranslationUnit::new(i / 4, i % 4, format!("sentence {}", i))).collect()
}

fn translator(backend: &MockBackend, config: BatchConfig) -> BatchTranslator {
    BatchTranslator::new(Arc::new(backend.clone()), config, Arc::new(Terminology::default()))
}

/// Test that batches finishing out of order are still committed in order
#[tokio::test]
async fn test_translate_withStaggeredBackend_shouldPreserveOrder() {
    crate::common::init_logging();
    let backend = MockBackend::staggered(vec![50, 1, 20]);
    let committed = Mutex::new(Vec::new());

    let outcome = translator(&backend, batch_config(1, 3))
        .translate(units(6), "en", "fr", &CancellationToken::new(), |done, total| {
            committed.lock().unwrap().push((done, total));
        })
        .await
        .unwrap();

    let targets: Vec<String> = outcome.units.iter().map(|u| u.target.clone().unwrap()).collect();
    let expected: Vec<String> = (0..6).map(|i| format!("[fr] sentence {}", i)).collect();
    assert_eq!(targets, expected);
    let addresses: Vec<(usize, usize)> = outcome.units.iter().map(|u| u.address()).collect();
    assert_eq!(addresses, vec![(0, 0), (0, 1), (0, 2), (0, 3), (1, 0), (1, 1)]);
    assert_eq!(
        committed.into_inner().unwrap(),
        vec![(1, 6), (2, 6), (3, 6), (4, 6), (5, 6), (6, 6)]
    );
}

/// Test that a backend failing every call fails the job once the ceiling is passed
#[tokio::test]
async fn test_translate_withFailingBackend_shouldExceedThreshold() {
    let backend = MockBackend::failing();
    let result = translator(&backend, batch_config(5, 2))
        .translate(units(10), "en", "fr", &CancellationToken::new(), |_, _| {})
        .await;

    match result {
        Err(error @ TranslationError::ThresholdExceeded { .. }) => {
            assert_eq!(error.category(), ErrorCategory::JobFailureThresholdExceeded);
            if let TranslationError::ThresholdExceeded { failed, total, .. } = error {
                assert_eq!((failed, total), (10, 10));
            }
        }
        other => panic!("expected threshold failure, got {:?}", other.map(|o| o.failed_units)),
    }
    // Two batches, three attempts each
    assert_eq!(backend.call_count(), 6);
}

/// Test that transient failures are retried until the batch succeeds
#[tokio::test]
async fn test_translate_withIntermittentBackend_shouldRecover() {
    let backend = MockBackend::intermittent(3);
    let outcome = translator(&backend, batch_config(2, 1))
        .translate(units(8), "en", "fr", &CancellationToken::new(), |_, _| {})
        .await
        .unwrap();

    assert_eq!(outcome.failed_units, 0);
    assert!(outcome.exhausted.is_empty());
    assert!(outcome.units.iter().all(|u| !u.failed && u.target.as_deref().unwrap().starts_with("[fr] ")));
    // The third call fails and is retried once
    assert_eq!(backend.call_count(), 5);
}

/// Test that a response with the wrong number of items falls back to source text
#[tokio::test]
async fn test_translate_withMisalignedResponse_shouldFallBackWithinCeiling() {
    let backend = MockBackend::misaligned();
    let mut config = batch_config(3, 1);
    config.failure_ceiling = 1.0;
    let outcome = translator(&backend, config)
        .translate(units(3), "en", "fr", &CancellationToken::new(), |_, _| {})
        .await
        .unwrap();

    assert_eq!(outcome.failed_units, 3);
    assert_eq!(outcome.exhausted.len(), 1);
    assert_eq!(outcome.exhausted[0].addresses, vec![(0, 0), (0, 1), (0, 2)]);
    assert!(outcome.units.iter().all(|u| u.failed && u.target.as_deref() == Some(u.source.as_str())));
    assert_eq!(backend.call_count(), 3);
}

/// Test that every batch call carries both language codes
#[tokio::test]
async fn test_translate_shouldForwardLanguages() {
    let backend = MockBackend::working();
    translator(&backend, batch_config(4, 1))
        .translate(units(5), "de", "ja", &CancellationToken::new(), |_, _| {})
        .await
        .unwrap();

    let calls = backend.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|c| c.source_language == "de" && c.target_language == "ja"));
    assert_eq!(calls[1].texts, vec!["sentence 4".to_string()]);
}

/// Test partitioning into fixed-size batches
#[test]
fn test_partition_shouldCoverEveryIndexOnce() {
    assert_eq!(partition(0, 10), Vec::<std::ops::Range<usize>>::new());
    assert_eq!(partition(7, 3), vec![0..3, 3..6, 6..7]);
    assert_eq!(partition(4, 4), vec![0..4]);
}

/// Test that the context window keeps only the newest pairs
#[test]
fn test_context_window_shouldEvictOldestPairs() {
    let mut window = ContextWindow::new(2);
    window.extend(vec![ContextPair::new("a", "A"), ContextPair::new("b", "B"), ContextPair::new("c", "C")]);
    let sources: Vec<String> = window.snapshot().into_iter().map(|p| p.source).collect();
    assert_eq!(sources, vec!["b", "c"]);
    assert_eq!(window.len(), 2);
    assert_eq!(window.capacity(), 2);
}
