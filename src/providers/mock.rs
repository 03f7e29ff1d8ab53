/*!
 * Mock translation backend for testing.
 *
 * - `MockBackend::working()` - Always succeeds with tagged text
 * - `MockBackend::failing()` - Always fails with a transient error
 * - `MockBackend::intermittent(n)` - Fails every nth call
 * - `MockBackend::staggered(..)` - Succeeds after a per-call delay, so later
 *   batches can finish before earlier ones
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::TranslationBackend;
use crate::errors::ProviderError;
use crate::translation::window::ContextPair;

/// Behavior mode for the mock backend
#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds with `[target] text`
    Working,
    /// Fails intermittently (every Nth call)
    Intermittent { fail_every: usize },
    /// Always fails with a retryable 503
    Failing,
    /// Always fails with a non-retryable authentication error
    Unauthorized,
    /// Answers with one translation too few
    Misaligned,
    /// Succeeds after sleeping `delays_ms[call % len]`
    Staggered { delays_ms: Vec<u64> },
    /// Succeeds after a fixed delay
    Slow { delay_ms: u64 },
}

/// What one `translate_batch` call received
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub texts: Vec<String>,
    pub context: Vec<ContextPair>,
    pub source_language: String,
    pub target_language: String,
}

/// Mock backend for testing translation behavior
#[derive(Debug, Clone)]
pub struct MockBackend {
    behavior: MockBehavior,
    call_count: Arc<AtomicUsize>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    detected_language: String,
    /// Replaces the default `[target] text` output
    custom_response: Option<fn(&str, &str) -> String>,
}

impl MockBackend {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            call_count: Arc::new(AtomicUsize::new(0)),
            calls: Arc::new(Mutex::new(Vec::new())),
            detected_language: "en".to_string(),
            custom_response: None,
        }
    }

    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every: fail_every.max(1) })
    }

    pub fn unauthorized() -> Self {
        Self::new(MockBehavior::Unauthorized)
    }

    pub fn misaligned() -> Self {
        Self::new(MockBehavior::Misaligned)
    }

    pub fn staggered(delays_ms: Vec<u64>) -> Self {
        Self::new(MockBehavior::Staggered { delays_ms })
    }

    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Language reported by `detect_language`
    pub fn with_detected_language(mut self, code: impl Into<String>) -> Self {
        self.detected_language = code.into();
        self
    }

    /// Set a custom `(text, target_language) -> translation` generator
    pub fn with_custom_response(mut self, generator: fn(&str, &str) -> String) -> Self {
        self.custom_response = Some(generator);
        self
    }

    /// Number of `translate_batch` calls so far, failed ones included
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    fn translate_text(&self, text: &str, target_language: &str) -> String {
        match self.custom_response {
            Some(generator) => generator(text, target_language),
            None => format!("[{}] {}", target_language, text),
        }
    }
}

#[async_trait]
impl TranslationBackend for MockBackend {
    async fn translate_batch(
        &self,
        texts: &[String],
        source_language: &str,
        target_language: &str,
        context: &[ContextPair],
    ) -> Result<Vec<String>, ProviderError> {
        let count = self.call_count.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().push(RecordedCall {
            texts: texts.to_vec(),
            context: context.to_vec(),
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
        });

        let translate_all = || -> Vec<String> { texts.iter().map(|t| self.translate_text(t, target_language)).collect() };
        match &self.behavior {
            MockBehavior::Working => Ok(translate_all()),
            MockBehavior::Intermittent { fail_every } => {
                if count % fail_every == fail_every - 1 {
                    Err(ProviderError::ApiError {
                        message: format!("Simulated intermittent failure (request #{})", count + 1),
                        status_code: 503,
                    })
                } else {
                    Ok(translate_all())
                }
            }
            MockBehavior::Failing => Err(ProviderError::ApiError {
                message: "Simulated provider failure".to_string(),
                status_code: 503,
            }),
            MockBehavior::Unauthorized => Err(ProviderError::AuthenticationError("invalid API key".to_string())),
            MockBehavior::Misaligned => {
                let mut output = translate_all();
                output.pop();
                crate::translation::protocol::parse_batch_response(
                    &serde_json::json!({
                        "translations": output
                            .iter()
                            .enumerate()
                            .map(|(id, text)| serde_json::json!({"id": id, "text": text}))
                            .collect::<Vec<_>>()
                    })
                    .to_string(),
                    texts.len(),
                )
            }
            MockBehavior::Staggered { delays_ms } => {
                if let Some(delay) = delays_ms.get(count % delays_ms.len().max(1)) {
                    tokio::time::sleep(Duration::from_millis(*delay)).await;
                }
                Ok(translate_all())
            }
            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
                Ok(translate_all())
            }
        }
    }

    async fn detect_language(&self, _sample: &str) -> Result<String, ProviderError> {
        match self.behavior {
            MockBehavior::Failing | MockBehavior::Unauthorized => Err(ProviderError::ConnectionError(
                "Simulated detection failure".to_string(),
            )),
            _ => Ok(self.detected_language.clone()),
        }
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        match self.behavior {
            MockBehavior::Failing => Err(ProviderError::ConnectionError("Simulated connection failure".to_string())),
            MockBehavior::Unauthorized => Err(ProviderError::AuthenticationError("invalid API key".to_string())),
            _ => Ok(()),
        }
    }
}
