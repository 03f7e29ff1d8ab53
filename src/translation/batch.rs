/*!
 * Context-aware batch translation.
 *
 * Units with identical source text are translated once per job: running
 * headers, footers and repeated labels share one request slot and every
 * copy receives the same output. The distinct texts are cut into fixed-size batches that are dispatched with bounded
 * concurrency. Each batch sees the context window as it was when the batch
 * was dispatched; results go through a reassembly buffer so that they are
 * committed to the units and to the window strictly in batch order.
 */

use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use parking_lot::Mutex;
use rand::Rng;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use super::units::{partition, TranslationUnit};
use super::window::{ContextPair, ContextWindow};
use crate::app_config::BatchConfig;
use crate::errors::{ProviderError, TranslationError};
use crate::jobs::CancellationToken;
use crate::providers::TranslationBackend;
use crate::terminology::Terminology;

/// A batch that ran out of attempts and fell back to source text
#[derive(Debug, Clone)]
pub struct ExhaustedBatch {
    pub batch_index: usize,
    /// (page, reading order) of every unit in the batch
    pub addresses: Vec<(usize, usize)>,
    pub error: ProviderError,
}

/// Translated units plus what went wrong along the way
#[derive(Debug, Clone)]
pub struct TranslationOutcome {
    /// Units in input order, every target filled
    pub units: Vec<TranslationUnit>,
    pub failed_units: usize,
    pub exhausted: Vec<ExhaustedBatch>,
}

enum BatchResult {
    Translated(Vec<String>),
    Exhausted(ProviderError),
    /// Not sent because cancellation was observed first
    Skipped,
}

struct PreparedBatch {
    index: usize,
    /// Per text, the indices of every unit carrying it
    groups: Vec<Vec<usize>>,
    texts: Vec<String>,
}

impl PreparedBatch {
    fn unit_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.groups.iter().flatten().copied()
    }

    fn unit_count(&self) -> usize {
        self.groups.iter().map(Vec::len).sum()
    }
}

/// Group the units at `pending` by source text, in order of first occurrence
fn group_by_source(units: &[TranslationUnit], pending: &[usize]) -> Vec<Vec<usize>> {
    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut by_text: HashMap<&str, usize> = HashMap::new();
    for &index in pending {
        let text = units[index].source.as_str();
        match by_text.get(text) {
            Some(&group) => groups[group].push(index),
            None => {
                by_text.insert(text, groups.len());
                groups.push(vec![index]);
            }
        }
    }
    groups
}

/// Batch translator for the units of one job
pub struct BatchTranslator {
    backend: Arc<dyn TranslationBackend>,
    config: BatchConfig,
    terminology: Arc<Terminology>,
}

impl BatchTranslator {
    pub fn new(backend: Arc<dyn TranslationBackend>, config: BatchConfig, terminology: Arc<Terminology>) -> Self {
        Self {
            backend,
            config,
            terminology,
        }
    }

    /// Fill every unit's target, in input order
    ///
    /// `on_batch(committed, total)` is called each time a batch is committed.
    pub async fn translate<F>(
        &self,
        mut units: Vec<TranslationUnit>,
        source_language: &str,
        target_language: &str,
        cancel: &CancellationToken,
        on_batch: F,
    ) -> Result<TranslationOutcome, TranslationError>
    where
        F: Fn(usize, usize) + Send + Sync,
    {
        let total_units = units.len();
        let mut pending = Vec::with_capacity(total_units);
        for (index, unit) in units.iter_mut().enumerate() {
            if unit.is_blank() {
                unit.fill(unit.source.clone());
            } else {
                pending.push(index);
            }
        }

        let groups = group_by_source(&units, &pending);
        let batches: Vec<PreparedBatch> = partition(groups.len(), self.config.max_batch_size)
            .into_iter()
            .enumerate()
            .map(|(index, range)| {
                let groups = groups[range].to_vec();
                let texts = groups.iter().map(|group| units[group[0]].source.clone()).collect();
                PreparedBatch { index, groups, texts }
            })
            .collect();
        let total_batches = batches.len();
        info!(
            "Translating {} units ({} blank, {} repeated) in {} batches, {} at a time",
            total_units,
            total_units - pending.len(),
            pending.len() - groups.len(),
            total_batches,
            self.config.max_concurrent_batches.max(1)
        );

        let window = Arc::new(Mutex::new(ContextWindow::new(self.config.context_pairs)));
        let mut results = stream::iter(batches)
            .map(|batch| {
                let window = Arc::clone(&window);
                async move {
                    if cancel.is_cancelled() {
                        return (batch, BatchResult::Skipped);
                    }
                    let context = window.lock().snapshot();
                    let result = self
                        .translate_with_retry(batch.index, &batch.texts, &context, source_language, target_language, cancel)
                        .await;
                    (batch, result)
                }
            })
            .buffer_unordered(self.config.max_concurrent_batches.max(1));

        let mut reassembly: BTreeMap<usize, (PreparedBatch, BatchResult)> = BTreeMap::new();
        let mut next_to_commit = 0;
        let mut failed_units = 0;
        let mut exhausted = Vec::new();

        while let Some((batch, result)) = results.next().await {
            reassembly.insert(batch.index, (batch, result));
            while let Some((batch, result)) = reassembly.remove(&next_to_commit) {
                next_to_commit += 1;
                if cancel.is_cancelled() {
                    continue;
                }
                match result {
                    BatchResult::Translated(outputs) => {
                        let outputs: Vec<String> = outputs.iter().map(|o| self.terminology.apply(o)).collect();
                        window.lock().extend(
                            batch
                                .texts
                                .into_iter()
                                .zip(outputs.iter())
                                .map(|(source, target)| ContextPair::new(source, target.clone())),
                        );
                        for (group, output) in batch.groups.iter().zip(outputs) {
                            for &unit_index in group {
                                units[unit_index].fill(output.clone());
                            }
                        }
                    }
                    BatchResult::Exhausted(error) => {
                        warn!(
                            "Batch {} failed after retries, keeping source text for {} units: {}",
                            batch.index + 1,
                            batch.unit_count(),
                            error
                        );
                        let mut addresses: Vec<(usize, usize)> = Vec::with_capacity(batch.unit_count());
                        for unit_index in batch.unit_indices() {
                            units[unit_index].fall_back();
                            addresses.push(units[unit_index].address());
                        }
                        addresses.sort_unstable();
                        failed_units += addresses.len();
                        exhausted.push(ExhaustedBatch {
                            batch_index: batch.index,
                            addresses,
                            error,
                        });
                    }
                    BatchResult::Skipped => continue,
                }
                on_batch(next_to_commit, total_batches);
            }
        }
        drop(results);

        if cancel.is_cancelled() {
            info!("Translation cancelled after {} of {} batches", next_to_commit, total_batches);
            return Err(TranslationError::Cancelled);
        }

        let ceiling = self.config.failure_ceiling;
        if total_units > 0 && failed_units as f64 / total_units as f64 > ceiling {
            return Err(TranslationError::ThresholdExceeded {
                failed: failed_units,
                total: total_units,
                ceiling,
            });
        }

        Ok(TranslationOutcome {
            units,
            failed_units,
            exhausted,
        })
    }

    async fn translate_with_retry(
        &self,
        batch_index: usize,
        texts: &[String],
        context: &[ContextPair],
        source_language: &str,
        target_language: &str,
        cancel: &CancellationToken,
    ) -> BatchResult {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let error = match self
                .backend
                .translate_batch(texts, source_language, target_language, context)
                .await
            {
                Ok(outputs) if outputs.len() == texts.len() => {
                    debug!("Batch {} translated on attempt {}", batch_index + 1, attempt);
                    return BatchResult::Translated(outputs);
                }
                Ok(outputs) => ProviderError::MalformedResponse(format!(
                    "expected {} translations, got {}",
                    texts.len(),
                    outputs.len()
                )),
                Err(error) => error,
            };

            if !error.is_transient() || attempt >= max_attempts {
                return BatchResult::Exhausted(error);
            }
            if cancel.is_cancelled() {
                return BatchResult::Skipped;
            }

            let delay = self.backoff_delay(attempt);
            warn!(
                "Batch {} attempt {}/{} failed ({}), retrying in {:?}",
                batch_index + 1,
                attempt,
                max_attempts,
                error,
                delay
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// `base * 2^(attempt-1)` plus up to a quarter of `base` of jitter
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.config.backoff_base_ms;
        let exponential = base.saturating_mul(1u64 << (attempt - 1).min(16));
        let jitter = if base >= 4 { rand::rng().random_range(0..=base / 4) } else { 0 };
        Duration::from_millis(exponential + jitter)
    }
}
