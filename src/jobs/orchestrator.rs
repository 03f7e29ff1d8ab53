/*!
 * Job orchestrator: a bounded pool of workers running
 * Extract -> Translate -> Reconstruct for submitted documents.
 *
 * Must be created inside a Tokio runtime; it spawns the worker pool, the
 * status writer and the expiry sweeper on construction.
 */

use bytes::Bytes;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::cancellation::CancellationToken;
use super::registry::{JobRegistry, StatusEvent, StatusSender};
use super::state::{JobFailure, JobId, JobStatus, JobStatusReport, JobWarning};
use crate::app_config::{Config, RenderMode};
use crate::document::Document;
use crate::errors::{AppError, ErrorCategory, JobError, TranslationError};
use crate::extraction::{ExtractionSettings, Extractor};
use crate::fonts::RenderFont;
use crate::language_utils;
use crate::layout::Reconstructor;
use crate::providers::TranslationBackend;
use crate::terminology::Terminology;
use crate::translation::{units_for_document, BatchTranslator};

/// Language assumed when detection fails
const FALLBACK_SOURCE_LANGUAGE: &str = "en";
/// Characters of document text sent for language detection
const DETECTION_SAMPLE_CHARS: usize = 2000;

/// A document to translate plus per-job overrides
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub source: Bytes,
    /// Source language, `auto` to detect; config value when `None`
    pub source_language: Option<String>,
    pub target_language: Option<String>,
    pub terminology: Arc<Terminology>,
    pub render_mode: Option<RenderMode>,
}

impl JobRequest {
    pub fn new(source: impl Into<Bytes>) -> Self {
        Self {
            source: source.into(),
            source_language: None,
            target_language: None,
            terminology: Arc::new(Terminology::default()),
            render_mode: None,
        }
    }

    pub fn with_languages(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.source_language = Some(source.into());
        self.target_language = Some(target.into());
        self
    }

    pub fn with_terminology(mut self, terminology: Terminology) -> Self {
        self.terminology = Arc::new(terminology);
        self
    }

    pub fn with_render_mode(mut self, mode: RenderMode) -> Self {
        self.render_mode = Some(mode);
        self
    }
}

struct Ticket {
    id: JobId,
    request: JobRequest,
    cancel: CancellationToken,
}

/// State shared by every worker
struct Shared {
    config: Config,
    backend: Arc<dyn TranslationBackend>,
    font: RenderFont,
    registry: Arc<JobRegistry>,
}

/// Sends the events of one job
#[derive(Clone)]
struct JobReporter {
    id: JobId,
    events: StatusSender,
}

impl JobReporter {
    fn send(&self, event: StatusEvent) {
        if self.events.send(event).is_err() {
            debug!("Status writer gone, dropping event for job {}", self.id);
        }
    }

    fn stage(&self, status: JobStatus) {
        let (start, _) = status.progress_band();
        self.send(StatusEvent::Stage { id: self.id, status, progress: start });
    }

    fn progress(&self, status: JobStatus, done: usize, total: usize) {
        self.send(StatusEvent::Progress { id: self.id, progress: status.progress_at(done, total) });
    }

    fn warning(&self, warning: JobWarning) {
        self.send(StatusEvent::Warning { id: self.id, warning });
    }
}

pub struct JobOrchestrator {
    shared: Arc<Shared>,
    queue: Mutex<Option<mpsc::UnboundedSender<Ticket>>>,
    events: Mutex<Option<StatusSender>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl JobOrchestrator {
    pub fn new(config: Config, backend: Arc<dyn TranslationBackend>, font: RenderFont) -> Self {
        let registry = Arc::new(JobRegistry::new());
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let writer = JobRegistry::spawn_writer(Arc::clone(&registry), events_rx);

        let worker_count = config.jobs.worker_count.max(1);
        let ttl_secs = config.jobs.retention_ttl_secs;
        let sweep_every = Duration::from_secs(config.jobs.sweep_interval_secs.max(1));
        let shared = Arc::new(Shared {
            config,
            backend,
            font,
            registry: Arc::clone(&registry),
        });

        let (queue_tx, queue_rx) = mpsc::unbounded_channel::<Ticket>();
        let queue_rx = Arc::new(tokio::sync::Mutex::new(queue_rx));
        let workers = (0..worker_count)
            .map(|worker| {
                let shared = Arc::clone(&shared);
                let queue_rx = Arc::clone(&queue_rx);
                let events = events_tx.clone();
                tokio::spawn(async move {
                    loop {
                        let ticket = queue_rx.lock().await.recv().await;
                        match ticket {
                            Some(ticket) => run_job(&shared, ticket, events.clone()).await,
                            None => break,
                        }
                    }
                    debug!("Worker {} stopped", worker);
                })
            })
            .collect();

        let sweeper = tokio::spawn(async move {
            let mut interval = tokio::time::interval(sweep_every);
            loop {
                interval.tick().await;
                registry.purge_expired(ttl_secs);
            }
        });

        info!("Job orchestrator started with {} workers", worker_count);
        Self {
            shared,
            queue: Mutex::new(Some(queue_tx)),
            events: Mutex::new(Some(events_tx)),
            workers: Mutex::new(workers),
            writer: Mutex::new(Some(writer)),
            sweeper: Mutex::new(Some(sweeper)),
        }
    }

    /// Queue a document; it waits in Queued until a worker is free
    pub fn submit(&self, request: JobRequest) -> Result<JobId, AppError> {
        self.purge_expired();

        let id = JobId::new();
        let cancel = CancellationToken::new();
        let queue = self.queue.lock();
        let sender = queue
            .as_ref()
            .ok_or_else(|| AppError::Unknown("orchestrator is shut down".to_string()))?;
        self.shared.registry.insert(id, cancel.clone());
        sender
            .send(Ticket { id, request, cancel })
            .map_err(|_| AppError::Unknown("job queue closed".to_string()))?;
        info!("Job {} queued", id);
        Ok(id)
    }

    pub fn get_status(&self, id: &JobId) -> Option<JobStatusReport> {
        self.shared.registry.get(id)
    }

    /// Request cancellation; false when the job is unknown or already finished
    pub fn cancel(&self, id: &JobId) -> bool {
        match (self.shared.registry.get(id), self.shared.registry.cancel_token(id)) {
            (Some(report), Some(token)) if !report.is_terminal() => {
                info!("Cancelling job {}", id);
                token.cancel();
                true
            }
            _ => false,
        }
    }

    /// Output of a completed job
    pub fn output(&self, id: &JobId) -> Option<Bytes> {
        self.shared.registry.output(id)
    }

    pub fn subscribe(&self, id: &JobId) -> Option<watch::Receiver<JobStatusReport>> {
        self.shared.registry.subscribe(id)
    }

    pub fn purge_expired(&self) -> usize {
        self.shared.registry.purge_expired(self.shared.config.jobs.retention_ttl_secs)
    }

    /// Wait until the job is terminal and return its final report
    pub async fn wait(&self, id: &JobId) -> Option<JobStatusReport> {
        let mut updates = self.subscribe(id)?;
        loop {
            let report = updates.borrow_and_update().clone();
            if report.is_terminal() {
                return Some(report);
            }
            if updates.changed().await.is_err() {
                return self.get_status(id);
            }
        }
    }

    /// Stop accepting jobs, let queued and running jobs finish, stop background tasks
    pub async fn shutdown(&self) {
        self.queue.lock().take();
        let workers: Vec<JoinHandle<()>> = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            if let Err(e) = worker.await {
                error!("Worker task failed: {}", e);
            }
        }
        self.events.lock().take();
        let writer = self.writer.lock().take();
        if let Some(writer) = writer {
            if let Err(e) = writer.await {
                error!("Status writer failed: {}", e);
            }
        }
        if let Some(sweeper) = self.sweeper.lock().take() {
            sweeper.abort();
        }
        info!("Job orchestrator stopped");
    }
}

impl Drop for JobOrchestrator {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.lock().take() {
            sweeper.abort();
        }
    }
}

async fn run_job(shared: &Shared, ticket: Ticket, events: StatusSender) {
    let reporter = JobReporter { id: ticket.id, events };
    info!("Job {} started", ticket.id);
    match process(shared, &ticket, &reporter).await {
        Ok(output) => {
            info!("Job {} completed ({} bytes)", ticket.id, output.len());
            reporter.send(StatusEvent::Completed { id: ticket.id, output });
        }
        Err(e) => {
            let category = e.category();
            if category == ErrorCategory::Cancelled {
                info!("Job {} cancelled", ticket.id);
            } else {
                error!("Job {} failed: {}", ticket.id, e);
            }
            reporter.send(StatusEvent::Failed {
                id: ticket.id,
                failure: JobFailure { category, detail: e.to_string() },
            });
        }
    }
}

async fn process(shared: &Shared, ticket: &Ticket, reporter: &JobReporter) -> Result<Bytes, JobError> {
    let cancel = &ticket.cancel;
    let request = &ticket.request;
    if cancel.is_cancelled() {
        return Err(JobError::Cancelled);
    }

    reporter.stage(JobStatus::Extracting);
    let document = extract(shared, ticket, reporter).await?;
    if cancel.is_cancelled() {
        return Err(JobError::Cancelled);
    }

    let source_language = match request.source_language.as_deref() {
        Some(code) => code.to_string(),
        None => shared.config.source_language.clone(),
    };
    let source_language = resolve_source_language(shared, &document, &source_language).await;
    let target_language = request
        .target_language
        .clone()
        .unwrap_or_else(|| shared.config.target_language.clone());

    reporter.stage(JobStatus::Translating);
    let units = units_for_document(&document);
    let translator = BatchTranslator::new(
        Arc::clone(&shared.backend),
        shared.config.batch.clone(),
        Arc::clone(&request.terminology),
    );
    let outcome = translator
        .translate(units, &source_language, &target_language, cancel, |done, total| {
            reporter.progress(JobStatus::Translating, done, total)
        })
        .await?;
    for batch in &outcome.exhausted {
        reporter.warning(JobWarning {
            category: ErrorCategory::TranslationExhausted,
            page: batch.addresses.first().map(|(page, _)| *page),
            block: batch.addresses.first().map(|(_, block)| *block),
            detail: format!("{} blocks kept their source text: {}", batch.addresses.len(), batch.error),
        });
    }
    if outcome.failed_units > 0 {
        warn!(
            "Job {}: {} of {} units kept their source text",
            ticket.id,
            outcome.failed_units,
            outcome.units.len()
        );
    }
    if cancel.is_cancelled() {
        return Err(JobError::Translation(TranslationError::Cancelled));
    }

    reporter.stage(JobStatus::Reconstructing);
    let mut reconstructor = Reconstructor::new(shared.font.clone(), &shared.config.layout);
    if let Some(mode) = request.render_mode {
        reconstructor = reconstructor.with_mode(mode);
    }
    let cancel = cancel.clone();
    let page_reporter = reporter.clone();
    let units = outcome.units;
    let rendered = tokio::task::spawn_blocking(move || {
        reconstructor.reconstruct(&document, &units, &cancel, |done, total| {
            page_reporter.progress(JobStatus::Reconstructing, done, total)
        })
    })
    .await
    .map_err(|e| JobError::Internal(format!("reconstruction task failed: {}", e)))??;

    for overflow in rendered.warnings {
        reporter.warning(JobWarning {
            category: ErrorCategory::RenderOverflow,
            page: Some(overflow.page_index),
            block: Some(overflow.reading_order),
            detail: overflow.detail,
        });
    }
    Ok(Bytes::from(rendered.bytes))
}

/// Extract pages on a blocking thread, reporting progress per page
async fn extract(shared: &Shared, ticket: &Ticket, reporter: &JobReporter) -> Result<Document, JobError> {
    let extractor = Extractor::new(ExtractionSettings::from(&shared.config.layout));
    let source = ticket.request.source.clone();
    let cancel = ticket.cancel.clone();
    let reporter = reporter.clone();

    tokio::task::spawn_blocking(move || -> Result<Document, JobError> {
        let mut stream = extractor.open(&source)?;
        let total = stream.page_count();
        let mut pages = Vec::with_capacity(total);
        for page in stream.by_ref() {
            if cancel.is_cancelled() {
                return Err(JobError::Cancelled);
            }
            pages.push(page?);
            reporter.progress(JobStatus::Extracting, pages.len(), total);
        }
        let document = stream.into_document(pages);
        let stats = document.statistics();
        info!(
            "Extracted {} pages, {} text blocks, {} images",
            stats.page_count, stats.text_block_count, stats.image_count
        );
        Ok(document)
    })
    .await
    .map_err(|e| JobError::Internal(format!("extraction task failed: {}", e)))?
}

/// Detect the language when asked to, falling back to English
async fn resolve_source_language(shared: &Shared, document: &Document, requested: &str) -> String {
    if !language_utils::is_auto(requested) {
        return requested.to_string();
    }
    let sample: String = document
        .text_blocks()
        .map(|block| block.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
        .chars()
        .take(DETECTION_SAMPLE_CHARS)
        .collect();
    if sample.trim().is_empty() {
        return FALLBACK_SOURCE_LANGUAGE.to_string();
    }
    match shared.backend.detect_language(&sample).await {
        Ok(code) => {
            info!("Detected source language: {}", language_utils::display_name(&code));
            code
        }
        Err(e) => {
            warn!("Language detection failed ({}), assuming {}", e, FALLBACK_SOURCE_LANGUAGE);
            FALLBACK_SOURCE_LANGUAGE.to_string()
        }
    }
}
