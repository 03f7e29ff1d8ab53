/*!
 * Job registry: the only structure shared across jobs.
 *
 * Workers never touch it directly. They send [`StatusEvent`]s that a single
 * writer task applies in arrival order; readers take snapshots under a read
 * lock. Status and progress of a job always change together.
 */

use bytes::Bytes;
use chrono::Utc;
use log::{debug, warn};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::cancellation::CancellationToken;
use super::state::{JobFailure, JobId, JobStatus, JobStatusReport, JobWarning};

/// A change to one job, produced by the worker running it
#[derive(Debug, Clone)]
pub enum StatusEvent {
    /// Enter a stage at the given progress
    Stage { id: JobId, status: JobStatus, progress: u8 },
    /// Progress inside the current stage
    Progress { id: JobId, progress: u8 },
    Warning { id: JobId, warning: JobWarning },
    Completed { id: JobId, output: Bytes },
    Failed { id: JobId, failure: JobFailure },
}

impl StatusEvent {
    pub fn job_id(&self) -> JobId {
        match self {
            Self::Stage { id, .. }
            | Self::Progress { id, .. }
            | Self::Warning { id, .. }
            | Self::Completed { id, .. }
            | Self::Failed { id, .. } => *id,
        }
    }
}

pub type StatusSender = mpsc::UnboundedSender<StatusEvent>;

struct JobEntry {
    report: JobStatusReport,
    output: Option<Bytes>,
    cancel: CancellationToken,
    watch: watch::Sender<JobStatusReport>,
}

#[derive(Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, JobEntry>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly submitted job
    pub fn insert(&self, id: JobId, cancel: CancellationToken) -> JobStatusReport {
        let report = JobStatusReport::queued(id);
        let (watch, _) = watch::channel(report.clone());
        self.jobs.write().insert(
            id,
            JobEntry {
                report: report.clone(),
                output: None,
                cancel,
                watch,
            },
        );
        report
    }

    pub fn get(&self, id: &JobId) -> Option<JobStatusReport> {
        self.jobs.read().get(id).map(|entry| entry.report.clone())
    }

    pub fn output(&self, id: &JobId) -> Option<Bytes> {
        self.jobs.read().get(id).and_then(|entry| entry.output.clone())
    }

    pub fn cancel_token(&self, id: &JobId) -> Option<CancellationToken> {
        self.jobs.read().get(id).map(|entry| entry.cancel.clone())
    }

    pub fn subscribe(&self, id: &JobId) -> Option<watch::Receiver<JobStatusReport>> {
        self.jobs.read().get(id).map(|entry| entry.watch.subscribe())
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }

    /// Apply one event; returns false when it was rejected
    pub fn apply(&self, event: StatusEvent) -> bool {
        let id = event.job_id();
        let mut jobs = self.jobs.write();
        let Some(entry) = jobs.get_mut(&id) else {
            debug!("Dropping event for unknown job {}", id);
            return false;
        };
        let report = &mut entry.report;

        let accepted = match event {
            StatusEvent::Stage { status, progress, .. } => {
                if !report.status.can_transition_to(status) || progress < report.progress {
                    warn!(
                        "Job {}: rejected move from {} ({}%) to {} ({}%)",
                        id, report.status, report.progress, status, progress
                    );
                    false
                } else {
                    if report.status == JobStatus::Queued && status != JobStatus::Failed {
                        report.started_at = Some(Utc::now());
                    }
                    report.status = status;
                    report.progress = progress.min(100);
                    report.stage = status.stage_label().to_string();
                    true
                }
            }
            StatusEvent::Progress { progress, .. } => {
                let (_, band_end) = report.status.progress_band();
                if report.status.is_terminal() || progress < report.progress || progress > band_end {
                    warn!(
                        "Job {}: rejected progress {}% while {} at {}%",
                        id, progress, report.status, report.progress
                    );
                    false
                } else {
                    report.progress = progress;
                    true
                }
            }
            StatusEvent::Warning { warning, .. } => {
                if report.status.is_terminal() {
                    false
                } else {
                    report.warnings.push(warning);
                    true
                }
            }
            StatusEvent::Completed { output, .. } => {
                if !report.status.can_transition_to(JobStatus::Completed) {
                    warn!("Job {}: cannot complete while {}", id, report.status);
                    false
                } else {
                    report.status = JobStatus::Completed;
                    report.progress = 100;
                    report.stage = JobStatus::Completed.stage_label().to_string();
                    report.output_available = true;
                    report.finished_at = Some(Utc::now());
                    entry.output = Some(output);
                    true
                }
            }
            StatusEvent::Failed { failure, .. } => {
                if report.status.is_terminal() {
                    warn!("Job {}: already {}, ignoring failure", id, report.status);
                    false
                } else {
                    report.stage = format!("failed while {}", report.stage);
                    report.status = JobStatus::Failed;
                    report.error = Some(failure);
                    report.finished_at = Some(Utc::now());
                    true
                }
            }
        };

        if accepted {
            entry.watch.send_replace(entry.report.clone());
        }
        accepted
    }

    /// Drop terminal jobs that finished more than `ttl_secs` ago
    pub fn purge_expired(&self, ttl_secs: u64) -> usize {
        let now = Utc::now();
        let mut jobs = self.jobs.write();
        let before = jobs.len();
        jobs.retain(|_, entry| match entry.report.finished_at {
            Some(finished) if entry.report.is_terminal() => (now - finished).num_seconds() < ttl_secs as i64,
            _ => true,
        });
        let purged = before - jobs.len();
        if purged > 0 {
            debug!("Purged {} expired jobs", purged);
        }
        purged
    }

    /// Start the single writer applying events until every sender is gone
    pub fn spawn_writer(registry: Arc<Self>, mut events: mpsc::UnboundedReceiver<StatusEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                registry.apply(event);
            }
            debug!("Status writer stopped");
        })
    }
}
