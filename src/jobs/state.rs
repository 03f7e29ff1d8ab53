/*!
 * Job status model: the state machine, progress bands and the report
 * returned to pollers.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::errors::ErrorCategory;

/// Job identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s).map_err(|e| anyhow::anyhow!("Invalid job id '{}': {}", s, e))?))
    }
}

/// Lifecycle of a job; variants are declared in pipeline order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Extracting,
    Translating,
    Reconstructing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Forward moves only, and Failed from any active state
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            Self::Failed => true,
            Self::Completed => *self == Self::Reconstructing,
            _ => next >= *self,
        }
    }

    /// Progress range covered by the stage
    pub fn progress_band(&self) -> (u8, u8) {
        match self {
            Self::Queued => (0, 0),
            Self::Extracting => (0, 25),
            Self::Translating => (25, 80),
            Self::Reconstructing => (80, 100),
            Self::Completed => (100, 100),
            Self::Failed => (0, 100),
        }
    }

    /// Progress after `done` of `total` steps of the stage
    pub fn progress_at(&self, done: usize, total: usize) -> u8 {
        let (start, end) = self.progress_band();
        if total == 0 {
            return end;
        }
        let span = (end - start) as usize;
        start + (span * done.min(total) / total) as u8
    }

    pub fn stage_label(&self) -> &'static str {
        match self {
            Self::Queued => "waiting for a worker",
            Self::Extracting => "extracting content",
            Self::Translating => "translating text",
            Self::Reconstructing => "rendering output",
            Self::Completed => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Extracting => write!(f, "extracting"),
            JobStatus::Translating => write!(f, "translating"),
            JobStatus::Reconstructing => write!(f, "reconstructing"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Why a job failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobFailure {
    pub category: ErrorCategory,
    pub detail: String,
}

/// Non-fatal problem of a completed job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobWarning {
    pub category: ErrorCategory,
    pub page: Option<usize>,
    /// Reading-order index of the affected block
    pub block: Option<usize>,
    pub detail: String,
}

/// Snapshot of a job as seen by pollers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusReport {
    pub id: JobId,
    pub status: JobStatus,
    pub progress: u8,
    pub stage: String,
    pub error: Option<JobFailure>,
    pub warnings: Vec<JobWarning>,
    pub output_available: bool,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobStatusReport {
    pub fn queued(id: JobId) -> Self {
        Self {
            id,
            status: JobStatus::Queued,
            progress: 0,
            stage: JobStatus::Queued.stage_label().to_string(),
            error: None,
            warnings: Vec::new(),
            output_available: false,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
