//! Print job and queue status models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Job lifecycle: `queued → processing → {completed | error}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting in its printer queue
    Queued,
    /// Currently being sent to the printer
    Processing,
    /// Work finished successfully
    Completed,
    /// Work failed; see `error`
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }
}

/// One unit of print work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Unique job identifier
    pub id: String,

    /// Physical printer the job is queued on
    pub printer_name: String,

    /// Current status
    pub status: JobStatus,

    /// When the job was submitted
    pub created_at: DateTime<Utc>,

    /// When the job started processing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// When the job reached a terminal state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Error message (if failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Caller-supplied description of the job
    #[serde(default)]
    pub metadata: serde_json::Value,

    /// Structured result of the work (if successful)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

impl Job {
    /// Create a new queued job
    pub fn new(id: String, printer_name: String, metadata: serde_json::Value) -> Self {
        Self {
            id,
            printer_name,
            status: JobStatus::Queued,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error: None,
            metadata,
            result: None,
        }
    }

    /// Mark job as processing
    pub fn mark_processing(&mut self) {
        self.status = JobStatus::Processing;
        self.started_at = Some(Utc::now());
    }

    /// Mark job as completed
    pub fn mark_completed(&mut self, result: serde_json::Value) {
        self.status = JobStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.result = Some(result);
    }

    /// Mark job as failed
    pub fn mark_failed(&mut self, error: String) {
        self.status = JobStatus::Error;
        self.completed_at = Some(Utc::now());
        self.error = Some(error);
    }
}

/// Whether a printer currently has a job in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueState {
    Idle,
    Busy,
}

/// Snapshot of one printer queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub printer_name: String,

    /// Jobs waiting behind the in-flight one
    pub pending: usize,

    pub processing: bool,

    pub state: QueueState,
}

impl QueueStatus {
    pub fn new(printer_name: String, pending: usize, processing: bool) -> Self {
        Self {
            printer_name,
            pending,
            processing,
            state: if processing {
                QueueState::Busy
            } else {
                QueueState::Idle
            },
        }
    }
}
