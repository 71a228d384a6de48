//! Core data models for packslip.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::defaults::PROGRESS_DONE;

// =============================================================================
// PAGE CLASSIFICATION
// =============================================================================

/// Classification of a single source page.
///
/// `item_id` is never empty: the classifier falls back to a synthetic
/// `UNKNOWN_<page>` identifier when nothing could be extracted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    /// Zero-based index in the source document.
    pub page_index: usize,
    /// Order identifier, `None` when neither the page nor any earlier page had one.
    pub order_id: Option<String>,
    /// Sanitized item identifier (SKU).
    pub item_id: String,
}

impl PageRecord {
    /// Bucket this page belongs to, or `None` if the page is ungroupable.
    pub fn group_key(&self) -> Option<GroupKey> {
        match self.order_id.as_deref() {
            Some(order) if !order.is_empty() && !self.item_id.is_empty() => {
                Some(GroupKey::new(order, &self.item_id))
            }
            _ => None,
        }
    }
}

/// Name of an intermediate bucket: `<order_id>_<item_id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupKey {
    pub order_id: String,
    pub item_id: String,
}

impl GroupKey {
    pub fn new(order_id: impl Into<String>, item_id: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
            item_id: item_id.into(),
        }
    }

    /// Split an artifact name (without extension) on its **last** underscore.
    ///
    /// Item identifiers that themselves contain underscores therefore shift
    /// their prefix into the order part; names without an underscore yield
    /// `None`.
    pub fn parse(name: &str) -> Option<Self> {
        name.rsplit_once('_')
            .map(|(order, item)| Self::new(order, item))
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.order_id, self.item_id)
    }
}

// =============================================================================
// JOBS
// =============================================================================

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Done,
    Error,
}

impl JobStatus {
    /// `done` and `error` never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Full state of one submitted job.
///
/// Mutation goes through the transition methods, which keep progress
/// monotonic and refuse to leave a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: Uuid,
    pub status: JobStatus,
    /// Percentage in `0..=100`; 100 only once `status == Done`.
    pub progress: u8,
    pub message: String,
    /// Final artifact file names, set when consolidation finishes.
    pub files: Vec<String>,
    pub archive_path: Option<PathBuf>,
    pub error_detail: Option<String>,
    pub original_filename: String,
    pub page_count: Option<usize>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    /// Create a pending record.
    pub fn new(id: Uuid, original_filename: impl Into<String>) -> Self {
        Self {
            id,
            status: JobStatus::Pending,
            progress: 0,
            message: "Queued".to_string(),
            files: Vec::new(),
            archive_path: None,
            error_detail: None,
            original_filename: original_filename.into(),
            page_count: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// `pending → running`. Returns false if the job was not pending.
    pub fn start(&mut self) -> bool {
        if self.status != JobStatus::Pending {
            return false;
        }
        self.status = JobStatus::Running;
        self.progress = 0;
        self.message = "Preparing...".to_string();
        self.started_at = Some(Utc::now());
        true
    }

    /// Raise progress and optionally replace the message.
    ///
    /// Lower values than the current progress are ignored, and values are
    /// capped at 99 so that 100 is reserved for [`JobRecord::finish`].
    pub fn set_progress(&mut self, percent: u8, message: Option<&str>) {
        if self.status.is_terminal() {
            return;
        }
        let capped = percent.min(PROGRESS_DONE - 1);
        if capped > self.progress {
            self.progress = capped;
        }
        if let Some(message) = message {
            self.message = message.to_string();
        }
    }

    /// `running → done`, forcing progress to 100.
    pub fn finish(&mut self, archive_path: PathBuf) -> bool {
        if self.status != JobStatus::Running {
            return false;
        }
        self.status = JobStatus::Done;
        self.progress = PROGRESS_DONE;
        self.message = "Done".to_string();
        self.archive_path = Some(archive_path);
        self.completed_at = Some(Utc::now());
        true
    }

    /// `pending|running → error`, capturing the failure detail.
    pub fn fail(&mut self, detail: impl Into<String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        let detail = detail.into();
        self.status = JobStatus::Error;
        self.message = format!("Error: {}", detail);
        self.error_detail = Some(detail);
        self.completed_at = Some(Utc::now());
        true
    }

    /// Snapshot for status polling.
    pub fn view(&self) -> JobStatusView {
        let archive_ref = match self.status {
            JobStatus::Done => self
                .archive_path
                .as_ref()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned()),
            _ => None,
        };
        let error = match self.status {
            JobStatus::Error => self.error_detail.clone(),
            _ => None,
        };
        JobStatusView {
            id: self.id,
            status: self.status,
            progress: self.progress,
            message: self.message.clone(),
            files: self.files.clone(),
            archive_ref,
            error,
            created_at: self.created_at,
        }
    }
}

/// What the status interface returns to a polling caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusView {
    pub id: Uuid,
    pub status: JobStatus,
    pub progress: u8,
    pub message: String,
    pub files: Vec<String>,
    /// Archive file name, only once the job is done.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_ref: Option<String>,
    /// Failure detail, only when the job errored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}
