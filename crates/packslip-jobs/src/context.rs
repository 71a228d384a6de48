//! Execution context handed to the pipeline for one job.

use uuid::Uuid;

/// Progress callback type for pipeline stages.
pub type ProgressCallback = Box<dyn Fn(u8, Option<&str>) + Send + Sync>;

/// Context provided to the pipeline while it runs a job.
pub struct JobContext {
    /// The job being processed.
    pub job_id: Uuid,
    /// Progress callback for updating the job record.
    progress_callback: Option<ProgressCallback>,
}

impl JobContext {
    /// Create a new job context.
    pub fn new(job_id: Uuid) -> Self {
        Self {
            job_id,
            progress_callback: None,
        }
    }

    /// Set the progress callback.
    pub fn with_progress_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(u8, Option<&str>) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Box::new(callback));
        self
    }

    /// Report progress to the callback.
    pub fn report_progress(&self, percent: u8, message: Option<&str>) {
        if let Some(ref callback) = self.progress_callback {
            callback(percent, message);
        }
    }

    /// Report progress inside a phase spanning `[start, end)`.
    ///
    /// `done` of `total` units map linearly onto the phase; an empty phase
    /// reports its end.
    pub fn report_phase(&self, start: u8, end: u8, done: usize, total: usize) {
        let span = end.saturating_sub(start) as usize;
        let offset = if total == 0 {
            span
        } else {
            span * done.min(total) / total
        };
        self.report_progress(start + offset as u8, None);
    }
}
