//! Job lifecycle manager: owns the job table and runs one background task per job.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use packslip_core::defaults::{
    ARCHIVE_EXTENSION, EVENT_BUS_CAPACITY, PROGRESS_ARCHIVING, UPLOAD_STEM, WORK_DIR,
};
use packslip_core::{
    archive_stem, Archiver, DocumentLibrary, Error, JobRecord, JobStatus, JobStatusView, Result,
};

use crate::archive::build_archive;
use crate::classifier::{ClassifierConfig, PageClassifier};
use crate::context::JobContext;
use crate::layout::JobLayout;
use crate::pipeline::{run_pipeline, PipelineOutput};

/// Configuration for the job manager.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Root of the per-job directories.
    pub work_dir: PathBuf,
    /// Page classification settings.
    pub classifier: ClassifierConfig,
    /// Capacity of the job event channel.
    pub event_capacity: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from(WORK_DIR),
            classifier: ClassifierConfig::default(),
            event_capacity: EVENT_BUS_CAPACITY,
        }
    }
}

impl ManagerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `PACKSLIP_WORK_DIR` | `./packslip-data` | Root of per-job directories |
    ///
    /// Classifier variables are read by [`ClassifierConfig::from_env`].
    pub fn from_env() -> Self {
        let work_dir = std::env::var("PACKSLIP_WORK_DIR")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(WORK_DIR));

        Self {
            work_dir,
            classifier: ClassifierConfig::from_env(),
            event_capacity: EVENT_BUS_CAPACITY,
        }
    }

    /// Set the work directory.
    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    /// Set the classifier configuration.
    pub fn with_classifier(mut self, classifier: ClassifierConfig) -> Self {
        self.classifier = classifier;
        self
    }

    /// Set the event channel capacity.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }
}

/// Event emitted by the job manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    /// A job was accepted and queued.
    JobSubmitted { job_id: Uuid },
    /// A job began processing.
    JobStarted { job_id: Uuid },
    /// Job progress was updated.
    JobProgress {
        job_id: Uuid,
        percent: u8,
        message: Option<String>,
    },
    /// A job produced its archive.
    JobCompleted { job_id: Uuid, file_count: usize },
    /// A job failed.
    JobFailed { job_id: Uuid, error: String },
}

impl JobEvent {
    pub fn job_id(&self) -> Uuid {
        match self {
            JobEvent::JobSubmitted { job_id }
            | JobEvent::JobStarted { job_id }
            | JobEvent::JobProgress { job_id, .. }
            | JobEvent::JobCompleted { job_id, .. }
            | JobEvent::JobFailed { job_id, .. } => *job_id,
        }
    }

    /// Completed or failed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobEvent::JobCompleted { .. } | JobEvent::JobFailed { .. })
    }
}

/// Process-wide job table.
///
/// Every access takes the lock for the duration of a single copy or
/// mutation, so readers always see a consistent record and never wait on
/// a worker's disk I/O. Records are never evicted.
#[derive(Debug, Clone, Default)]
pub struct JobTable {
    records: Arc<RwLock<HashMap<Uuid, JobRecord>>>,
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: JobRecord) {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(record.id, record);
    }

    /// Snapshot of one record.
    pub fn get(&self, id: Uuid) -> Option<JobRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// Status view of one record.
    pub fn view(&self, id: Uuid) -> Option<JobStatusView> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .map(JobRecord::view)
    }

    /// Mutate one record under the write lock.
    pub fn update<R>(&self, id: Uuid, f: impl FnOnce(&mut JobRecord) -> R) -> Option<R> {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&id)
            .map(f)
    }

    /// Status views of every record, newest first.
    pub fn views(&self) -> Vec<JobStatusView> {
        let mut views: Vec<JobStatusView> = self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(JobRecord::view)
            .collect();
        views.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        views
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Accepts documents, runs the pipeline per job in the background and
/// answers status and retrieval queries.
///
/// Cloning is cheap; clones share the job table and event channel.
pub struct JobManager<L, A> {
    library: Arc<L>,
    archiver: Arc<A>,
    classifier: Arc<PageClassifier>,
    config: Arc<ManagerConfig>,
    jobs: JobTable,
    event_tx: broadcast::Sender<JobEvent>,
}

impl<L, A> Clone for JobManager<L, A> {
    fn clone(&self) -> Self {
        Self {
            library: self.library.clone(),
            archiver: self.archiver.clone(),
            classifier: self.classifier.clone(),
            config: self.config.clone(),
            jobs: self.jobs.clone(),
            event_tx: self.event_tx.clone(),
        }
    }
}

impl<L: DocumentLibrary, A: Archiver> JobManager<L, A> {
    /// Create a manager. Fails if the classifier configuration is invalid.
    pub fn new(library: L, archiver: A, config: ManagerConfig) -> Result<Self> {
        let classifier = PageClassifier::new(config.classifier.clone())?;
        let (event_tx, _) = broadcast::channel(config.event_capacity.max(1));
        Ok(Self {
            library: Arc::new(library),
            archiver: Arc::new(archiver),
            classifier: Arc::new(classifier),
            config: Arc::new(config),
            jobs: JobTable::new(),
            event_tx,
        })
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Store an uploaded document and start processing it.
    ///
    /// Returns once the job record exists and its task is spawned.
    pub async fn submit(&self, bytes: &[u8], original_filename: &str) -> Result<Uuid> {
        let job_id = Uuid::new_v4();
        let layout = JobLayout::new(&self.config.work_dir, job_id);
        layout.create().await?;

        let upload = self.upload_path(&layout);
        tokio::fs::write(&upload, bytes).await?;
        debug!(%job_id, path = %upload.display(), bytes = bytes.len(), "Stored upload");

        Ok(self.enqueue(job_id, original_filename, layout, upload))
    }

    /// Copy a document from disk and start processing it.
    pub async fn submit_path(&self, path: &Path) -> Result<Uuid> {
        let original_filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::InvalidInput(format!("Not a file: {}", path.display())))?;

        let job_id = Uuid::new_v4();
        let layout = JobLayout::new(&self.config.work_dir, job_id);
        layout.create().await?;

        let upload = self.upload_path(&layout);
        tokio::fs::copy(path, &upload).await?;

        Ok(self.enqueue(job_id, &original_filename, layout, upload))
    }

    /// Current status of a job.
    pub fn status(&self, job_id: Uuid) -> Result<JobStatusView> {
        self.jobs.view(job_id).ok_or(Error::JobNotFound(job_id))
    }

    /// Full record of a job.
    pub fn record(&self, job_id: Uuid) -> Result<JobRecord> {
        self.jobs.get(job_id).ok_or(Error::JobNotFound(job_id))
    }

    /// Status views of all jobs, newest first.
    pub fn list(&self) -> Vec<JobStatusView> {
        self.jobs.views()
    }

    /// Path of a finished job's archive.
    pub fn archive_path(&self, job_id: Uuid) -> Result<PathBuf> {
        let record = self.record(job_id)?;
        if record.status != JobStatus::Done {
            return Err(Error::NotReady(job_id));
        }
        record
            .archive_path
            .ok_or_else(|| Error::Internal(format!("Job {} is done without an archive", job_id)))
    }

    /// Bytes of a finished job's archive.
    pub async fn archive_bytes(&self, job_id: Uuid) -> Result<Vec<u8>> {
        let path = self.archive_path(job_id)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| Error::NotFound(format!("Archive {}: {}", path.display(), e)))
    }

    /// Get a receiver for job events.
    pub fn events(&self) -> broadcast::Receiver<JobEvent> {
        self.event_tx.subscribe()
    }

    /// Wait until a job reaches `done` or `error` and return its final status.
    pub async fn wait(&self, job_id: Uuid) -> Result<JobStatusView> {
        // Subscribe before reading so a transition in between is not missed.
        let mut events = self.events();
        loop {
            let view = self.status(job_id)?;
            if view.status.is_terminal() {
                return Ok(view);
            }
            loop {
                match events.recv().await {
                    Ok(event) if event.job_id() == job_id && event.is_terminal() => break,
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(%job_id, skipped, "Event receiver lagged, re-reading status");
                        break;
                    }
                    Err(broadcast::error::RecvError::Closed) => return self.status(job_id),
                }
            }
        }
    }

    fn upload_path(&self, layout: &JobLayout) -> PathBuf {
        layout
            .uploads
            .join(format!("{}.{}", UPLOAD_STEM, self.library.extension()))
    }

    fn enqueue(
        &self,
        job_id: Uuid,
        original_filename: &str,
        layout: JobLayout,
        upload: PathBuf,
    ) -> Uuid {
        self.jobs.insert(JobRecord::new(job_id, original_filename));
        let _ = self.event_tx.send(JobEvent::JobSubmitted { job_id });
        info!(%job_id, original_filename, "Job submitted");

        let manager = self.clone();
        tokio::spawn(async move {
            manager.run_job(job_id, layout, upload).await;
        });
        job_id
    }

    /// Drive one job from `running` to a terminal state.
    async fn run_job(self, job_id: Uuid, layout: JobLayout, upload: PathBuf) {
        let start = Instant::now();

        if !self.jobs.update(job_id, JobRecord::start).unwrap_or(false) {
            warn!(%job_id, "Job is not pending, not starting");
            return;
        }
        info!(%job_id, "Processing job");
        let _ = self.event_tx.send(JobEvent::JobStarted { job_id });

        match self.execute(job_id, layout, upload).await {
            Ok((archive_path, file_count)) => {
                self.jobs.update(job_id, |r| r.finish(archive_path.clone()));
                info!(
                    %job_id,
                    file_count,
                    archive = %archive_path.display(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Job completed successfully"
                );
                let _ = self
                    .event_tx
                    .send(JobEvent::JobCompleted { job_id, file_count });
            }
            Err(e) => {
                let detail = e.to_string();
                self.jobs.update(job_id, |r| r.fail(detail.clone()));
                warn!(
                    %job_id,
                    error = %detail,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Job failed"
                );
                let _ = self.event_tx.send(JobEvent::JobFailed {
                    job_id,
                    error: detail,
                });
            }
        }
    }

    async fn execute(
        &self,
        job_id: Uuid,
        layout: JobLayout,
        upload: PathBuf,
    ) -> Result<(PathBuf, usize)> {
        let output = self.run_pipeline_blocking(job_id, layout.clone(), upload).await?;
        let files = output.file_names();
        let file_count = files.len();

        let message = "Finalizing (zipping)...";
        self.jobs.update(job_id, |r| {
            r.files = files.clone();
            r.page_count = Some(output.page_count);
            r.set_progress(PROGRESS_ARCHIVING, Some(message));
        });
        let _ = self.event_tx.send(JobEvent::JobProgress {
            job_id,
            percent: PROGRESS_ARCHIVING,
            message: Some(message.to_string()),
        });

        let archive_path = self
            .spawn_archive(job_id, &layout, files)
            .await
            .map_err(|e| {
                error!(%job_id, error = ?e, "Archive task panicked");
                Error::Internal(format!("Archive task failed: {}", e))
            })??;
        Ok((archive_path, file_count))
    }

    /// Passes 1–4 on a blocking thread.
    async fn run_pipeline_blocking(
        &self,
        job_id: Uuid,
        layout: JobLayout,
        upload: PathBuf,
    ) -> Result<PipelineOutput> {
        let library = self.library.clone();
        let classifier = self.classifier.clone();
        let ctx = self.progress_context(job_id);

        tokio::task::spawn_blocking(move || {
            run_pipeline(library.as_ref(), &classifier, &upload, &layout, &ctx)
        })
        .await
        .map_err(|e| {
            error!(%job_id, error = ?e, "Pipeline task panicked");
            Error::Internal(format!("Pipeline task failed: {}", e))
        })?
    }

    /// Archiving runs as its own task; the job sits at 90% until it ends.
    fn spawn_archive(
        &self,
        job_id: Uuid,
        layout: &JobLayout,
        files: Vec<String>,
    ) -> JoinHandle<Result<PathBuf>> {
        let stem = self
            .jobs
            .get(job_id)
            .and_then(|r| archive_stem(&r.original_filename))
            .unwrap_or_else(|| job_id.to_string());
        let dest = layout.zipped.join(format!("{}.{}", stem, ARCHIVE_EXTENSION));
        let source_dir = layout.consolidated.clone();
        let archiver = self.archiver.clone();

        tokio::spawn(async move { build_archive(archiver.as_ref(), &source_dir, &files, &dest).await })
    }

    /// Context whose progress reports update the record and emit events.
    fn progress_context(&self, job_id: Uuid) -> JobContext {
        let jobs = self.jobs.clone();
        let event_tx = self.event_tx.clone();
        JobContext::new(job_id).with_progress_callback(move |percent, message| {
            let current = jobs.update(job_id, |r| {
                r.set_progress(percent, message);
                r.progress
            });
            if let Some(percent) = current {
                let _ = event_tx.send(JobEvent::JobProgress {
                    job_id,
                    percent,
                    message: message.map(String::from),
                });
            }
        })
    }
}
