//! # packslip-jobs
//!
//! Packing slip sorting pipeline and background job manager.
//!
//! This crate provides:
//! - Page classification with carry-forward across continuation pages
//! - Grouping of pages into per-(order, item) intermediate documents
//! - Primary SKU resolution and consolidation into one document per SKU
//! - Archive building, run as a tracked task after the pipeline
//! - A job manager with progress tracking and broadcast events
//!
//! ## Example
//!
//! ```ignore
//! use packslip_jobs::{JobManager, LopdfLibrary, ManagerConfig, ZipArchiver};
//!
//! let manager = JobManager::new(LopdfLibrary::new(), ZipArchiver::new(), ManagerConfig::from_env())?;
//!
//! let job_id = manager.submit(&bytes, "slips.pdf").await?;
//! let status = manager.wait(job_id).await?;
//! if status.status == JobStatus::Done {
//!     let archive = manager.archive_bytes(job_id).await?;
//! }
//! ```

pub mod adapters;
pub mod archive;
pub mod classifier;
pub mod consolidate;
pub mod context;
pub mod grouping;
pub mod layout;
pub mod manager;
pub mod pipeline;
pub mod resolver;

// Re-export core types
pub use packslip_core::*;

// Re-export pipeline types
pub use archive::build_archive;
pub use classifier::{CarryState, ClassifierConfig, PageClassifier};
pub use consolidate::{consolidate, FinalArtifact};
pub use context::{JobContext, ProgressCallback};
pub use grouping::{group, IntermediateArtifact, PageGroup, PageGroups};
pub use layout::JobLayout;
pub use manager::{JobEvent, JobManager, JobTable, ManagerConfig};
pub use pipeline::{run_pipeline, PipelineOutput};
pub use resolver::{resolve, CanonicalMap};

// Re-export backends
pub use adapters::{FormFeedLibrary, LopdfLibrary, ZipArchiver};
