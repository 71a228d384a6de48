//! Per-job working directories.
//!
//! ```text
//! <work_dir>/uploads/<job_id>/        uploaded source document
//! <work_dir>/sorted/<job_id>/         <order>_<item>.<ext>
//! <work_dir>/consolidated/<job_id>/   <item>.<ext>
//! <work_dir>/zipped/<job_id>/         <name>.zip
//! ```

use std::path::{Path, PathBuf};

use uuid::Uuid;

use packslip_core::defaults::{CONSOLIDATED_DIR, SORTED_DIR, UPLOADS_DIR, ZIPPED_DIR};
use packslip_core::Result;

/// Directories owned by one job. Scoped by job id so concurrent jobs never
/// share a file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobLayout {
    pub uploads: PathBuf,
    pub sorted: PathBuf,
    pub consolidated: PathBuf,
    pub zipped: PathBuf,
}

impl JobLayout {
    pub fn new(work_dir: &Path, job_id: Uuid) -> Self {
        let id = job_id.to_string();
        Self {
            uploads: work_dir.join(UPLOADS_DIR).join(&id),
            sorted: work_dir.join(SORTED_DIR).join(&id),
            consolidated: work_dir.join(CONSOLIDATED_DIR).join(&id),
            zipped: work_dir.join(ZIPPED_DIR).join(&id),
        }
    }

    /// Create every directory of the layout.
    pub async fn create(&self) -> Result<()> {
        for dir in [&self.uploads, &self.sorted, &self.consolidated, &self.zipped] {
            tokio::fs::create_dir_all(dir).await?;
        }
        Ok(())
    }
}
