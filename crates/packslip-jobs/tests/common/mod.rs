//! Shared fixtures for the packslip-jobs integration tests.

#![allow(dead_code)]

use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use uuid::Uuid;

use packslip_jobs::{
    ArchiveEntry, Archiver, DocumentLibrary, Error, FormFeedLibrary, JobManager, JobStatusView,
    ManagerConfig, Result, ZipArchiver,
};

/// First page of a slip: order header, tracking barcode and item table.
pub fn slip(order_id: &str, item_id: &str) -> String {
    format!(
        "Packing Slip\n\
         Order ID: {order_id}\n\
         Tracking 9400111202555842\n\
         Product Name   Seller SKU   Qty\n\
         Sample Product {item_id} 1"
    )
}

/// A continuation page without any markers.
pub fn continuation(n: usize) -> String {
    format!("continued page {}", n)
}

/// Join page texts into a form-feed document.
pub fn document(pages: &[String]) -> String {
    pages.join("\x0c")
}

pub fn text_manager<A: Archiver>(work_dir: &Path, archiver: A) -> JobManager<FormFeedLibrary, A> {
    JobManager::new(
        FormFeedLibrary::new(),
        archiver,
        ManagerConfig::default().with_work_dir(work_dir),
    )
    .expect("Failed to create manager")
}

/// Wait for a job to finish, failing the test after ten seconds.
pub async fn wait_done<L: DocumentLibrary, A: Archiver>(
    manager: &JobManager<L, A>,
    job_id: Uuid,
) -> JobStatusView {
    tokio::time::timeout(Duration::from_secs(10), manager.wait(job_id))
        .await
        .expect("Job did not finish in time")
        .expect("Job disappeared")
}

/// Poll until progress reaches `percent` or the job ends.
pub async fn wait_for_progress<L: DocumentLibrary, A: Archiver>(
    manager: &JobManager<L, A>,
    job_id: Uuid,
    percent: u8,
) -> JobStatusView {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let view = manager.status(job_id).expect("Job disappeared");
            if view.progress >= percent || view.status.is_terminal() {
                return view;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("Progress did not advance in time")
}

/// Names and contents of every entry of a ZIP archive.
pub fn zip_entries(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).expect("Not a ZIP archive");
    (0..archive.len())
        .map(|i| {
            let mut file = archive.by_index(i).unwrap();
            let mut content = Vec::new();
            file.read_to_end(&mut content).unwrap();
            (file.name().to_string(), content)
        })
        .collect()
}

/// Pages of a form-feed document produced by a job.
pub fn read_pages(path: &Path) -> Vec<String> {
    let library = FormFeedLibrary::new();
    let source = library.open(path).expect("Failed to open artifact");
    (0..library.page_count(&source))
        .map(|i| library.extract_text(&source, i).unwrap())
        .collect()
}

/// Zip archiver that holds until released.
#[derive(Clone, Default)]
pub struct GatedArchiver {
    gate: Arc<Notify>,
}

impl GatedArchiver {
    pub fn release(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl Archiver for GatedArchiver {
    async fn create_archive(
        &self,
        entries: Vec<ArchiveEntry>,
        dest: &Path,
    ) -> Result<std::path::PathBuf> {
        self.gate.notified().await;
        ZipArchiver::new().create_archive(entries, dest).await
    }
}

/// Archiver that always fails.
#[derive(Clone, Default)]
pub struct FailingArchiver;

#[async_trait]
impl Archiver for FailingArchiver {
    async fn create_archive(
        &self,
        _entries: Vec<ArchiveEntry>,
        _dest: &Path,
    ) -> Result<std::path::PathBuf> {
        Err(Error::Archive("disk full".to_string()))
    }
}
