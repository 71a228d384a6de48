//! Collaborator traits for document handling and archiving.
//!
//! The pipeline never touches a file format directly. Everything format
//! specific lives behind [`DocumentLibrary`] and [`Archiver`], so the same
//! classification and consolidation logic runs against PDFs or plain text
//! page dumps.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::Result;

/// Page-level access to one document format.
///
/// All methods are synchronous and may block on disk I/O; callers run them
/// off the async executor.
pub trait DocumentLibrary: Send + Sync + 'static {
    /// An opened source document.
    type Source: Send;
    /// A page copied out of a source, ready to be written elsewhere.
    type Page: Send;

    /// File extension (without dot) of documents this library writes.
    fn extension(&self) -> &str;

    /// Open and parse a document.
    fn open(&self, path: &Path) -> Result<Self::Source>;

    /// Number of pages in an opened document.
    fn page_count(&self, source: &Self::Source) -> usize;

    /// Extract the text content of one page (zero-based).
    fn extract_text(&self, source: &Self::Source, page_index: usize) -> Result<String>;

    /// Copy one page (zero-based) out of the source.
    fn copy_page(&self, source: &Self::Source, page_index: usize) -> Result<Self::Page>;

    /// Write pages, in the given order, as a new document at `dest`.
    fn write(&self, pages: Vec<Self::Page>, dest: &Path) -> Result<()>;
}

/// One file to place in an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Entry name inside the archive.
    pub name: String,
    /// File on disk providing the entry bytes.
    pub source_path: PathBuf,
}

impl ArchiveEntry {
    pub fn new(name: impl Into<String>, source_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source_path: source_path.into(),
        }
    }
}

/// Packs files into a single downloadable archive.
#[async_trait]
pub trait Archiver: Send + Sync + 'static {
    /// Create the archive at `dest` and return its path.
    async fn create_archive(&self, entries: Vec<ArchiveEntry>, dest: &Path) -> Result<PathBuf>;
}
