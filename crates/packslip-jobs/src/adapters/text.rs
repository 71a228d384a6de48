//! Form-feed text document library.
//!
//! A document is a UTF-8 text file whose pages are separated by form feed
//! (`\x0c`), the page delimiter `pdftotext` emits. Useful for processing
//! text dumps of slips and as a deterministic document format in tests.

use std::path::Path;

use packslip_core::{DocumentLibrary, Error, Result};

/// Page delimiter.
pub const FORM_FEED: char = '\x0c';

/// [`DocumentLibrary`] over form-feed separated text files.
#[derive(Debug, Clone, Default)]
pub struct FormFeedLibrary;

impl FormFeedLibrary {
    pub fn new() -> Self {
        Self
    }

    /// Split document text into pages.
    ///
    /// One trailing delimiter is a terminator, not an extra page; an empty
    /// text has no pages.
    pub fn split_pages(text: &str) -> Vec<String> {
        let body = text.strip_suffix(FORM_FEED).unwrap_or(text);
        if body.is_empty() && !text.ends_with(FORM_FEED) {
            return Vec::new();
        }
        body.split(FORM_FEED).map(String::from).collect()
    }
}

impl DocumentLibrary for FormFeedLibrary {
    type Source = Vec<String>;
    type Page = String;

    fn extension(&self) -> &str {
        "txt"
    }

    fn open(&self, path: &Path) -> Result<Self::Source> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Document(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Ok(Self::split_pages(&text))
    }

    fn page_count(&self, source: &Self::Source) -> usize {
        source.len()
    }

    fn extract_text(&self, source: &Self::Source, page_index: usize) -> Result<String> {
        source
            .get(page_index)
            .cloned()
            .ok_or_else(|| Error::Document(format!("Page {} out of range", page_index)))
    }

    fn copy_page(&self, source: &Self::Source, page_index: usize) -> Result<Self::Page> {
        self.extract_text(source, page_index)
    }

    fn write(&self, pages: Vec<Self::Page>, dest: &Path) -> Result<()> {
        let mut text = pages.join("\x0c");
        text.push(FORM_FEED);
        std::fs::write(dest, text)
            .map_err(|e| Error::Document(format!("Failed to write {}: {}", dest.display(), e)))
    }
}
