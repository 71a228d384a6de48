//! Deflate ZIP archiver.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use packslip_core::{ArchiveEntry, Archiver, Error, Result};

/// [`Archiver`] producing deflate-compressed ZIP files.
///
/// The archive is written next to `dest` under a `.part` suffix and renamed
/// once complete, so a partially written archive is never visible at `dest`.
#[derive(Debug, Clone, Default)]
pub struct ZipArchiver;

impl ZipArchiver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Archiver for ZipArchiver {
    async fn create_archive(&self, entries: Vec<ArchiveEntry>, dest: &Path) -> Result<PathBuf> {
        let dest = dest.to_path_buf();
        tokio::task::spawn_blocking(move || write_zip(&entries, &dest).map(|_| dest))
            .await
            .map_err(|e| Error::Archive(format!("Archive task failed: {}", e)))?
    }
}

fn write_zip(entries: &[ArchiveEntry], dest: &Path) -> Result<()> {
    let partial = dest.with_extension("zip.part");
    let result = write_entries(entries, &partial).and_then(|_| {
        std::fs::rename(&partial, dest)
            .map_err(|e| Error::Archive(format!("Failed to finalize {}: {}", dest.display(), e)))
    });
    if result.is_err() {
        let _ = std::fs::remove_file(&partial);
    }
    result
}

fn write_entries(entries: &[ArchiveEntry], path: &Path) -> Result<()> {
    let file = File::create(path)
        .map_err(|e| Error::Archive(format!("Failed to create {}: {}", path.display(), e)))?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in entries {
        let mut source = File::open(&entry.source_path).map_err(|e| {
            Error::Archive(format!("Failed to open {}: {}", entry.source_path.display(), e))
        })?;
        zip.start_file(entry.name.as_str(), options)
            .map_err(|e| Error::Archive(format!("Failed to add {}: {}", entry.name, e)))?;
        let bytes = std::io::copy(&mut source, &mut zip)
            .map_err(|e| Error::Archive(format!("Failed to write {}: {}", entry.name, e)))?;
        debug!(entry = %entry.name, bytes, "Added archive entry");
    }

    zip.finish()
        .map_err(|e| Error::Archive(format!("Failed to finish {}: {}", path.display(), e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn read_entries(path: &Path) -> Vec<(String, Vec<u8>)> {
        let mut archive = ::zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
        (0..archive.len())
            .map(|i| {
                let mut file = archive.by_index(i).unwrap();
                let mut content = Vec::new();
                file.read_to_end(&mut content).unwrap();
                (file.name().to_string(), content)
            })
            .collect()
    }

    #[tokio::test]
    async fn test_create_archive() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("A-1.pdf");
        let b = dir.path().join("B-2.pdf");
        std::fs::write(&a, b"first").unwrap();
        std::fs::write(&b, b"second").unwrap();
        let dest = dir.path().join("slips.zip");

        let entries = vec![
            ArchiveEntry::new("A-1.pdf", a),
            ArchiveEntry::new("B-2.pdf", b),
        ];
        let path = ZipArchiver::new().create_archive(entries, &dest).await.unwrap();

        assert_eq!(path, dest);
        assert!(!dir.path().join("slips.zip.part").exists());
        assert_eq!(
            read_entries(&dest),
            vec![
                ("A-1.pdf".to_string(), b"first".to_vec()),
                ("B-2.pdf".to_string(), b"second".to_vec()),
            ]
        );
    }

    #[tokio::test]
    async fn test_create_empty_archive() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("empty.zip");
        ZipArchiver::new().create_archive(Vec::new(), &dest).await.unwrap();
        assert!(read_entries(&dest).is_empty());
    }

    #[tokio::test]
    async fn test_missing_source_fails_without_leaving_files() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.zip");
        let entries = vec![ArchiveEntry::new("X.pdf", dir.path().join("gone.pdf"))];

        let err = ZipArchiver::new().create_archive(entries, &dest).await.unwrap_err();
        assert!(matches!(err, Error::Archive(_)));
        assert!(!dest.exists());
        assert!(!dir.path().join("out.zip.part").exists());
    }
}
