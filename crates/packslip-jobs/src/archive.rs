//! Archive builder: packs final artifacts into one downloadable archive.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use packslip_core::{ArchiveEntry, Archiver, Error, Result};

/// Build an archive at `dest` holding `file_names` from `source_dir`.
///
/// Files that no longer exist are skipped. Entry names are the file names
/// themselves (`<item_id>.<ext>`).
pub async fn build_archive<A>(
    archiver: &A,
    source_dir: &Path,
    file_names: &[String],
    dest: &Path,
) -> Result<PathBuf>
where
    A: Archiver + ?Sized,
{
    let mut entries = Vec::with_capacity(file_names.len());
    for name in file_names {
        let path = source_dir.join(name);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => entries.push(ArchiveEntry::new(name.clone(), path)),
            Ok(_) => warn!(path = %path.display(), "Archive source is not a file, skipping"),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Archive source missing, skipping")
            }
        }
    }

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            Error::Archive(format!("Failed to create {}: {}", parent.display(), e))
        })?;
    }

    let entry_count = entries.len();
    let path = archiver.create_archive(entries, dest).await?;
    info!(path = %path.display(), entry_count, "Archive created");
    Ok(path)
}
