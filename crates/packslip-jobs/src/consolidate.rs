//! Consolidation merger: one final document per canonical item id.
//!
//! Buckets are merged in ascending order id compared as strings, so order
//! `"10"` comes before order `"2"`. Downstream consumers rely on this exact
//! ordering; do not switch to numeric comparison.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use packslip_core::{DocumentLibrary, Result};

use crate::grouping::IntermediateArtifact;
use crate::resolver::CanonicalMap;

/// A consolidated per-SKU document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalArtifact {
    pub item_id: String,
    pub path: PathBuf,
    pub page_count: usize,
    /// Orders merged into this document, in merge order.
    pub orders: Vec<String>,
}

impl FinalArtifact {
    /// File name of the final artifact for `item_id`.
    pub fn file_name(item_id: &str, extension: &str) -> String {
        format!("{}.{}", item_id, extension)
    }
}

/// Bucket artifacts by canonical item id, each bucket sorted by order id.
///
/// Artifacts whose order has no canonical mapping are logged and left out.
pub fn plan<'a>(
    artifacts: &'a [IntermediateArtifact],
    canonical: &CanonicalMap,
) -> BTreeMap<String, Vec<&'a IntermediateArtifact>> {
    let mut buckets: BTreeMap<String, Vec<&IntermediateArtifact>> = BTreeMap::new();

    for artifact in artifacts {
        match canonical.get(&artifact.key.order_id) {
            Some(primary) => buckets
                .entry(primary.to_string())
                .or_default()
                .push(artifact),
            None => {
                warn!(group_key = %artifact.key, "No primary SKU for order, skipping artifact");
            }
        }
    }

    for bucket in buckets.values_mut() {
        // Stable: artifacts of the same order keep their relative order.
        bucket.sort_by(|a, b| a.key.order_id.cmp(&b.key.order_id));
    }

    buckets
}

/// Merge and write one final document per canonical item id into `dest_dir`.
///
/// Each intermediate document is opened, copied and released before the
/// next one is opened. A document that cannot be read is logged and its
/// pages are left out; a bucket with no pages produces no file.
/// `on_written(done, total)` is called after each bucket.
pub fn consolidate<L, F>(
    library: &L,
    artifacts: &[IntermediateArtifact],
    canonical: &CanonicalMap,
    dest_dir: &Path,
    mut on_written: F,
) -> Result<Vec<FinalArtifact>>
where
    L: DocumentLibrary,
    F: FnMut(usize, usize),
{
    let buckets = plan(artifacts, canonical);
    let total = buckets.len();
    let mut finals = Vec::with_capacity(total);

    for (done, (item_id, bucket)) in buckets.into_iter().enumerate() {
        let mut pages = Vec::new();
        let mut orders = Vec::new();

        for artifact in bucket {
            match copy_all_pages(library, &artifact.path) {
                Ok(copied) => {
                    pages.extend(copied);
                    orders.push(artifact.key.order_id.clone());
                }
                Err(e) => {
                    warn!(path = %artifact.path.display(), error = %e, "Failed to merge artifact, skipping");
                }
            }
        }

        if pages.is_empty() {
            debug!(item_id = %item_id, "Nothing to merge, final artifact dropped");
        } else {
            let path = dest_dir.join(FinalArtifact::file_name(&item_id, library.extension()));
            let page_count = pages.len();
            library.write(pages, &path)?;
            debug!(item_id = %item_id, page_count, orders = orders.len(), "Wrote final artifact");
            finals.push(FinalArtifact {
                item_id,
                path,
                page_count,
                orders,
            });
        }

        on_written(done + 1, total);
    }

    Ok(finals)
}

/// Copy every page of the document at `path`. The source is dropped on return.
fn copy_all_pages<L: DocumentLibrary>(library: &L, path: &Path) -> Result<Vec<L::Page>> {
    let source = library.open(path)?;
    (0..library.page_count(&source))
        .map(|index| library.copy_page(&source, index))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::FormFeedLibrary;
    use crate::resolver::resolve;
    use packslip_core::GroupKey;

    fn artifact(dir: &Path, order: &str, item: &str, pages: &[&str]) -> IntermediateArtifact {
        let key = GroupKey::new(order, item);
        let path = dir.join(format!("{}.txt", key));
        std::fs::write(&path, pages.join("\x0c")).unwrap();
        IntermediateArtifact { key, path }
    }

    #[test]
    fn test_plan_sorts_order_ids_lexicographically() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = vec![
            artifact(dir.path(), "2", "X", &["a"]),
            artifact(dir.path(), "10", "X", &["b"]),
        ];
        let canonical = resolve(["2_X", "10_X"]);
        let buckets = plan(&artifacts, &canonical);
        let orders: Vec<&str> = buckets["X"]
            .iter()
            .map(|a| a.key.order_id.as_str())
            .collect();
        assert_eq!(orders, vec!["10", "2"]);
    }

    #[test]
    fn test_plan_skips_unmapped_orders() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = vec![artifact(dir.path(), "1", "A", &["a"])];
        let buckets = plan(&artifacts, &CanonicalMap::new());
        assert!(buckets.is_empty());
    }

    #[test]
    fn test_consolidate_merges_secondary_items_into_primary() {
        let dir = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let artifacts = vec![
            artifact(dir.path(), "100", "SKU-1", &["100-a", "100-b"]),
            artifact(dir.path(), "100", "SKU-2", &["100-c"]),
            artifact(dir.path(), "101", "SKU-1", &["101-a"]),
        ];
        let canonical = resolve(["100_SKU-1", "100_SKU-2", "101_SKU-1"]);

        let library = FormFeedLibrary::new();
        let finals = consolidate(&library, &artifacts, &canonical, out.path(), |_, _| {}).unwrap();

        assert_eq!(finals.len(), 1);
        let sku1 = &finals[0];
        assert_eq!(sku1.item_id, "SKU-1");
        assert_eq!(sku1.page_count, 4);
        assert_eq!(sku1.orders, vec!["100", "100", "101"]);
        assert_eq!(sku1.path, out.path().join("SKU-1.txt"));

        let pages = library.open(&sku1.path).unwrap();
        assert_eq!(pages, vec!["100-a", "100-b", "100-c", "101-a"]);
    }

    #[test]
    fn test_consolidate_drops_unreadable_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let good = artifact(dir.path(), "1", "A", &["one"]);
        let missing = IntermediateArtifact {
            key: GroupKey::new("2", "A"),
            path: dir.path().join("2_A.txt"),
        };
        let artifacts = vec![good, missing];
        let canonical = resolve(["1_A", "2_A"]);

        let library = FormFeedLibrary::new();
        let finals = consolidate(&library, &artifacts, &canonical, out.path(), |_, _| {}).unwrap();
        assert_eq!(finals.len(), 1);
        assert_eq!(finals[0].orders, vec!["1"]);
        assert_eq!(finals[0].page_count, 1);
    }

    #[test]
    fn test_consolidate_empty_bucket_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let missing = IntermediateArtifact {
            key: GroupKey::new("1", "A"),
            path: dir.path().join("1_A.txt"),
        };
        let canonical = resolve(["1_A"]);

        let library = FormFeedLibrary::new();
        let mut calls = 0;
        let finals = consolidate(&library, &[missing], &canonical, out.path(), |_, _| calls += 1)
            .unwrap();
        assert!(finals.is_empty());
        assert_eq!(calls, 1);
        assert!(!out.path().join("A.txt").exists());
    }
}
