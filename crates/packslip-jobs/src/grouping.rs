//! Grouping engine: buckets classified pages by `(order, item)` and writes
//! one intermediate document per bucket.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use packslip_core::{DocumentLibrary, GroupKey, PageRecord, Result};

/// Pages of one bucket, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageGroup {
    pub key: GroupKey,
    pub pages: Vec<usize>,
}

/// All buckets of a document, in order of first appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageGroups {
    groups: Vec<PageGroup>,
    ungrouped: Vec<usize>,
}

impl PageGroups {
    pub fn iter(&self) -> impl Iterator<Item = &PageGroup> {
        self.groups.iter()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Page list for a bucket.
    pub fn get(&self, key: &GroupKey) -> Option<&[usize]> {
        self.groups
            .iter()
            .find(|g| &g.key == key)
            .map(|g| g.pages.as_slice())
    }

    /// Pages left out because they had no order id.
    pub fn ungrouped(&self) -> &[usize] {
        &self.ungrouped
    }
}

/// Bucket page records in a single pass.
///
/// Page indices are appended in the order the records are given and never
/// re-sorted.
pub fn group(records: &[PageRecord]) -> PageGroups {
    let mut index: HashMap<GroupKey, usize> = HashMap::new();
    let mut out = PageGroups::default();

    for record in records {
        let Some(key) = record.group_key() else {
            out.ungrouped.push(record.page_index);
            continue;
        };
        match index.get(&key) {
            Some(&slot) => out.groups[slot].pages.push(record.page_index),
            None => {
                index.insert(key.clone(), out.groups.len());
                out.groups.push(PageGroup {
                    key,
                    pages: vec![record.page_index],
                });
            }
        }
    }

    out
}

/// A per-(order, item) document written to the job's sorted directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntermediateArtifact {
    pub key: GroupKey,
    pub path: PathBuf,
}

impl IntermediateArtifact {
    /// File name of the artifact for `key`.
    pub fn file_name(key: &GroupKey, extension: &str) -> String {
        format!("{}.{}", key, extension)
    }
}

/// Write one document per bucket into `dest_dir`.
///
/// Pages that fail to copy are logged and skipped. A bucket left with no
/// pages produces no file. `on_written(done, total)` is called after each
/// bucket.
pub fn write_intermediate<L, F>(
    library: &L,
    source: &L::Source,
    groups: &PageGroups,
    dest_dir: &Path,
    mut on_written: F,
) -> Result<Vec<IntermediateArtifact>>
where
    L: DocumentLibrary,
    F: FnMut(usize, usize),
{
    let total = groups.len();
    let mut artifacts = Vec::with_capacity(total);

    for (done, group) in groups.iter().enumerate() {
        let mut pages = Vec::with_capacity(group.pages.len());
        for &page_index in &group.pages {
            match library.copy_page(source, page_index) {
                Ok(page) => pages.push(page),
                Err(e) => {
                    warn!(page_index, group_key = %group.key, error = %e, "Failed to copy page, skipping");
                }
            }
        }

        if pages.is_empty() {
            warn!(group_key = %group.key, "No pages could be copied, artifact not written");
        } else {
            let path = dest_dir.join(IntermediateArtifact::file_name(
                &group.key,
                library.extension(),
            ));
            let page_count = pages.len();
            library.write(pages, &path)?;
            debug!(group_key = %group.key, page_count, "Wrote intermediate artifact");
            artifacts.push(IntermediateArtifact {
                key: group.key.clone(),
                path,
            });
        }

        on_written(done + 1, total);
    }

    Ok(artifacts)
}

/// List intermediate artifacts persisted in `dir`, sorted by file name.
///
/// Files with another extension or without an underscore in their stem are
/// ignored.
pub fn list_intermediate(dir: &Path, extension: &str) -> Result<Vec<IntermediateArtifact>> {
    let mut artifacts = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        match GroupKey::parse(stem) {
            Some(key) => artifacts.push(IntermediateArtifact { key, path }),
            None => debug!(path = %path.display(), "Ignoring file without group key"),
        }
    }
    artifacts.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(artifacts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::FormFeedLibrary;

    fn record(page_index: usize, order: Option<&str>, item: &str) -> PageRecord {
        PageRecord {
            page_index,
            order_id: order.map(String::from),
            item_id: item.to_string(),
        }
    }

    #[test]
    fn test_group_preserves_insertion_order() {
        let records = vec![
            record(3, Some("1"), "A"),
            record(1, Some("1"), "A"),
            record(7, Some("1"), "A"),
        ];
        let groups = group(&records);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups.get(&GroupKey::new("1", "A")), Some(&[3, 1, 7][..]));
    }

    #[test]
    fn test_group_separates_keys_in_first_seen_order() {
        let records = vec![
            record(0, Some("2"), "B"),
            record(1, Some("1"), "A"),
            record(2, Some("2"), "B"),
            record(3, Some("2"), "C"),
        ];
        let groups = group(&records);
        let keys: Vec<String> = groups.iter().map(|g| g.key.to_string()).collect();
        assert_eq!(keys, vec!["2_B", "1_A", "2_C"]);
        assert_eq!(groups.get(&GroupKey::new("2", "B")), Some(&[0, 2][..]));
    }

    #[test]
    fn test_group_excludes_pages_without_order() {
        let records = vec![record(0, None, "UNKNOWN_0"), record(1, Some("5"), "X")];
        let groups = group(&records);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups.ungrouped(), &[0]);
    }

    #[test]
    fn test_group_empty() {
        let groups = group(&[]);
        assert!(groups.is_empty());
        assert!(groups.ungrouped().is_empty());
    }

    #[test]
    fn test_write_intermediate_copies_pages_in_list_order() {
        let dir = tempfile::tempdir().unwrap();
        let source_path = dir.path().join("source.txt");
        std::fs::write(&source_path, "p0\x0cp1\x0cp2\x0cp3\x0c").unwrap();

        let library = FormFeedLibrary::new();
        let source = library.open(&source_path).unwrap();
        let groups = group(&[
            record(2, Some("9"), "Z"),
            record(0, Some("9"), "Z"),
            record(1, Some("8"), "Y"),
        ]);

        let mut calls = Vec::new();
        let artifacts = write_intermediate(&library, &source, &groups, dir.path(), |d, t| {
            calls.push((d, t))
        })
        .unwrap();

        assert_eq!(artifacts.len(), 2);
        assert_eq!(calls, vec![(1, 2), (2, 2)]);

        let z = library.open(&dir.path().join("9_Z.txt")).unwrap();
        assert_eq!(z, vec!["p2".to_string(), "p0".to_string()]);
    }

    #[test]
    fn test_write_intermediate_skips_bad_pages() {
        let dir = tempfile::tempdir().unwrap();
        let source_path = dir.path().join("source.txt");
        std::fs::write(&source_path, "p0\x0cp1").unwrap();

        let library = FormFeedLibrary::new();
        let source = library.open(&source_path).unwrap();
        // Page 5 does not exist; only the bad page is dropped.
        let groups = group(&[record(5, Some("1"), "A"), record(1, Some("1"), "A")]);
        let artifacts =
            write_intermediate(&library, &source, &groups, dir.path(), |_, _| {}).unwrap();
        assert_eq!(artifacts.len(), 1);
        let written = library.open(&artifacts[0].path).unwrap();
        assert_eq!(written, vec!["p1".to_string()]);

        // A bucket made only of bad pages is not written.
        let groups = group(&[record(9, Some("2"), "B")]);
        let artifacts =
            write_intermediate(&library, &source, &groups, dir.path(), |_, _| {}).unwrap();
        assert!(artifacts.is_empty());
        assert!(!dir.path().join("2_B.txt").exists());
    }

    #[test]
    fn test_list_intermediate_filters_and_parses() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("10_SKU-1.txt"), "a").unwrap();
        std::fs::write(dir.path().join("2_SKU-2.txt"), "b").unwrap();
        std::fs::write(dir.path().join("noscore.txt"), "c").unwrap();
        std::fs::write(dir.path().join("3_SKU-3.pdf"), "d").unwrap();

        let artifacts = list_intermediate(dir.path(), "txt").unwrap();
        let keys: Vec<String> = artifacts.iter().map(|a| a.key.to_string()).collect();
        assert_eq!(keys, vec!["10_SKU-1", "2_SKU-2"]);
    }
}
