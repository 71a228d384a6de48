//! Centralized default constants for packslip.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic
//! numbers.

// =============================================================================
// CLASSIFICATION
// =============================================================================

/// Literal label preceding the order number on a packing slip.
pub const ORDER_LABEL: &str = "Order ID:";

/// Header token of the product column in the item table.
pub const PRODUCT_HEADER: &str = "Product Name";

/// Header token of the item-code column in the item table.
pub const SKU_HEADER: &str = "Seller SKU";

/// Minimum digits of the tracking barcode that marks a new item.
pub const BARCODE_MIN_DIGITS: usize = 10;

/// Maximum digits of the tracking barcode that marks a new item.
pub const BARCODE_MAX_DIGITS: usize = 18;

/// Prefix of the synthetic item identifier used when nothing was extracted.
pub const UNKNOWN_ITEM_PREFIX: &str = "UNKNOWN_";

// =============================================================================
// STORAGE LAYOUT
// =============================================================================

/// Default root directory for per-job working directories.
pub const WORK_DIR: &str = "./packslip-data";

/// Subdirectory holding uploaded source documents.
pub const UPLOADS_DIR: &str = "uploads";

/// Subdirectory holding per-(order, item) intermediate artifacts.
pub const SORTED_DIR: &str = "sorted";

/// Subdirectory holding per-SKU final artifacts.
pub const CONSOLIDATED_DIR: &str = "consolidated";

/// Subdirectory holding finished archives.
pub const ZIPPED_DIR: &str = "zipped";

/// Extension of the finished archive.
pub const ARCHIVE_EXTENSION: &str = "zip";

/// Stem of the stored upload; the document library supplies the extension.
pub const UPLOAD_STEM: &str = "upload";

// =============================================================================
// PROGRESS
// =============================================================================

/// Progress reached when every page has been classified.
pub const PROGRESS_ANALYSIS_DONE: u8 = 50;

/// Progress reached when intermediate artifacts are written.
pub const PROGRESS_SPLIT_DONE: u8 = 70;

/// Progress reached when final artifacts are merged in memory.
pub const PROGRESS_CONSOLIDATE_DONE: u8 = 85;

/// Progress while the archive is being built (plateau).
pub const PROGRESS_ARCHIVING: u8 = 90;

/// Progress of a finished job.
pub const PROGRESS_DONE: u8 = 100;

// =============================================================================
// EVENTS
// =============================================================================

/// Default job event broadcast channel capacity.
pub const EVENT_BUS_CAPACITY: usize = 256;

/// Status poll interval used by the CLI (milliseconds).
pub const STATUS_POLL_INTERVAL_MS: u64 = 250;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_barcode_bounds_ordered() {
        assert!(BARCODE_MIN_DIGITS <= BARCODE_MAX_DIGITS);
    }

    #[test]
    fn test_progress_phases_ordered() {
        assert!(PROGRESS_ANALYSIS_DONE < PROGRESS_SPLIT_DONE);
        assert!(PROGRESS_SPLIT_DONE < PROGRESS_CONSOLIDATE_DONE);
        assert!(PROGRESS_CONSOLIDATE_DONE < PROGRESS_ARCHIVING);
        assert!(PROGRESS_ARCHIVING < PROGRESS_DONE);
        assert_eq!(PROGRESS_DONE, 100);
    }

    #[test]
    fn test_layout_dirs_distinct() {
        let dirs = [UPLOADS_DIR, SORTED_DIR, CONSOLIDATED_DIR, ZIPPED_DIR];
        for (i, a) in dirs.iter().enumerate() {
            for b in &dirs[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
