//! The four synchronous passes of a job: analyze, split, resolve, consolidate.
//!
//! Runs on a blocking thread. Progress goes through the [`JobContext`]:
//!
//! | Range | Pass |
//! |-------|------|
//! | 0–50 | page analysis, per page |
//! | 50–70 | splitting into intermediate documents |
//! | 70–75 | resolving primary SKUs |
//! | 75–85 | consolidation |
//!
//! Archiving (90–100) happens afterwards in the job manager.

use std::path::Path;
use std::time::Instant;

use tracing::{debug, info, warn};

use packslip_core::defaults::{PROGRESS_ANALYSIS_DONE, PROGRESS_CONSOLIDATE_DONE, PROGRESS_SPLIT_DONE};
use packslip_core::{DocumentLibrary, Error, PageRecord, Result};

use crate::classifier::{CarryState, PageClassifier};
use crate::consolidate::{consolidate, FinalArtifact};
use crate::context::JobContext;
use crate::grouping::{group, list_intermediate, write_intermediate, IntermediateArtifact, PageGroups};
use crate::layout::JobLayout;
use crate::resolver::{resolve_keys, CanonicalMap};

/// Progress at which consolidation starts.
const PROGRESS_RESOLVE_DONE: u8 = 75;

/// Everything the passes produced.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub page_count: usize,
    pub records: Vec<PageRecord>,
    pub groups: PageGroups,
    pub intermediate: Vec<IntermediateArtifact>,
    pub canonical: CanonicalMap,
    pub finals: Vec<FinalArtifact>,
}

impl PipelineOutput {
    /// File names of the final artifacts, in item id order.
    pub fn file_names(&self) -> Vec<String> {
        self.finals
            .iter()
            .filter_map(|f| f.path.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect()
    }
}

/// Run passes 1–4 for the document at `source_path`.
///
/// Fails fast with [`Error::EmptyDocument`] before any progress is reported
/// when the document has no pages.
pub fn run_pipeline<L: DocumentLibrary>(
    library: &L,
    classifier: &PageClassifier,
    source_path: &Path,
    layout: &JobLayout,
    ctx: &JobContext,
) -> Result<PipelineOutput> {
    let start = Instant::now();
    let job_id = ctx.job_id;

    // The source stays open for analysis and splitting only.
    let (page_count, records, groups, intermediate) = {
        let source = library.open(source_path)?;
        let page_count = library.page_count(&source);
        if page_count == 0 {
            return Err(Error::EmptyDocument(
                source_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| source_path.display().to_string()),
            ));
        }

        // --- Pass 1: classify every page ---
        ctx.report_progress(0, Some("Analyzing pages..."));
        let mut carry = CarryState::default();
        let mut records = Vec::with_capacity(page_count);
        for page_index in 0..page_count {
            let text = library
                .extract_text(&source, page_index)
                .unwrap_or_else(|e| {
                    warn!(%job_id, page_index, error = %e, "Text extraction failed, treating page as blank");
                    String::new()
                });
            let (record, next) = classifier.classify(page_index, &text, &carry);
            carry = next;
            records.push(record);
            ctx.report_phase(0, PROGRESS_ANALYSIS_DONE, page_index + 1, page_count);
        }

        // --- Pass 2: split into per-(order, item) documents ---
        ctx.report_progress(PROGRESS_ANALYSIS_DONE, Some("Splitting files..."));
        let groups = group(&records);
        info!(
            %job_id,
            page_count,
            group_count = groups.len(),
            ungrouped = groups.ungrouped().len(),
            "Page analysis complete"
        );
        let intermediate =
            write_intermediate(library, &source, &groups, &layout.sorted, |done, total| {
                ctx.report_phase(PROGRESS_ANALYSIS_DONE, PROGRESS_SPLIT_DONE, done, total)
            })?;

        (page_count, records, groups, intermediate)
    };

    // --- Pass 3: primary SKU per order, from what was persisted ---
    ctx.report_progress(PROGRESS_SPLIT_DONE, Some("Mapping primary SKUs..."));
    let persisted = list_intermediate(&layout.sorted, library.extension())?;
    let canonical = resolve_keys(persisted.iter().map(|a| &a.key));
    debug!(%job_id, orders = canonical.len(), "Resolved primary SKUs");

    // --- Pass 4: merge per primary SKU ---
    ctx.report_progress(PROGRESS_RESOLVE_DONE, Some("Consolidating by primary SKU..."));
    let finals = consolidate(
        library,
        &persisted,
        &canonical,
        &layout.consolidated,
        |done, total| ctx.report_phase(PROGRESS_RESOLVE_DONE, PROGRESS_CONSOLIDATE_DONE, done, total),
    )?;

    info!(
        %job_id,
        page_count,
        artifact_count = finals.len(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Consolidation complete"
    );

    Ok(PipelineOutput {
        page_count,
        records,
        groups,
        intermediate,
        canonical,
        finals,
    })
}
