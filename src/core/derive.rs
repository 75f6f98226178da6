//! One-shot derivation of everything the table displays.
//!
//! This is the single entry point the engine calls after every event. It is
//! pure: given the same snapshot, filters, selection, and eligibility set it
//! produces identical output, and it never writes anything back.

use crate::core::Filters;
use crate::core::aggregate::{self, DonorRow, aggregate_rows};
use crate::core::cluster::build_clusters;
use crate::core::preview::{Selection, apply_preview};
use crate::core::rollup::rollup_rows;
use crate::core::totals::{HeaderTotals, header_totals};
use crate::entities::Snapshot;
use std::collections::HashSet;

/// The derived products of one pipeline run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DerivedRows {
    /// Source-side rows, always showing the base amounts
    pub left: Vec<DonorRow>,
    /// Destination-side rows, with the preview overlay applied
    pub right: Vec<DonorRow>,
    /// Header sums over the destination side (or the source side when the
    /// destination side is empty)
    pub totals: HeaderTotals,
}

/// Runs cluster building, rollup, aggregation, the preview overlay, the two
/// visibility projections, and the header totals.
#[must_use]
pub fn derive_rows(
    snapshot: &Snapshot,
    filters: &Filters,
    selection: &Selection,
    eligibility: &HashSet<String>,
    summary_fields: &[String],
) -> DerivedRows {
    let clusters = build_clusters(snapshot, filters);
    let rows = rollup_rows(snapshot, clusters, filters);
    let aggregated = aggregate_rows(rows, filters);

    let left = aggregate::left_rows(&aggregated, filters);
    let previewed = apply_preview(&aggregated, selection);
    let right = aggregate::right_rows(&previewed, filters, eligibility);
    let totals = header_totals(&right, &left, summary_fields);

    tracing::trace!(
        left = left.len(),
        right = right.len(),
        "derived row sets"
    );
    DerivedRows { left, right, totals }
}
