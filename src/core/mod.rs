//! Derivation pipeline for the allocation table.
//!
//! Every stage here is a pure function over the current [`Snapshot`] and
//! filters: clusters are built from reporting-year records, rolled up into
//! amount-bearing rows, folded into donor aggregates, optionally overlaid
//! with a reassignment preview, and summed into header totals. Nothing in
//! this module mutates shared state; the engine owns the snapshot and calls
//! [`derive::derive_rows`] after every event.

pub mod aggregate;
pub mod cluster;
pub mod derive;
pub mod loader;
pub mod preview;
pub mod rollup;
pub mod totals;

pub use aggregate::{DonorRow, RowKey, aggregate_rows, left_rows, right_rows};
pub use cluster::{Cluster, ClusterKey, GROUP_ID_ACCOUNT_PREFIX_LEN, build_clusters, group_id};
pub use derive::{DerivedRows, derive_rows};
pub use loader::{ASSUME_COMPLETE_THRESHOLD, INVOICE_PAGE_SIZE, InvoiceLoader};
pub use preview::{Selection, apply_preview};
pub use rollup::{ClusterRow, UNASSIGNED_DONOR_NAME, rollup_rows};
pub use totals::{HeaderTotals, format_amount, header_totals};

use crate::entities::BudgetAllocation;

/// Active table filters. `None` leaves a dimension unconstrained;
/// `invoice_scoped` marks views tied to a single invoice context, which
/// hides free-of-charge donors from the source side.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Filters {
    /// Restrict to one program
    pub program_id: Option<String>,
    /// Restrict to one fund designation
    pub fund_designation_id: Option<String>,
    /// Restrict to one year (label)
    pub year: Option<String>,
    /// View is scoped to a single invoice context
    pub invoice_scoped: bool,
}

impl Filters {
    /// Whether a budget allocation passes the program, year, and fund
    /// designation dimensions.
    #[must_use]
    pub fn budget_allowed(&self, budget: &BudgetAllocation) -> bool {
        budget.matches(
            self.program_id.as_deref(),
            self.year.as_deref(),
            self.fund_designation_id.as_deref(),
        )
    }
}
