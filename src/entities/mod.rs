//! Data model for the allocation ledger.
//!
//! Plain records as the gateway delivers them, plus the [`Snapshot`] that
//! holds one session's worth of them. Derivation logic lives in
//! [`crate::core`]; these types only carry data and the small link/amount
//! helpers the pipeline leans on.

mod budget;
mod distribution;
mod invoice;
mod program;
mod reporting_year;
mod snapshot;

pub use budget::{BudgetAllocation, FundDesignation};
pub use distribution::DistributionRecord;
pub use invoice::InvoiceRecord;
pub use program::Program;
pub use reporting_year::ReportingYearRecord;
pub use snapshot::{InvoiceTotal, Snapshot, SnapshotPayload};
