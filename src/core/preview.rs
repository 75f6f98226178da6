//! Reassignment preview: a non-destructive overlay showing the effect of
//! moving an invoiced amount from one row to another.
//!
//! The overlay always starts from the base aggregate set. It never feeds
//! back into the snapshot or into a previous preview's output, so repeated
//! selections cannot accumulate drift.

use crate::core::aggregate::{DonorRow, RowKey};

/// Current selection state. The invoice ids and their summed amount come
/// from the caller together; the engine does not re-derive the amount from
/// the ids.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Selection {
    /// Row the amount would move away from
    pub source: Option<RowKey>,
    /// Row the amount would move onto
    pub destination: Option<RowKey>,
    /// Invoices chosen for reassignment
    pub selected_invoice_ids: Vec<String>,
    /// Sum of the chosen invoice amounts
    pub transfer_amount: f64,
}

impl Selection {
    /// A transfer is previewable once both endpoints are chosen.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.source.is_some() && self.destination.is_some()
    }
}

/// Applies the transfer to a fresh copy of the base rows. The source row's
/// invoiced sum drops by the transfer amount, the destination row's rises by
/// it, and both capacities are recomputed. Everything else is returned
/// untouched, including the base itself.
///
/// A selection pointing source and destination at the same row is a no-op,
/// not a pair of cancelling adjustments.
#[must_use]
pub fn apply_preview(base: &[DonorRow], selection: &Selection) -> Vec<DonorRow> {
    let mut rows = base.to_vec();
    let (Some(source), Some(destination)) = (&selection.source, &selection.destination) else {
        return rows;
    };
    if source == destination {
        return rows;
    }

    for row in &mut rows {
        if row.key == *source {
            row.invoiced -= selection.transfer_amount;
            row.capacity = row.distributed - row.invoiced;
        } else if row.key == *destination {
            row.invoiced += selection.transfer_amount;
            row.capacity = row.distributed - row.invoiced;
        }
    }
    rows
}
