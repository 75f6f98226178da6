//! Header totals over the displayed rows, plus the currency display format.

use crate::core::aggregate::DonorRow;
use std::collections::BTreeMap;

/// Sums shown in the table header.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HeaderTotals {
    /// Total distributed across the displayed rows
    pub distributed: f64,
    /// Total invoiced across the displayed rows
    pub invoiced: f64,
    /// Total capacity across the displayed rows
    pub capacity: f64,
    /// Configured summary fields, each summed across the displayed rows
    pub extra: BTreeMap<String, f64>,
}

/// Sums the destination-side rows, falling back to the source side when the
/// destination side is empty. Configured summary fields always appear in
/// the output, summing absent values as zero.
#[must_use]
pub fn header_totals(
    right: &[DonorRow],
    left: &[DonorRow],
    summary_fields: &[String],
) -> HeaderTotals {
    let displayed = if right.is_empty() { left } else { right };

    let mut totals = HeaderTotals::default();
    for row in displayed {
        totals.distributed += row.distributed;
        totals.invoiced += row.invoiced;
        totals.capacity += row.capacity;
    }
    for field in summary_fields {
        let sum: f64 = displayed
            .iter()
            .map(|row| row.extra.get(field).copied().unwrap_or(0.0))
            .sum();
        totals.extra.insert(field.clone(), sum);
    }
    totals
}

/// Formats a currency amount for display.
///
/// # Returns
/// Formatted string like "$1234.50" or "-$25.00"
#[must_use]
pub fn format_amount(amount: f64) -> String {
    if amount < 0.0 {
        format!("-${:.2}", amount.abs())
    } else {
        format!("${amount:.2}")
    }
}
