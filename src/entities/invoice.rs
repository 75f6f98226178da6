//! Invoice entity - an amount invoiced against a donor-year record.
//!
//! Invoices arrive in two ways: a first page inside the snapshot payload, and
//! incrementally through the lazy invoice loader. The `(date, created, id)`
//! triple is the keyset-pagination sort key; `id` is the deduplication key.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// An amount invoiced against a `ReportingYearRecord` in a competence year.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    /// Unique identifier of the invoice
    pub id: String,
    /// Reporting-year record the invoice consumes capacity from
    pub reporting_year_id: String,
    /// Budget allocation the invoice draws on, when the loading query
    /// populated it
    #[serde(default)]
    pub budget_allocation_id: Option<String>,
    /// Competence year the invoiced amount counts against (label)
    pub competence_year: String,
    /// Invoiced amount; absent counts as zero in sums
    #[serde(default)]
    pub amount: Option<f64>,
    /// Invoice date (first component of the keyset sort key)
    pub date: NaiveDate,
    /// Creation timestamp (second component of the keyset sort key)
    pub created: DateTime<Utc>,
    /// Donor name as displayed on the invoice, when populated
    #[serde(default)]
    pub donor_display_name: Option<String>,
}

impl InvoiceRecord {
    /// Amount with the absent-as-zero convention applied.
    #[must_use]
    pub fn amount_or_zero(&self) -> f64 {
        self.amount.unwrap_or(0.0)
    }

    /// Keyset sort key: `(date, created, id)`.
    #[must_use]
    pub fn sort_key(&self) -> (NaiveDate, DateTime<Utc>, &str) {
        (self.date, self.created, &self.id)
    }
}
