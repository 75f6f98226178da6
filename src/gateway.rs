//! Remote data access seam.
//!
//! The engine talks to the backing service exclusively through
//! [`AllocationGateway`], so the derivation pipeline can be exercised against
//! the in-memory [`FixtureGateway`] while a deployment wires in an HTTP
//! client. Invoice paging is keyset based: a page request carries the sort
//! key of the last record already seen and the server returns records
//! strictly after it.

use crate::entities::{InvoiceRecord, SnapshotPayload};
use crate::errors::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Scope of a snapshot fetch. Mirrors the session filters the server can
/// apply; `None` means the dimension is unconstrained.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotQuery {
    /// Restrict to one program
    pub program_id: Option<String>,
    /// Restrict to one fund designation
    pub fund_designation_id: Option<String>,
    /// Restrict to one year (label)
    pub year: Option<String>,
}

/// Keyset cursor for invoice paging: the sort key of the last record of the
/// previous page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceCursor {
    /// Invoice date of the last seen record
    pub date: NaiveDate,
    /// Creation timestamp of the last seen record
    pub created: DateTime<Utc>,
    /// Id of the last seen record, the final tie breaker
    pub id: String,
}

impl InvoiceCursor {
    /// Cursor pointing at the given invoice.
    #[must_use]
    pub fn after(invoice: &InvoiceRecord) -> Self {
        Self {
            date: invoice.date,
            created: invoice.created,
            id: invoice.id.clone(),
        }
    }
}

/// One invoice page request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoicePageQuery {
    /// Reporting-year record the invoices must belong to
    pub reporting_year_id: String,
    /// Restrict to one competence year when set
    pub competence_year: Option<String>,
    /// Resume after this sort key; `None` starts from the beginning
    pub cursor: Option<InvoiceCursor>,
    /// Maximum number of records to return
    pub page_size: usize,
}

/// Access to the remote allocation service.
#[async_trait]
pub trait AllocationGateway: Send + Sync {
    /// Fetches the full in-scope dataset for the given filters, with the
    /// first page of invoices inlined.
    async fn fetch_snapshot(&self, query: &SnapshotQuery) -> Result<SnapshotPayload>;

    /// Fetches one page of invoices for a single reporting-year record,
    /// ordered by `(date, created, id)` and starting strictly after the
    /// cursor when one is given.
    async fn fetch_invoice_page(&self, query: &InvoicePageQuery) -> Result<Vec<InvoiceRecord>>;

    /// Fetches the account ids currently eligible as reassignment
    /// destinations for the given scope.
    async fn fetch_eligible_accounts(&self, query: &SnapshotQuery) -> Result<Vec<String>>;
}

/// In-memory gateway over a fixed dataset. Serves the same keyset paging
/// contract as the real service, which makes it the backend for tests and
/// the demo binary.
#[derive(Clone, Debug)]
pub struct FixtureGateway {
    dataset: SnapshotPayload,
    snapshot_invoice_limit: usize,
}

impl FixtureGateway {
    /// Wraps a dataset. `dataset.invoices` is the complete invoice universe;
    /// snapshot fetches inline only the first `snapshot_invoice_limit` of
    /// them (in sort order) and the rest arrive through paging.
    #[must_use]
    pub fn new(dataset: SnapshotPayload, snapshot_invoice_limit: usize) -> Self {
        Self {
            dataset,
            snapshot_invoice_limit,
        }
    }

    /// Loads the dataset from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P, snapshot_invoice_limit: usize) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let dataset: SnapshotPayload = serde_json::from_str(&raw)?;
        Ok(Self::new(dataset, snapshot_invoice_limit))
    }

    fn sorted_invoices(&self) -> Vec<InvoiceRecord> {
        let mut invoices = self.dataset.invoices.clone();
        invoices.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        invoices
    }
}

#[async_trait]
impl AllocationGateway for FixtureGateway {
    async fn fetch_snapshot(&self, query: &SnapshotQuery) -> Result<SnapshotPayload> {
        tracing::debug!(?query, "serving fixture snapshot");
        let mut payload = self.dataset.clone();
        let mut invoices = self.sorted_invoices();
        invoices.truncate(self.snapshot_invoice_limit);
        payload.invoices = invoices;
        Ok(payload)
    }

    async fn fetch_invoice_page(&self, query: &InvoicePageQuery) -> Result<Vec<InvoiceRecord>> {
        let page: Vec<InvoiceRecord> = self
            .sorted_invoices()
            .into_iter()
            .filter(|invoice| invoice.reporting_year_id == query.reporting_year_id)
            .filter(|invoice| {
                query
                    .competence_year
                    .as_deref()
                    .is_none_or(|year| invoice.competence_year == year)
            })
            .filter(|invoice| {
                query.cursor.as_ref().is_none_or(|cursor| {
                    invoice.sort_key() > (cursor.date, cursor.created, cursor.id.as_str())
                })
            })
            .take(query.page_size)
            .collect();
        tracing::debug!(
            reporting_year_id = %query.reporting_year_id,
            records = page.len(),
            "serving fixture invoice page"
        );
        Ok(page)
    }

    async fn fetch_eligible_accounts(&self, _query: &SnapshotQuery) -> Result<Vec<String>> {
        Ok(self.dataset.eligible_destination_account_ids.clone())
    }
}
