//! Shared test utilities for the donor ledger.
//!
//! This module provides builders for payloads, records, and derived rows
//! with sensible defaults, plus gateway decorators for exercising paging
//! and failure behavior.

#![allow(clippy::unwrap_used)]

use crate::core::aggregate::{DonorRow, RowKey};
use crate::core::rollup::ClusterRow;
use crate::entities::{
    BudgetAllocation, DistributionRecord, InvoiceRecord, InvoiceTotal, ReportingYearRecord,
    SnapshotPayload,
};
use crate::errors::{Error, Result};
use crate::gateway::{AllocationGateway, FixtureGateway, InvoicePageQuery, SnapshotQuery};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// An empty snapshot payload to fill in per test.
#[must_use]
pub fn empty_payload() -> SnapshotPayload {
    SnapshotPayload::default()
}

/// Creates a test reporting-year record.
///
/// # Defaults
/// * `program_id`: "P1"
/// * `free_of_charge`: false
/// * `extra`: empty
#[must_use]
pub fn reporting_year(
    id: &str,
    account_id: &str,
    holding_id: Option<&str>,
    donor_name: &str,
    year: &str,
) -> ReportingYearRecord {
    ReportingYearRecord {
        id: id.to_string(),
        account_id: account_id.to_string(),
        holding_id: holding_id.map(ToString::to_string),
        donor_name: donor_name.to_string(),
        year: year.to_string(),
        program_id: "P1".to_string(),
        free_of_charge: false,
        extra: BTreeMap::new(),
    }
}

/// Creates a test budget allocation with no partner.
#[must_use]
pub fn budget_allocation(
    id: &str,
    program_id: &str,
    year: &str,
    fund_designation_id: &str,
) -> BudgetAllocation {
    BudgetAllocation {
        id: id.to_string(),
        program_id: program_id.to_string(),
        year: year.to_string(),
        fund_designation_id: fund_designation_id.to_string(),
        partner_id: None,
    }
}

/// Creates a test distribution linked to a reporting-year record.
///
/// # Defaults
/// * `distribution_year`: None
/// * `program_id`: "P1"
#[must_use]
pub fn distribution(
    id: &str,
    budget_allocation_id: &str,
    reporting_year_id: Option<&str>,
    amount: f64,
) -> DistributionRecord {
    DistributionRecord {
        id: id.to_string(),
        budget_allocation_id: budget_allocation_id.to_string(),
        reporting_year_id: reporting_year_id.map(ToString::to_string),
        amount: Some(amount),
        distribution_year: None,
        program_id: "P1".to_string(),
    }
}

/// Creates a test distribution with no reporting-year link.
#[must_use]
pub fn unassigned_distribution(
    id: &str,
    budget_allocation_id: &str,
    amount: f64,
    distribution_year: Option<&str>,
) -> DistributionRecord {
    DistributionRecord {
        distribution_year: distribution_year.map(ToString::to_string),
        ..distribution(id, budget_allocation_id, None, amount)
    }
}

/// Creates a test invoice dated 2024-01-15.
#[must_use]
pub fn invoice(id: &str, reporting_year_id: &str, competence_year: &str, amount: f64) -> InvoiceRecord {
    invoice_on(id, reporting_year_id, competence_year, amount, "2024-01-15")
}

/// Creates a test invoice on a specific date (`YYYY-MM-DD`). The creation
/// timestamp is noon of the same day, so the keyset order of same-day
/// invoices falls back to the id.
#[must_use]
pub fn invoice_on(
    id: &str,
    reporting_year_id: &str,
    competence_year: &str,
    amount: f64,
    date: &str,
) -> InvoiceRecord {
    let date: NaiveDate = date.parse().unwrap();
    InvoiceRecord {
        id: id.to_string(),
        reporting_year_id: reporting_year_id.to_string(),
        budget_allocation_id: None,
        competence_year: competence_year.to_string(),
        amount: Some(amount),
        date,
        created: date.and_hms_opt(12, 0, 0).unwrap().and_utc(),
        donor_display_name: None,
    }
}

/// Creates one entry of the server-side invoice totals index.
#[must_use]
pub fn invoice_total(reporting_year_id: &str, competence_year: &str, amount: f64) -> InvoiceTotal {
    InvoiceTotal {
        reporting_year_id: reporting_year_id.to_string(),
        competence_year: competence_year.to_string(),
        amount,
    }
}

/// Creates a regular cluster row with its capacity already consistent.
///
/// # Defaults
/// * `account_ids`: one `<member>-ACC` per member id
/// * `free_of_charge`: false
/// * `extra`: empty
#[must_use]
pub fn cluster_row(
    group_id: &str,
    year: &str,
    donor_name: &str,
    member_ids: &[&str],
    distributed: f64,
    invoiced: f64,
) -> ClusterRow {
    ClusterRow {
        group_id: Some(group_id.to_string()),
        year: Some(year.to_string()),
        donor_name: donor_name.to_string(),
        member_reporting_year_ids: member_ids.iter().map(ToString::to_string).collect(),
        account_ids: member_ids.iter().map(|id| format!("{id}-ACC")).collect(),
        distributed,
        invoiced,
        capacity: distributed - invoiced,
        free_of_charge: false,
        unassigned: false,
        extra: BTreeMap::new(),
    }
}

/// Creates a synthetic unassigned cluster row for one distribution year
/// (`None` for the all-years bucket).
#[must_use]
pub fn unassigned_cluster_row(year: Option<&str>, amount: f64) -> ClusterRow {
    ClusterRow {
        group_id: None,
        year: year.map(ToString::to_string),
        donor_name: crate::core::UNASSIGNED_DONOR_NAME.to_string(),
        member_reporting_year_ids: Vec::new(),
        account_ids: BTreeSet::new(),
        distributed: amount,
        invoiced: 0.0,
        capacity: amount,
        free_of_charge: false,
        unassigned: true,
        extra: BTreeMap::new(),
    }
}

/// Creates an all-years donor aggregate row keyed by display name.
#[must_use]
pub fn donor_row(donor_name: &str, distributed: f64, invoiced: f64) -> DonorRow {
    DonorRow {
        key: RowKey::DonorAggregate {
            donor_name: donor_name.to_string(),
        },
        donor_name: donor_name.to_string(),
        year: None,
        distributed,
        invoiced,
        capacity: distributed - invoiced,
        member_reporting_year_ids: vec![format!("{donor_name}-R")],
        account_ids: [format!("{donor_name}-ACC")].into(),
        free_of_charge: false,
        unassigned: false,
        extra: BTreeMap::new(),
    }
}

/// Gateway decorator that counts invoice page fetches.
pub struct CountingGateway {
    inner: FixtureGateway,
    page_calls: AtomicUsize,
}

/// Wraps a fixture gateway in a [`CountingGateway`].
#[must_use]
pub fn counting(inner: FixtureGateway) -> CountingGateway {
    CountingGateway {
        inner,
        page_calls: AtomicUsize::new(0),
    }
}

impl CountingGateway {
    /// Number of invoice page fetches served so far.
    #[must_use]
    pub fn page_calls(&self) -> usize {
        self.page_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AllocationGateway for CountingGateway {
    async fn fetch_snapshot(&self, query: &SnapshotQuery) -> Result<SnapshotPayload> {
        self.inner.fetch_snapshot(query).await
    }

    async fn fetch_invoice_page(&self, query: &InvoicePageQuery) -> Result<Vec<InvoiceRecord>> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch_invoice_page(query).await
    }

    async fn fetch_eligible_accounts(&self, query: &SnapshotQuery) -> Result<Vec<String>> {
        self.inner.fetch_eligible_accounts(query).await
    }
}

/// Gateway whose every call fails like a dropped connection.
pub struct FailingGateway;

/// Creates a [`FailingGateway`].
#[must_use]
pub fn failing_gateway() -> FailingGateway {
    FailingGateway
}

fn connection_reset() -> Error {
    Error::Gateway {
        message: "connection reset".to_string(),
    }
}

#[async_trait]
impl AllocationGateway for FailingGateway {
    async fn fetch_snapshot(&self, _query: &SnapshotQuery) -> Result<SnapshotPayload> {
        Err(connection_reset())
    }

    async fn fetch_invoice_page(&self, _query: &InvoicePageQuery) -> Result<Vec<InvoiceRecord>> {
        Err(connection_reset())
    }

    async fn fetch_eligible_accounts(&self, _query: &SnapshotQuery) -> Result<Vec<String>> {
        Err(connection_reset())
    }
}

/// Gateway decorator that can be switched into a failing state mid-test.
pub struct ToggleGateway {
    inner: FixtureGateway,
    failing: AtomicBool,
}

/// Wraps a fixture gateway in a [`ToggleGateway`], initially healthy.
#[must_use]
pub fn toggle(inner: FixtureGateway) -> ToggleGateway {
    ToggleGateway {
        inner,
        failing: AtomicBool::new(false),
    }
}

impl ToggleGateway {
    /// Switches the failure mode on or off.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(connection_reset())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl AllocationGateway for ToggleGateway {
    async fn fetch_snapshot(&self, query: &SnapshotQuery) -> Result<SnapshotPayload> {
        self.check()?;
        self.inner.fetch_snapshot(query).await
    }

    async fn fetch_invoice_page(&self, query: &InvoicePageQuery) -> Result<Vec<InvoiceRecord>> {
        self.check()?;
        self.inner.fetch_invoice_page(query).await
    }

    async fn fetch_eligible_accounts(&self, query: &SnapshotQuery) -> Result<Vec<String>> {
        self.check()?;
        self.inner.fetch_eligible_accounts(query).await
    }
}
