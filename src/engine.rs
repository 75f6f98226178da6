//! Allocation engine: the orchestration layer that owns all mutable state.
//!
//! Everything below this module is pure or read-only. The engine holds the
//! current snapshot, filters, selection, loader marks, and eligibility set,
//! and re-derives the displayed row sets after every event. A gateway
//! failure never leaves mixed state behind: the previous rows, filters,
//! and selection all stay in place and the error message is kept for the
//! caller to surface.

use crate::config::EngineConfig;
use crate::core::derive::{DerivedRows, derive_rows};
use crate::core::loader::InvoiceLoader;
use crate::core::preview::Selection;
use crate::core::totals::HeaderTotals;
use crate::core::{DonorRow, Filters, RowKey};
use crate::entities::Snapshot;
use crate::errors::{Error, Result};
use crate::gateway::{AllocationGateway, SnapshotQuery};
use std::collections::HashSet;

/// Long-lived session over one gateway.
pub struct AllocationEngine<G> {
    gateway: G,
    filters: Filters,
    selection: Selection,
    snapshot: Snapshot,
    loader: InvoiceLoader,
    eligibility: HashSet<String>,
    summary_fields: Vec<String>,
    derived: DerivedRows,
    last_error: Option<String>,
}

impl<G: AllocationGateway> AllocationEngine<G> {
    /// Creates an engine with empty state. Call [`Self::refresh`] to load
    /// the first snapshot.
    pub fn new(gateway: G, config: &EngineConfig) -> Self {
        Self {
            gateway,
            filters: Filters::default(),
            selection: Selection::default(),
            snapshot: Snapshot::default(),
            loader: InvoiceLoader::new(config.invoice_page_size, config.assume_loaded_threshold),
            eligibility: HashSet::new(),
            summary_fields: config.summary_fields.clone(),
            derived: DerivedRows::default(),
            last_error: None,
        }
    }

    /// Fetches a fresh snapshot for the active filters and re-derives the
    /// row sets. Completeness marks and the eligibility set belong to the
    /// snapshot, so both are rebuilt.
    ///
    /// # Errors
    /// On a gateway failure the previous snapshot and rows stay in place,
    /// the failure is recorded for [`Self::last_error`], and the error is
    /// returned.
    pub async fn refresh(&mut self) -> Result<()> {
        let query = self.snapshot_query();
        match self.gateway.fetch_snapshot(&query).await {
            Ok(payload) => {
                self.eligibility = payload
                    .eligible_destination_account_ids
                    .iter()
                    .cloned()
                    .collect();
                self.snapshot = Snapshot::from_payload(payload);
                self.loader.reset();
                self.last_error = None;
                self.rederive();
                tracing::info!(
                    records = self.snapshot.reporting_years.len(),
                    rows = self.derived.left.len(),
                    "snapshot refreshed"
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "snapshot fetch failed; keeping current rows");
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Re-fetches the destination eligibility set for the active filters
    /// and re-derives.
    ///
    /// # Errors
    /// Same failure handling as [`Self::refresh`].
    pub async fn refresh_eligibility(&mut self) -> Result<()> {
        let query = self.snapshot_query();
        match self.gateway.fetch_eligible_accounts(&query).await {
            Ok(accounts) => {
                self.eligibility = accounts.into_iter().collect();
                self.last_error = None;
                self.rederive();
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "eligibility fetch failed; keeping current set");
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Switches the program filter. The selection is dropped, since row
    /// identities do not survive a scope change.
    ///
    /// # Errors
    /// Same failure handling as [`Self::refresh`], with the filter change
    /// and the selection drop rolled back too.
    pub async fn set_program(&mut self, program_id: Option<String>) -> Result<()> {
        let mut filters = self.filters.clone();
        filters.program_id = program_id;
        self.apply_filters(filters).await
    }

    /// Switches the year filter. The selection is dropped.
    ///
    /// # Errors
    /// Same failure handling as [`Self::refresh`], with the filter change
    /// and the selection drop rolled back too.
    pub async fn set_year(&mut self, year: Option<String>) -> Result<()> {
        let mut filters = self.filters.clone();
        filters.year = year;
        self.apply_filters(filters).await
    }

    /// Switches the fund designation filter. The selection is dropped.
    ///
    /// # Errors
    /// Same failure handling as [`Self::refresh`], with the filter change
    /// and the selection drop rolled back too.
    pub async fn set_fund_designation(&mut self, fund_designation_id: Option<String>) -> Result<()> {
        let mut filters = self.filters.clone();
        filters.fund_designation_id = fund_designation_id;
        self.apply_filters(filters).await
    }

    /// Marks the view as scoped (or not) to a single invoice context. This
    /// is a presentation change only, so no fetch happens.
    pub fn set_invoice_scoped(&mut self, scoped: bool) {
        self.filters.invoice_scoped = scoped;
        self.rederive();
    }

    /// Selects the row the amount would move away from. The row's invoices
    /// are loaded first so its sums are exact before a transfer is shown.
    ///
    /// # Errors
    /// [`Error::RowNotFound`] when the key matches no source-side row; a
    /// gateway failure while loading invoices leaves the selection and rows
    /// unchanged.
    pub async fn select_source(&mut self, key: RowKey) -> Result<()> {
        let member_ids = Self::member_ids(&self.derived.left, &key)
            .ok_or_else(|| Error::RowNotFound { key: key.to_string() })?;
        self.load_members(&member_ids).await?;
        self.selection.source = Some(key);
        self.rederive();
        Ok(())
    }

    /// Selects the row the amount would move onto.
    ///
    /// # Errors
    /// [`Error::RowNotFound`] when the key matches no destination-side row;
    /// a gateway failure while loading invoices leaves the selection and
    /// rows unchanged.
    pub async fn select_destination(&mut self, key: RowKey) -> Result<()> {
        let member_ids = Self::member_ids(&self.derived.right, &key)
            .ok_or_else(|| Error::RowNotFound { key: key.to_string() })?;
        self.load_members(&member_ids).await?;
        self.selection.destination = Some(key);
        self.rederive();
        Ok(())
    }

    /// Records which invoices are chosen and their summed amount, then
    /// re-derives the preview.
    ///
    /// # Errors
    /// [`Error::InvalidAmount`] when the amount is not a finite number.
    pub fn select_invoices(&mut self, invoice_ids: Vec<String>, total_amount: f64) -> Result<()> {
        if !total_amount.is_finite() {
            return Err(Error::InvalidAmount {
                amount: total_amount,
            });
        }
        self.selection.selected_invoice_ids = invoice_ids;
        self.selection.transfer_amount = total_amount;
        self.rederive();
        Ok(())
    }

    /// Drops the whole selection and re-derives the base rows.
    pub fn clear_selection(&mut self) {
        self.selection = Selection::default();
        self.rederive();
    }

    /// Source-side rows as currently displayed.
    #[must_use]
    pub fn left_rows(&self) -> &[DonorRow] {
        &self.derived.left
    }

    /// Destination-side rows as currently displayed, preview included.
    #[must_use]
    pub fn right_rows(&self) -> &[DonorRow] {
        &self.derived.right
    }

    /// Header sums over the displayed rows.
    #[must_use]
    pub fn header_totals(&self) -> &HeaderTotals {
        &self.derived.totals
    }

    /// The active filters.
    #[must_use]
    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    /// The current selection.
    #[must_use]
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// The current snapshot. Read-only; the engine is the only writer.
    #[must_use]
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Message of the most recent gateway failure, cleared by the next
    /// successful fetch.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Reporting-year id a commit of the current source selection would
    /// target: the first member record of the selected source row.
    #[must_use]
    pub fn resolved_source_reporting_year_id(&self) -> Option<&str> {
        self.resolved_member(self.selection.source.as_ref(), &self.derived.left)
    }

    /// Reporting-year id a commit of the current destination selection
    /// would target.
    #[must_use]
    pub fn resolved_destination_reporting_year_id(&self) -> Option<&str> {
        self.resolved_member(self.selection.destination.as_ref(), &self.derived.right)
    }

    fn resolved_member<'a>(&self, key: Option<&RowKey>, rows: &'a [DonorRow]) -> Option<&'a str> {
        let key = key?;
        rows.iter()
            .find(|row| row.key == *key)
            .and_then(|row| row.member_reporting_year_ids.first())
            .map(String::as_str)
    }

    fn member_ids(rows: &[DonorRow], key: &RowKey) -> Option<Vec<String>> {
        rows.iter()
            .find(|row| row.key == *key)
            .map(|row| row.member_reporting_year_ids.clone())
    }

    // Filter changes commit only on a successful refetch; on failure the
    // previous filters and selection come back.
    async fn apply_filters(&mut self, filters: Filters) -> Result<()> {
        let prior_filters = std::mem::replace(&mut self.filters, filters);
        let prior_selection = std::mem::take(&mut self.selection);
        match self.refresh().await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.filters = prior_filters;
                self.selection = prior_selection;
                Err(e)
            }
        }
    }

    async fn load_members(&mut self, member_ids: &[String]) -> Result<()> {
        let competence_year = self.filters.year.clone();
        match self
            .loader
            .ensure_all(
                &self.gateway,
                &mut self.snapshot,
                member_ids,
                competence_year.as_deref(),
            )
            .await
        {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::warn!(error = %e, "invoice load failed; keeping current rows");
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    fn snapshot_query(&self) -> SnapshotQuery {
        SnapshotQuery {
            program_id: self.filters.program_id.clone(),
            fund_designation_id: self.filters.fund_designation_id.clone(),
            year: self.filters.year.clone(),
        }
    }

    fn rederive(&mut self) {
        self.derived = derive_rows(
            &self.snapshot,
            &self.filters,
            &self.selection,
            &self.eligibility,
            &self.summary_fields,
        );
    }
}
