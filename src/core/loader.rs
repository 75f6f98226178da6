//! Lazy invoice loading.
//!
//! Rollups only see invoices that are in the snapshot. This loader brings a
//! record's invoices in on demand and remembers which records are complete,
//! so selection flows do not refetch data they already have. The marks are
//! only valid for the snapshot they were made against; the engine resets
//! the loader whenever it replaces the snapshot.

use crate::entities::Snapshot;
use crate::errors::Result;
use crate::gateway::{AllocationGateway, InvoiceCursor, InvoicePageQuery};
use std::collections::HashSet;

/// Invoice records requested per page.
pub const INVOICE_PAGE_SIZE: usize = 200;

/// Local invoice count above which a never-paged record is assumed fully
/// loaded. This is a heuristic, not a guarantee: a record crossing the
/// threshold through a partial bulk load is treated as complete even if the
/// server holds more, until the snapshot is next replaced.
pub const ASSUME_COMPLETE_THRESHOLD: usize = 20;

/// Pages invoices into the snapshot and tracks completeness per
/// reporting-year record.
#[derive(Debug)]
pub struct InvoiceLoader {
    page_size: usize,
    assume_complete_threshold: usize,
    fully_loaded: HashSet<String>,
}

impl Default for InvoiceLoader {
    fn default() -> Self {
        Self::new(INVOICE_PAGE_SIZE, ASSUME_COMPLETE_THRESHOLD)
    }
}

impl InvoiceLoader {
    /// Creates a loader with explicit paging knobs.
    #[must_use]
    pub fn new(page_size: usize, assume_complete_threshold: usize) -> Self {
        Self {
            page_size,
            assume_complete_threshold,
            fully_loaded: HashSet::new(),
        }
    }

    /// Whether a record is currently marked fully loaded.
    #[must_use]
    pub fn is_fully_loaded(&self, reporting_year_id: &str) -> bool {
        self.fully_loaded.contains(reporting_year_id)
    }

    /// Forgets every completeness mark. Called when the snapshot the marks
    /// were made against is replaced.
    pub fn reset(&mut self) {
        self.fully_loaded.clear();
    }

    /// Ensures every invoice for one record is present in the snapshot.
    ///
    /// Returns immediately when the record is already marked, or marks it
    /// without fetching when enough invoices are already present locally.
    /// Otherwise pages through the gateway with a keyset cursor until a
    /// short page arrives. Every fetched page is deduplicated by id on
    /// append.
    ///
    /// # Errors
    /// Propagates gateway failures. The record stays unmarked in that case,
    /// so the next call starts over; pages appended before the failure
    /// remain in the snapshot and are deduplicated on retry.
    pub async fn ensure_loaded<G: AllocationGateway>(
        &mut self,
        gateway: &G,
        snapshot: &mut Snapshot,
        reporting_year_id: &str,
        competence_year: Option<&str>,
    ) -> Result<()> {
        if self.is_fully_loaded(reporting_year_id) {
            return Ok(());
        }
        if snapshot.invoice_count_for(reporting_year_id) > self.assume_complete_threshold {
            tracing::debug!(
                reporting_year_id,
                threshold = self.assume_complete_threshold,
                "assuming invoices complete from local count"
            );
            self.fully_loaded.insert(reporting_year_id.to_string());
            return Ok(());
        }

        let mut cursor: Option<InvoiceCursor> = None;
        let mut pages = 0usize;
        loop {
            let query = InvoicePageQuery {
                reporting_year_id: reporting_year_id.to_string(),
                competence_year: competence_year.map(ToString::to_string),
                cursor: cursor.take(),
                page_size: self.page_size,
            };
            let page = gateway.fetch_invoice_page(&query).await?;
            pages += 1;
            let fetched = page.len();
            cursor = page.last().map(InvoiceCursor::after);
            snapshot.append_invoices(page);
            if fetched < self.page_size {
                break;
            }
        }
        tracing::debug!(reporting_year_id, pages, "invoice load complete");
        self.fully_loaded.insert(reporting_year_id.to_string());
        Ok(())
    }

    /// Ensures a batch of records is loaded, strictly one at a time in list
    /// order so the snapshot mutations stay serialized.
    ///
    /// # Errors
    /// Stops at the first gateway failure; records already processed keep
    /// their marks.
    pub async fn ensure_all<G: AllocationGateway>(
        &mut self,
        gateway: &G,
        snapshot: &mut Snapshot,
        reporting_year_ids: &[String],
        competence_year: Option<&str>,
    ) -> Result<()> {
        for reporting_year_id in reporting_year_ids {
            self.ensure_loaded(gateway, snapshot, reporting_year_id, competence_year)
                .await?;
        }
        Ok(())
    }
}
