//! Snapshot - the immutable in-session copy of all loaded records.
//!
//! A `Snapshot` is built once from a gateway payload and then only ever
//! appended to (invoice pages) or replaced wholesale (filter change) by the
//! engine. The derivation pipeline reads it and never writes back. Invoice
//! deduplication happens here, at the single point where records enter the
//! set, so duplicate ids are resolved silently before any sum sees them.

use crate::entities::{
    BudgetAllocation, DistributionRecord, FundDesignation, InvoiceRecord, Program,
    ReportingYearRecord,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// One entry of the server-side pre-aggregated invoice totals index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvoiceTotal {
    /// Reporting-year record the total belongs to
    pub reporting_year_id: String,
    /// Competence year the total covers (label)
    pub competence_year: String,
    /// Sum of all invoice amounts for that record and year
    pub amount: f64,
}

/// The flat relational payload a snapshot fetch returns. Every list is
/// optional in the wire format; absent lists deserialize as empty.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotPayload {
    /// Programs visible to the session
    #[serde(default)]
    pub programs: Vec<Program>,
    /// Years with any data (labels)
    #[serde(default)]
    pub years: Vec<String>,
    /// Fund designations referenced by the budgets
    #[serde(default)]
    pub fund_designations: Vec<FundDesignation>,
    /// Budget allocations in scope
    #[serde(default)]
    pub budget_allocations: Vec<BudgetAllocation>,
    /// Donor-year records in scope
    #[serde(default)]
    pub reporting_years: Vec<ReportingYearRecord>,
    /// Distribution records in scope
    #[serde(default)]
    pub distributions: Vec<DistributionRecord>,
    /// First page of invoices
    #[serde(default)]
    pub invoices: Vec<InvoiceRecord>,
    /// Server-side pre-aggregated invoice totals
    #[serde(default)]
    pub invoice_totals: Vec<InvoiceTotal>,
    /// Accounts eligible as reassignment destinations for the queried scope
    #[serde(default)]
    pub eligible_destination_account_ids: Vec<String>,
}

/// In-session snapshot: the payload records plus lookup and dedup indexes.
///
/// Record vectors keep their payload order; the cluster builder relies on it
/// for the last-seen donor-name fallback.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    /// Programs visible to the session
    pub programs: Vec<Program>,
    /// Years with any data (labels)
    pub years: Vec<String>,
    /// Fund designations referenced by the budgets
    pub fund_designations: Vec<FundDesignation>,
    /// Budget allocations in scope
    pub budget_allocations: Vec<BudgetAllocation>,
    /// Donor-year records in scope
    pub reporting_years: Vec<ReportingYearRecord>,
    /// Distribution records in scope
    pub distributions: Vec<DistributionRecord>,
    /// Accounts eligible as reassignment destinations, as delivered with the
    /// payload
    pub eligible_destination_account_ids: Vec<String>,

    invoices: Vec<InvoiceRecord>,
    invoice_ids: HashSet<String>,
    invoice_counts: HashMap<String, usize>,
    invoice_totals: HashMap<String, BTreeMap<String, f64>>,
    reporting_year_index: HashMap<String, usize>,
    budget_index: HashMap<String, usize>,
}

impl Snapshot {
    /// Builds a snapshot from a gateway payload, deduplicating invoices by id
    /// and indexing records for constant-time link resolution.
    #[must_use]
    pub fn from_payload(payload: SnapshotPayload) -> Self {
        let reporting_year_index = payload
            .reporting_years
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id.clone(), i))
            .collect();
        let budget_index = payload
            .budget_allocations
            .iter()
            .enumerate()
            .map(|(i, b)| (b.id.clone(), i))
            .collect();
        let mut invoice_totals: HashMap<String, BTreeMap<String, f64>> = HashMap::new();
        for total in payload.invoice_totals {
            invoice_totals
                .entry(total.reporting_year_id)
                .or_default()
                .insert(total.competence_year, total.amount);
        }

        let mut snapshot = Self {
            programs: payload.programs,
            years: payload.years,
            fund_designations: payload.fund_designations,
            budget_allocations: payload.budget_allocations,
            reporting_years: payload.reporting_years,
            distributions: payload.distributions,
            eligible_destination_account_ids: payload.eligible_destination_account_ids,
            invoices: Vec::new(),
            invoice_ids: HashSet::new(),
            invoice_counts: HashMap::new(),
            invoice_totals,
            reporting_year_index,
            budget_index,
        };
        snapshot.append_invoices(payload.invoices);
        snapshot
    }

    /// All invoices currently loaded, in arrival order.
    #[must_use]
    pub fn invoices(&self) -> &[InvoiceRecord] {
        &self.invoices
    }

    /// Appends a page of invoices, skipping every id already present.
    /// Returns how many records were actually new.
    pub fn append_invoices(&mut self, page: Vec<InvoiceRecord>) -> usize {
        let mut appended = 0;
        for invoice in page {
            if !self.invoice_ids.insert(invoice.id.clone()) {
                continue;
            }
            *self
                .invoice_counts
                .entry(invoice.reporting_year_id.clone())
                .or_insert(0) += 1;
            self.invoices.push(invoice);
            appended += 1;
        }
        appended
    }

    /// Number of locally present invoices for one reporting-year id.
    #[must_use]
    pub fn invoice_count_for(&self, reporting_year_id: &str) -> usize {
        self.invoice_counts
            .get(reporting_year_id)
            .copied()
            .unwrap_or(0)
    }

    /// Looks up a reporting-year record by id.
    #[must_use]
    pub fn reporting_year(&self, id: &str) -> Option<&ReportingYearRecord> {
        self.reporting_year_index
            .get(id)
            .map(|&i| &self.reporting_years[i])
    }

    /// Looks up a budget allocation by id.
    #[must_use]
    pub fn budget(&self, id: &str) -> Option<&BudgetAllocation> {
        self.budget_index
            .get(id)
            .map(|&i| &self.budget_allocations[i])
    }

    /// Server-supplied pre-aggregated invoice total for one record and
    /// competence year, when the index carries it.
    #[must_use]
    pub fn server_invoice_total(&self, reporting_year_id: &str, year: &str) -> Option<f64> {
        self.invoice_totals
            .get(reporting_year_id)
            .and_then(|by_year| by_year.get(year))
            .copied()
    }

    /// All server-supplied year buckets for one record, ordered by year.
    #[must_use]
    pub fn server_invoice_totals_for(
        &self,
        reporting_year_id: &str,
    ) -> Option<&BTreeMap<String, f64>> {
        self.invoice_totals.get(reporting_year_id)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn test_from_payload_deduplicates_invoices() {
        let mut payload = empty_payload();
        payload.invoices = vec![
            invoice("I1", "R1", "2024", 100.0),
            invoice("I1", "R1", "2024", 100.0),
            invoice("I2", "R1", "2024", 50.0),
        ];

        let snapshot = Snapshot::from_payload(payload);

        assert_eq!(snapshot.invoices().len(), 2);
        assert_eq!(snapshot.invoice_count_for("R1"), 2);
    }

    #[test]
    fn test_append_invoices_skips_known_ids() {
        let mut payload = empty_payload();
        payload.invoices = vec![invoice("I1", "R1", "2024", 100.0)];
        let mut snapshot = Snapshot::from_payload(payload);

        let appended = snapshot.append_invoices(vec![
            invoice("I1", "R1", "2024", 100.0),
            invoice("I2", "R2", "2024", 25.0),
        ]);

        assert_eq!(appended, 1);
        assert_eq!(snapshot.invoices().len(), 2);
        assert_eq!(snapshot.invoice_count_for("R1"), 1);
        assert_eq!(snapshot.invoice_count_for("R2"), 1);
    }

    #[test]
    fn test_record_lookups() {
        let mut payload = empty_payload();
        payload.reporting_years = vec![reporting_year("R1", "ACC1", None, "Alice", "2024")];
        payload.budget_allocations = vec![budget_allocation("B1", "P1", "2024", "F1")];
        let snapshot = Snapshot::from_payload(payload);

        assert_eq!(snapshot.reporting_year("R1").unwrap().donor_name, "Alice");
        assert_eq!(snapshot.budget("B1").unwrap().year, "2024");
        assert!(snapshot.reporting_year("R9").is_none());
        assert!(snapshot.budget("B9").is_none());
    }

    #[test]
    fn test_server_invoice_total_lookup() {
        let mut payload = empty_payload();
        payload.invoice_totals = vec![InvoiceTotal {
            reporting_year_id: "R1".to_string(),
            competence_year: "2024".to_string(),
            amount: 300.0,
        }];
        let snapshot = Snapshot::from_payload(payload);

        assert_eq!(snapshot.server_invoice_total("R1", "2024"), Some(300.0));
        assert_eq!(snapshot.server_invoice_total("R1", "2023"), None);
        assert_eq!(snapshot.server_invoice_total("R2", "2024"), None);
    }

    #[test]
    fn test_server_invoice_totals_for_lists_year_buckets() {
        let mut payload = empty_payload();
        payload.invoice_totals = vec![
            InvoiceTotal {
                reporting_year_id: "R1".to_string(),
                competence_year: "2024".to_string(),
                amount: 300.0,
            },
            InvoiceTotal {
                reporting_year_id: "R1".to_string(),
                competence_year: "2023".to_string(),
                amount: 120.0,
            },
        ];
        let snapshot = Snapshot::from_payload(payload);

        let buckets = snapshot.server_invoice_totals_for("R1").unwrap();
        let years: Vec<&str> = buckets.keys().map(String::as_str).collect();
        assert_eq!(years, vec!["2023", "2024"]);
        assert!(snapshot.server_invoice_totals_for("R2").is_none());
    }

    #[test]
    fn test_invoice_count_for_unknown_id_is_zero() {
        let snapshot = Snapshot::from_payload(empty_payload());
        assert_eq!(snapshot.invoice_count_for("R1"), 0);
    }
}
