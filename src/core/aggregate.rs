//! Donor Aggregator: folds cluster rows into the displayed row set and
//! projects it for the source and destination sides.
//!
//! Without a year filter, all clusters sharing a donor display name fold
//! into one all-years row. With a year filter the fold is per donor within
//! that year, and the row is addressed by its first member record. Unassigned
//! buckets are never folded with donor rows; they keep their own identity.

use crate::core::Filters;
use crate::core::rollup::ClusterRow;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

/// Stable identity of one displayed row. Selection and preview target rows
/// through this key, so it survives re-derivation as long as the underlying
/// data does.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RowKey {
    /// Donor row under an active year filter, addressed by its first member
    /// record
    Root { reporting_year_id: String },
    /// All-years donor row, addressed by display name
    DonorAggregate { donor_name: String },
    /// Unassigned bucket for one distribution year
    UnassignedYear { year: String },
    /// Unassigned bucket for distributions without a distribution year
    UnassignedAll,
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root { reporting_year_id } => write!(f, "record {reporting_year_id}"),
            Self::DonorAggregate { donor_name } => write!(f, "donor {donor_name}"),
            Self::UnassignedYear { year } => write!(f, "unassigned {year}"),
            Self::UnassignedAll => write!(f, "unassigned (all years)"),
        }
    }
}

/// Final displayed row, donor by year or donor across all years.
#[derive(Clone, Debug, PartialEq)]
pub struct DonorRow {
    /// Row identity
    pub key: RowKey,
    /// Donor display name
    pub donor_name: String,
    /// The active year filter, `None` on all-years rows (the all-years
    /// unassigned bucket stays `None` even under a year filter)
    pub year: Option<String>,
    /// Sum of the folded clusters' distributed amounts
    pub distributed: f64,
    /// Sum of the folded clusters' invoiced amounts
    pub invoiced: f64,
    /// `distributed - invoiced`, recomputed after the fold
    pub capacity: f64,
    /// Member record ids across the folded clusters
    pub member_reporting_year_ids: Vec<String>,
    /// Accounts across the folded clusters
    pub account_ids: BTreeSet<String>,
    /// Every folded cluster is free of charge
    pub free_of_charge: bool,
    /// Row is a synthetic unassigned bucket
    pub unassigned: bool,
    /// Extra amount fields summed across the folded clusters
    pub extra: BTreeMap<String, f64>,
}

#[derive(Default)]
struct DonorFold {
    member_reporting_year_ids: Vec<String>,
    account_ids: BTreeSet<String>,
    distributed: f64,
    invoiced: f64,
    free_of_charge: bool,
    extra: BTreeMap<String, f64>,
    rows_folded: usize,
}

/// Folds cluster rows into the final aggregate set. Donor rows come out
/// sorted by display name, followed by the unassigned buckets in their
/// incoming order.
#[must_use]
pub fn aggregate_rows(rows: Vec<ClusterRow>, filters: &Filters) -> Vec<DonorRow> {
    let mut folds: BTreeMap<String, DonorFold> = BTreeMap::new();
    let mut unassigned = Vec::new();

    for row in rows {
        if row.unassigned {
            let key = match row.year.clone() {
                Some(year) => RowKey::UnassignedYear { year },
                None => RowKey::UnassignedAll,
            };
            unassigned.push(DonorRow {
                key,
                donor_name: row.donor_name,
                year: row.year,
                distributed: row.distributed,
                invoiced: row.invoiced,
                capacity: row.distributed - row.invoiced,
                member_reporting_year_ids: row.member_reporting_year_ids,
                account_ids: row.account_ids,
                free_of_charge: false,
                unassigned: true,
                extra: row.extra,
            });
            continue;
        }

        let fold = folds.entry(row.donor_name.clone()).or_default();
        fold.free_of_charge = if fold.rows_folded == 0 {
            row.free_of_charge
        } else {
            fold.free_of_charge && row.free_of_charge
        };
        fold.rows_folded += 1;
        fold.member_reporting_year_ids
            .extend(row.member_reporting_year_ids);
        fold.account_ids.extend(row.account_ids);
        fold.distributed += row.distributed;
        fold.invoiced += row.invoiced;
        for (field, amount) in row.extra {
            *fold.extra.entry(field).or_insert(0.0) += amount;
        }
    }

    let mut aggregated: Vec<DonorRow> = folds
        .into_iter()
        .map(|(donor_name, fold)| {
            let key = match (&filters.year, fold.member_reporting_year_ids.first()) {
                (Some(_), Some(first_member)) => RowKey::Root {
                    reporting_year_id: first_member.clone(),
                },
                _ => RowKey::DonorAggregate {
                    donor_name: donor_name.clone(),
                },
            };
            DonorRow {
                key,
                donor_name,
                year: filters.year.clone(),
                distributed: fold.distributed,
                invoiced: fold.invoiced,
                capacity: fold.distributed - fold.invoiced,
                member_reporting_year_ids: fold.member_reporting_year_ids,
                account_ids: fold.account_ids,
                free_of_charge: fold.free_of_charge,
                unassigned: false,
                extra: fold.extra,
            }
        })
        .collect();

    aggregated.append(&mut unassigned);
    aggregated
}

/// Source-side projection: the full aggregate set, minus free-of-charge
/// donors when the view is scoped to a single invoice context.
#[must_use]
pub fn left_rows(all: &[DonorRow], filters: &Filters) -> Vec<DonorRow> {
    all.iter()
        .filter(|row| !(filters.invoice_scoped && row.free_of_charge))
        .cloned()
        .collect()
}

/// Destination-side projection: the source-side set, additionally dropping
/// rows with no account in the eligibility set when that set is non-empty.
/// All-zero rows stay; a zero-capacity donor is still a valid target.
#[must_use]
pub fn right_rows(
    all: &[DonorRow],
    filters: &Filters,
    eligibility: &HashSet<String>,
) -> Vec<DonorRow> {
    left_rows(all, filters)
        .into_iter()
        .filter(|row| {
            eligibility.is_empty()
                || row
                    .account_ids
                    .iter()
                    .any(|account| eligibility.contains(account))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn test_no_year_filter_folds_donor_across_years() {
        let rows = vec![
            cluster_row("H1", "2023", "Alice", &["R1"], 100.0, 30.0),
            cluster_row("H1", "2024", "Alice", &["R2"], 200.0, 50.0),
        ];

        let aggregated = aggregate_rows(rows, &Filters::default());

        assert_eq!(aggregated.len(), 1);
        let row = &aggregated[0];
        assert_eq!(
            row.key,
            RowKey::DonorAggregate {
                donor_name: "Alice".to_string()
            }
        );
        assert!(row.year.is_none());
        assert_eq!(row.distributed, 300.0);
        assert_eq!(row.invoiced, 80.0);
        assert_eq!(row.capacity, 220.0);
        assert_eq!(row.member_reporting_year_ids, vec!["R1", "R2"]);
    }

    #[test]
    fn test_year_filter_keys_rows_by_first_member_record() {
        let filters = Filters {
            year: Some("2024".to_string()),
            ..Filters::default()
        };
        let rows = vec![
            cluster_row("H1", "2024", "Alice", &["R1", "R2"], 100.0, 0.0),
            cluster_row("H2", "2024", "Alice", &["R3"], 50.0, 0.0),
        ];

        let aggregated = aggregate_rows(rows, &filters);

        assert_eq!(aggregated.len(), 1);
        assert_eq!(
            aggregated[0].key,
            RowKey::Root {
                reporting_year_id: "R1".to_string()
            }
        );
        assert_eq!(aggregated[0].year.as_deref(), Some("2024"));
        assert_eq!(aggregated[0].distributed, 150.0);
    }

    #[test]
    fn test_donors_sort_by_display_name() {
        let rows = vec![
            cluster_row("H2", "2024", "Zoe", &["R2"], 10.0, 0.0),
            cluster_row("H1", "2024", "Alice", &["R1"], 20.0, 0.0),
        ];

        let aggregated = aggregate_rows(rows, &Filters::default());

        let names: Vec<&str> = aggregated.iter().map(|r| r.donor_name.as_str()).collect();
        assert_eq!(names, vec!["Alice", "Zoe"]);
    }

    #[test]
    fn test_fold_recomputes_capacity_from_sums() {
        let mut first = cluster_row("H1", "2023", "Alice", &["R1"], 100.0, 30.0);
        first.capacity = 999.0;
        let second = cluster_row("H1", "2024", "Alice", &["R2"], 200.0, 50.0);

        let aggregated = aggregate_rows(vec![first, second], &Filters::default());

        assert_eq!(aggregated[0].capacity, 220.0);
    }

    #[test]
    fn test_fold_consistency_across_years() {
        let rows = vec![
            cluster_row("H1", "2023", "Alice", &["R1"], 100.0, 30.0),
            cluster_row("H1", "2024", "Alice", &["R2"], 200.0, 50.0),
            cluster_row("H2", "2023", "Bob", &["R3"], 40.0, 10.0),
        ];
        let per_year_distributed: f64 = rows.iter().map(|r| r.distributed).sum();

        let aggregated = aggregate_rows(rows, &Filters::default());
        let folded_distributed: f64 = aggregated.iter().map(|r| r.distributed).sum();

        assert_eq!(folded_distributed, per_year_distributed);
    }

    #[test]
    fn test_unassigned_buckets_keep_their_identity() {
        let rows = vec![
            cluster_row("H1", "2024", "Alice", &["R1"], 100.0, 0.0),
            unassigned_cluster_row(Some("2023"), 150.0),
            unassigned_cluster_row(None, 75.0),
        ];

        let aggregated = aggregate_rows(rows, &Filters::default());

        assert_eq!(aggregated.len(), 3);
        assert_eq!(
            aggregated[1].key,
            RowKey::UnassignedYear {
                year: "2023".to_string()
            }
        );
        assert_eq!(aggregated[2].key, RowKey::UnassignedAll);
        assert!(aggregated[2].year.is_none());
        assert_eq!(aggregated[2].capacity, 75.0);
    }

    #[test]
    fn test_free_of_charge_only_when_every_cluster_is() {
        let mut flagged = cluster_row("H1", "2023", "Alice", &["R1"], 0.0, 0.0);
        flagged.free_of_charge = true;
        let plain = cluster_row("H1", "2024", "Alice", &["R2"], 0.0, 0.0);
        let mut both_a = cluster_row("H2", "2023", "Bob", &["R3"], 0.0, 0.0);
        both_a.free_of_charge = true;
        let mut both_b = cluster_row("H2", "2024", "Bob", &["R4"], 0.0, 0.0);
        both_b.free_of_charge = true;

        let aggregated = aggregate_rows(vec![flagged, plain, both_a, both_b], &Filters::default());

        assert!(!aggregated[0].free_of_charge);
        assert!(aggregated[1].free_of_charge);
    }

    #[test]
    fn test_left_rows_hide_free_of_charge_in_invoice_scope() {
        let mut flagged = cluster_row("H1", "2024", "Alice", &["R1"], 100.0, 0.0);
        flagged.free_of_charge = true;
        let plain = cluster_row("H2", "2024", "Bob", &["R2"], 50.0, 0.0);
        let aggregated = aggregate_rows(vec![flagged, plain], &Filters::default());

        let unscoped = left_rows(&aggregated, &Filters::default());
        assert_eq!(unscoped.len(), 2);

        let scoped_filters = Filters {
            invoice_scoped: true,
            ..Filters::default()
        };
        let scoped = left_rows(&aggregated, &scoped_filters);
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].donor_name, "Bob");
    }

    #[test]
    fn test_right_rows_apply_eligibility() {
        let mut alice = cluster_row("H1", "2024", "Alice", &["R1"], 100.0, 0.0);
        alice.account_ids = ["ACC1".to_string()].into();
        let mut bob = cluster_row("H2", "2024", "Bob", &["R2"], 0.0, 0.0);
        bob.account_ids = ["ACC2".to_string()].into();
        let rows = vec![alice, bob, unassigned_cluster_row(Some("2023"), 150.0)];
        let aggregated = aggregate_rows(rows, &Filters::default());

        let open = right_rows(&aggregated, &Filters::default(), &HashSet::new());
        assert_eq!(open.len(), 3);

        let eligibility: HashSet<String> = ["ACC2".to_string()].into();
        let narrowed = right_rows(&aggregated, &Filters::default(), &eligibility);

        // Bob has zero totals but an eligible account; the unassigned bucket
        // has no accounts at all and drops out.
        assert_eq!(narrowed.len(), 1);
        assert_eq!(narrowed[0].donor_name, "Bob");
    }
}
