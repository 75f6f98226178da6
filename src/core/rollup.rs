//! Rollup Calculator: attaches amounts to clusters and folds unassigned
//! distributions into synthetic buckets.
//!
//! `distributed` sums the linked distributions whose budget allocation
//! passes the filters. `invoiced` prefers the server-supplied per-year
//! totals index and falls back to locally loaded invoices bucket by bucket,
//! so a lazily loaded page refines exactly the buckets the index does not
//! cover. `capacity` is always recomputed as the difference, never summed
//! on its own. Records pointing at ids absent from the snapshot are
//! excluded from the sums; the snapshot is a filtered view and a dangling
//! link is not an error here.

use crate::core::Filters;
use crate::core::cluster::{Cluster, ClusterKey};
use crate::entities::{DistributionRecord, Snapshot};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Donor name displayed on the synthetic unassigned buckets.
pub const UNASSIGNED_DONOR_NAME: &str = "UNASSIGNED";

/// One cluster with its rolled-up amounts, ready for donor aggregation.
/// Synthetic unassigned buckets carry no group, members, or accounts.
#[derive(Clone, Debug, PartialEq)]
pub struct ClusterRow {
    /// Cluster group id; `None` for the unassigned buckets
    pub group_id: Option<String>,
    /// Cluster year; `None` for the all-years unassigned bucket
    pub year: Option<String>,
    /// Donor display name
    pub donor_name: String,
    /// Member record ids, in snapshot order
    pub member_reporting_year_ids: Vec<String>,
    /// Accounts of the member records
    pub account_ids: BTreeSet<String>,
    /// Sum of allowed linked distribution amounts
    pub distributed: f64,
    /// Sum of invoice amounts for the members
    pub invoiced: f64,
    /// `distributed - invoiced`
    pub capacity: f64,
    /// The cluster's name donor is a free-of-charge account
    pub free_of_charge: bool,
    /// Row is a synthetic unassigned bucket
    pub unassigned: bool,
    /// Extra amount fields summed across members
    pub extra: BTreeMap<String, f64>,
}

/// Rolls every cluster up into an amount-bearing row, then appends the
/// unassigned buckets. Row order follows the cluster key order, so repeated
/// runs over the same snapshot produce identical float sums.
#[must_use]
pub fn rollup_rows(
    snapshot: &Snapshot,
    clusters: BTreeMap<ClusterKey, Cluster>,
    filters: &Filters,
) -> Vec<ClusterRow> {
    let mut linked: HashMap<&str, Vec<&DistributionRecord>> = HashMap::new();
    for distribution in &snapshot.distributions {
        if let Some(reporting_year_id) = distribution.reporting_year_id.as_deref() {
            linked
                .entry(reporting_year_id)
                .or_default()
                .push(distribution);
        }
    }

    let mut local_sums: HashMap<&str, BTreeMap<&str, f64>> = HashMap::new();
    for invoice in snapshot.invoices() {
        *local_sums
            .entry(invoice.reporting_year_id.as_str())
            .or_default()
            .entry(invoice.competence_year.as_str())
            .or_insert(0.0) += invoice.amount_or_zero();
    }

    let mut rows = Vec::with_capacity(clusters.len());
    for (key, cluster) in clusters {
        let mut distributed = 0.0;
        for member_id in &cluster.member_reporting_year_ids {
            for distribution in linked.get(member_id.as_str()).into_iter().flatten() {
                let Some(budget) = snapshot.budget(&distribution.budget_allocation_id) else {
                    tracing::debug!(
                        distribution_id = %distribution.id,
                        budget_allocation_id = %distribution.budget_allocation_id,
                        "skipping distribution with unknown budget allocation"
                    );
                    continue;
                };
                if filters.budget_allowed(budget) {
                    distributed += distribution.amount_or_zero();
                }
            }
        }

        let invoiced: f64 = cluster
            .member_reporting_year_ids
            .iter()
            .map(|member_id| {
                invoiced_for(snapshot, &local_sums, member_id, filters.year.as_deref())
            })
            .sum();

        rows.push(ClusterRow {
            group_id: Some(key.group_id),
            year: Some(key.year),
            donor_name: cluster.donor_name,
            member_reporting_year_ids: cluster.member_reporting_year_ids,
            account_ids: cluster.account_ids,
            distributed,
            invoiced,
            capacity: distributed - invoiced,
            free_of_charge: cluster.free_of_charge,
            unassigned: false,
            extra: cluster.extra,
        });
    }

    rows.extend(unassigned_rows(snapshot, filters));
    rows
}

/// Invoiced sum for one member record. With a year filter only that year's
/// bucket counts; otherwise every known bucket does. Within a bucket the
/// server index wins over the locally loaded invoices.
fn invoiced_for(
    snapshot: &Snapshot,
    local_sums: &HashMap<&str, BTreeMap<&str, f64>>,
    member_id: &str,
    selected_year: Option<&str>,
) -> f64 {
    let bucket = |year: &str| {
        snapshot
            .server_invoice_total(member_id, year)
            .unwrap_or_else(|| {
                local_sums
                    .get(member_id)
                    .and_then(|by_year| by_year.get(year))
                    .copied()
                    .unwrap_or(0.0)
            })
    };

    match selected_year {
        Some(year) => bucket(year),
        None => {
            let mut years: BTreeSet<&str> = BTreeSet::new();
            if let Some(totals) = snapshot.server_invoice_totals_for(member_id) {
                years.extend(totals.keys().map(String::as_str));
            }
            if let Some(local) = local_sums.get(member_id) {
                years.extend(local.keys().copied());
            }
            years.into_iter().map(bucket).sum()
        }
    }
}

/// Folds distributions with no reporting-year link into synthetic buckets:
/// one per distribution year, or a single collapsed bucket when a year
/// filter is active. Only non-zero buckets become rows; the spilled bucket
/// for distributions without a distribution year goes last.
fn unassigned_rows(snapshot: &Snapshot, filters: &Filters) -> Vec<ClusterRow> {
    let mut buckets: BTreeMap<Option<String>, f64> = BTreeMap::new();
    for distribution in &snapshot.distributions {
        if !distribution.is_unassigned() {
            continue;
        }
        let Some(budget) = snapshot.budget(&distribution.budget_allocation_id) else {
            tracing::debug!(
                distribution_id = %distribution.id,
                budget_allocation_id = %distribution.budget_allocation_id,
                "skipping unassigned distribution with unknown budget allocation"
            );
            continue;
        };
        // The year filter applies to the distribution year below, not to the
        // budget's own year.
        if !budget.matches(
            filters.program_id.as_deref(),
            None,
            filters.fund_designation_id.as_deref(),
        ) {
            continue;
        }

        match filters.year.as_deref() {
            Some(year) => {
                if distribution.distribution_year.as_deref() == Some(year) {
                    *buckets.entry(Some(year.to_string())).or_insert(0.0) +=
                        distribution.amount_or_zero();
                }
            }
            None => {
                *buckets
                    .entry(distribution.distribution_year.clone())
                    .or_insert(0.0) += distribution.amount_or_zero();
            }
        }
    }

    let mut rows = Vec::new();
    let mut all_years = None;
    for (year, amount) in buckets {
        if amount == 0.0 {
            continue;
        }
        let is_all_years = year.is_none();
        let row = ClusterRow {
            group_id: None,
            year,
            donor_name: UNASSIGNED_DONOR_NAME.to_string(),
            member_reporting_year_ids: Vec::new(),
            account_ids: BTreeSet::new(),
            distributed: amount,
            invoiced: 0.0,
            capacity: amount,
            free_of_charge: false,
            unassigned: true,
            extra: BTreeMap::new(),
        };
        if is_all_years {
            all_years = Some(row);
        } else {
            rows.push(row);
        }
    }
    rows.extend(all_years);
    rows
}
