//! Cluster Builder: groups reporting-year records into holding/year clusters.
//!
//! A cluster is the unit the rollup sums over. Records sharing a group id
//! and an effective year land in one bucket; the group id is the holding id
//! when the record declares one, otherwise the truncated account id. A root
//! record (no holding id) is the canonical name source for its group, and
//! its own truncated account id is the id its children point at.

use crate::core::Filters;
use crate::entities::{ReportingYearRecord, Snapshot};
use std::collections::{BTreeMap, BTreeSet};

/// Characters of the account id that form the group id for records without
/// a holding.
pub const GROUP_ID_ACCOUNT_PREFIX_LEN: usize = 15;

/// Identity of one cluster. Ordered so downstream folds visit clusters in a
/// stable order and float sums reproduce bit for bit.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ClusterKey {
    /// Holding id, or the truncated account id for records without one
    pub group_id: String,
    /// Effective year: the selected year when a year filter is active,
    /// otherwise the record's own year
    pub year: String,
}

impl ClusterKey {
    /// Key the given record folds into under the given year filter.
    #[must_use]
    pub fn for_record(record: &ReportingYearRecord, selected_year: Option<&str>) -> Self {
        Self {
            group_id: group_id(record),
            year: selected_year.unwrap_or(&record.year).to_string(),
        }
    }
}

/// Holding id when present, otherwise the account id truncated to
/// [`GROUP_ID_ACCOUNT_PREFIX_LEN`] characters.
#[must_use]
pub fn group_id(record: &ReportingYearRecord) -> String {
    match &record.holding_id {
        Some(holding_id) => holding_id.clone(),
        None => record
            .account_id
            .chars()
            .take(GROUP_ID_ACCOUNT_PREFIX_LEN)
            .collect(),
    }
}

/// One cluster's membership and display attributes, before any amounts are
/// attached.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Cluster {
    /// Member record ids, in snapshot order
    pub member_reporting_year_ids: Vec<String>,
    /// Accounts of the member records
    pub account_ids: BTreeSet<String>,
    /// Donor display name: the root record's name when the cluster has one,
    /// otherwise the last member seen
    pub donor_name: String,
    /// Free-of-charge flag of the record that donated the donor name
    pub free_of_charge: bool,
    /// Extra amount fields summed across members
    pub extra: BTreeMap<String, f64>,
    has_root: bool,
}

/// Folds the in-scope reporting-year records into clusters.
///
/// The program filter and the year filter both exclude records outright; a
/// year filter that drops a group's root while keeping its children leaves
/// the cluster named after a child, which is accepted display behavior.
#[must_use]
pub fn build_clusters(snapshot: &Snapshot, filters: &Filters) -> BTreeMap<ClusterKey, Cluster> {
    let mut clusters: BTreeMap<ClusterKey, Cluster> = BTreeMap::new();
    for record in &snapshot.reporting_years {
        if filters
            .program_id
            .as_deref()
            .is_some_and(|program| record.program_id != program)
        {
            continue;
        }
        if filters
            .year
            .as_deref()
            .is_some_and(|year| record.year != year)
        {
            continue;
        }

        let key = ClusterKey::for_record(record, filters.year.as_deref());
        let cluster = clusters.entry(key).or_default();
        cluster.member_reporting_year_ids.push(record.id.clone());
        cluster.account_ids.insert(record.account_id.clone());
        if record.is_root() || !cluster.has_root {
            cluster.donor_name = record.donor_name.clone();
            cluster.free_of_charge = record.free_of_charge;
            cluster.has_root = cluster.has_root || record.is_root();
        }
        for (field, amount) in &record.extra {
            *cluster.extra.entry(field.clone()).or_insert(0.0) += amount;
        }
    }
    tracing::trace!(clusters = clusters.len(), "built clusters");
    clusters
}
