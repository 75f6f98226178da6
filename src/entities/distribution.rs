//! Distribution entity - an amount distributed from a budget to a donor-year.

use serde::{Deserialize, Serialize};

/// An amount distributed from a `BudgetAllocation` to a `ReportingYearRecord`
/// in a given distribution year. Loaded read-only.
///
/// `reporting_year_id == None` marks an *unassigned* distribution: money that
/// left a budget without being linked to a donor yet. Such records roll up
/// into the synthetic UNASSIGNED rows instead of a donor cluster.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DistributionRecord {
    /// Unique identifier of the distribution
    pub id: String,
    /// Budget allocation the money came from
    pub budget_allocation_id: String,
    /// Linked reporting-year record; `None` means unassigned
    #[serde(default)]
    pub reporting_year_id: Option<String>,
    /// Distributed amount; absent counts as zero in sums but the record still
    /// exists for grouping purposes
    #[serde(default)]
    pub amount: Option<f64>,
    /// Year the distribution was made in (label); absent unassigned records
    /// fall into the all-years bucket
    #[serde(default)]
    pub distribution_year: Option<String>,
    /// Program this distribution belongs to
    pub program_id: String,
}

impl DistributionRecord {
    /// Amount with the absent-as-zero convention applied.
    #[must_use]
    pub fn amount_or_zero(&self) -> f64 {
        self.amount.unwrap_or(0.0)
    }

    /// Whether this distribution lacks a donor link.
    #[must_use]
    pub const fn is_unassigned(&self) -> bool {
        self.reporting_year_id.is_none()
    }
}
