//! Budget entities - the money pools distributions are drawn from.
//!
//! A `BudgetAllocation` ("overview budget for year") ties a fund designation
//! to a program and year; the rollup checks distribution records against its
//! fields when program/year/fund filters are active.

use serde::{Deserialize, Serialize};

/// A named pool of money a donor can allocate from. Loaded read-only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FundDesignation {
    /// Unique identifier of the fund designation
    pub id: String,
    /// Human-readable fund name
    pub name: String,
}

/// A budget instance tied to a program/year/underlying fund designation.
/// Loaded read-only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BudgetAllocation {
    /// Unique identifier of the budget allocation
    pub id: String,
    /// Program this budget belongs to
    pub program_id: String,
    /// Budget year (label, e.g. `"2024"`)
    pub year: String,
    /// Underlying fund designation the budget draws from
    pub fund_designation_id: String,
    /// Partner organisation administering the budget, if any
    #[serde(default)]
    pub partner_id: Option<String>,
}

impl BudgetAllocation {
    /// Whether this budget passes the given program/year/fund filters.
    /// An unset filter passes everything.
    #[must_use]
    pub fn matches(
        &self,
        program_id: Option<&str>,
        year: Option<&str>,
        fund_designation_id: Option<&str>,
    ) -> bool {
        program_id.is_none_or(|p| self.program_id == p)
            && year.is_none_or(|y| self.year == y)
            && fund_designation_id.is_none_or(|f| self.fund_designation_id == f)
    }
}
