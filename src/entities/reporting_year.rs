//! Reporting-year entity - one donor's presence in one year.
//!
//! Records with `holding_id == None` are the roots of their holding group;
//! every other record belongs to the group of its declared holding. The
//! cluster builder derives group membership from these fields.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One donor's presence in one year, possibly a child of a holding.
/// Loaded read-only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReportingYearRecord {
    /// Unique identifier of the record
    pub id: String,
    /// Account the donor reports under
    pub account_id: String,
    /// Parent holding account id; `None` marks the root of a group
    #[serde(default)]
    pub holding_id: Option<String>,
    /// Donor display name for this record
    pub donor_name: String,
    /// Reporting year (label, e.g. `"2024"`)
    pub year: String,
    /// Program this record belongs to
    pub program_id: String,
    /// Default / free-of-charge account flag; such rows are hidden from the
    /// source list when the view is scoped to a single invoice context
    #[serde(default)]
    pub free_of_charge: bool,
    /// Opaque numeric side fields, passed through to row and header sums when
    /// configured as summary fields
    #[serde(default)]
    pub extra: BTreeMap<String, f64>,
}

impl ReportingYearRecord {
    /// Whether this record is the root of its holding group.
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.holding_id.is_none()
    }
}
