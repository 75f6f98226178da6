//! Program entity - the funding program a session is scoped to.

use serde::{Deserialize, Serialize};

/// A funding program scope. Loaded read-only per session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Program {
    /// Unique identifier of the program
    pub id: String,
    /// Human-readable program name
    pub name: String,
}
