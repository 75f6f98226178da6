//! Unified error types and result handling.
//!
//! The error taxonomy is deliberately small: gateway failures are the only
//! transient errors and are surfaced with their message so callers can retry.
//! Inconsistent record links and duplicate records are never surfaced at all;
//! the rollup pipeline excludes or deduplicates them silently, because the
//! snapshot is a partial, filtered view.

use thiserror::Error;

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration file could not be read or parsed.
    #[error("Configuration error: {message}")]
    Config {
        /// Human-readable description of what went wrong
        message: String,
    },

    /// A Data Access Gateway call failed (network/timeout). Prior in-memory
    /// state is left intact; the caller may retry the triggering event.
    #[error("Gateway request failed: {message}")]
    Gateway {
        /// Message reported by the gateway implementation
        message: String,
    },

    /// A selection event referenced a row key that is not present in the
    /// currently derived row set.
    #[error("No row with key {key}")]
    RowNotFound {
        /// Display form of the unknown row key
        key: String,
    },

    /// A transfer amount was rejected (NaN or infinite).
    #[error("Invalid transfer amount: {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: f64,
    },

    /// I/O error reading fixture or configuration files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Fixture payload was not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
