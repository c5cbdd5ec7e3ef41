//! Error types for the store engine
//!
//! Three tiers, matching how far a problem is allowed to travel:
//! - [`StoreError`]: returned to the caller (missing binder, backend failure)
//! - [`MigrationError`]: reported in the activation report and logged; the
//!   activation itself still succeeds
//! - [`StoreWarning`]: degraded but valid operation (missing schema definition)

use pks_storage::BackendError;
use std::fmt;

/// Errors surfaced to callers of store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No state-binding capability configured
    #[error("configuration error: binding capability required")]
    MissingBinder,

    /// Backend read or write failed
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// Value could not be converted to or from JSON
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Check if error is a configuration problem rather than an IO problem
    #[inline]
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::MissingBinder)
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Migration problems for a single key
///
/// Never aborts an activation. The stored value is left as it was in both
/// cases; only [`MigrationError::InvalidResult`] advances the ledger.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MigrationError {
    /// Versions differ but the schema defines no migration
    #[error("migration required for key '{key}' (v{from} -> v{to}) but none is defined")]
    Undefined { key: String, from: u32, to: u32 },

    /// Migration returned nothing usable
    #[error("migration for key '{key}' (v{from} -> v{to}) returned no value")]
    InvalidResult { key: String, from: u32, to: u32 },
}

impl MigrationError {
    /// Logical key the error belongs to
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Undefined { key, .. } | Self::InvalidResult { key, .. } => key,
        }
    }

    /// Whether the ledger was moved to the target version anyway
    #[inline]
    #[must_use]
    pub fn ledger_advanced(&self) -> bool {
        matches!(self, Self::InvalidResult { .. })
    }
}

/// Non-fatal conditions observed during a store operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreWarning {
    /// No schema registered for the key; empty defaults were used
    MissingDefinition { key: String },

    /// Stored value was not JSON and was adopted as a plain string
    RawValue { key: String, reason: String },
}

impl fmt::Display for StoreWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingDefinition { key } => {
                write!(f, "config definition for storage:{key} not found")
            }
            Self::RawValue { key, reason } => {
                write!(f, "stored value for storage:{key} is not JSON ({reason})")
            }
        }
    }
}
