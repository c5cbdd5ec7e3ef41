//! Activation results

use crate::dispatcher::Dispatcher;
use crate::error::{MigrationError, StoreResult, StoreWarning};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;

/// What the migration check did during an activation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// Key was already activated in this session; no check ran
    #[default]
    NotChecked,

    /// No ledger entry existed; one was written at the current version
    Recorded { version: u32 },

    /// Ledger already at the current version
    UpToDate { version: u32 },

    /// Migration ran and its result was persisted
    Migrated { from: u32, to: u32 },

    /// Migration was needed but could not be applied
    Failed(MigrationError),
}

impl MigrationOutcome {
    /// Check if a migration result was persisted
    #[inline]
    #[must_use]
    pub fn is_migrated(&self) -> bool {
        matches!(self, Self::Migrated { .. })
    }

    /// Migration error, if the check failed
    #[inline]
    #[must_use]
    pub fn error(&self) -> Option<&MigrationError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for MigrationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotChecked => f.write_str("not checked"),
            Self::Recorded { version } => write!(f, "recorded at v{version}"),
            Self::UpToDate { version } => write!(f, "up to date at v{version}"),
            Self::Migrated { from, to } => write!(f, "migrated v{from} -> v{to}"),
            Self::Failed(err) => write!(f, "failed: {err}"),
        }
    }
}

/// Side effects observed during one activation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationReport {
    /// Key had been activated earlier in this session
    pub already_activated: bool,
    /// Defaults were written because nothing was stored
    pub seeded: bool,
    /// Result of the migration check
    pub migration: MigrationOutcome,
    /// Non-fatal conditions
    pub warnings: Vec<StoreWarning>,
}

/// Value and mutation handle for an activated key
#[derive(Debug, Clone)]
pub struct Activation {
    pub(crate) value: Value,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) report: ActivationReport,
}

impl Activation {
    /// Current value (`null` when nothing is stored and no default exists)
    #[inline]
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Current value as a typed struct
    ///
    /// # Errors
    /// Returns error if the value does not match `T`
    pub fn value_as<T: DeserializeOwned>(&self) -> StoreResult<T> {
        Ok(serde_json::from_value(self.value.clone())?)
    }

    /// Mutation handle bound to the key
    #[inline]
    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// What happened during activation
    #[inline]
    #[must_use]
    pub fn report(&self) -> &ActivationReport {
        &self.report
    }

    /// Split into `(value, dispatcher)`
    #[inline]
    #[must_use]
    pub fn into_parts(self) -> (Value, Dispatcher) {
        (self.value, self.dispatcher)
    }
}
