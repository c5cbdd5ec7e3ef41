//! Per-key schema definitions
//!
//! A [`KeySchema`] says what a logical key holds by default, which schema
//! version the application currently expects, and how to bring older
//! persisted data up to that version.

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Version assumed when a schema declares none
pub const DEFAULT_VERSION: u32 = 1;

/// Migration callback: `(current value, defaults) -> migrated value`
///
/// Returning `None` (or a falsy JSON value) means the migration produced
/// nothing usable and the stored value is left untouched.
pub type MigrationFn = Arc<dyn Fn(&Value, Option<&Value>) -> Option<Value> + Send + Sync>;

/// Schema definition for one logical key
#[derive(Clone, Default)]
pub struct KeySchema {
    defaults: Option<Value>,
    version: Option<u32>,
    migration: Option<MigrationFn>,
}

impl KeySchema {
    /// Create schema with default value
    #[inline]
    #[must_use]
    pub fn new(defaults: Value) -> Self {
        Self {
            defaults: Some(defaults),
            ..Self::default()
        }
    }

    /// Create schema without defaults
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create schema from a typed default value
    ///
    /// # Errors
    /// Returns error if the value cannot be represented as JSON
    pub fn from_typed<T: Serialize>(defaults: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::to_value(defaults)?))
    }

    /// With schema version
    #[inline]
    #[must_use]
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }

    /// With migration callback
    #[must_use]
    pub fn with_migration<F>(mut self, migration: F) -> Self
    where
        F: Fn(&Value, Option<&Value>) -> Option<Value> + Send + Sync + 'static,
    {
        self.migration = Some(Arc::new(migration));
        self
    }

    /// Default value, if one is defined
    ///
    /// A JSON `null` default counts as no default.
    #[inline]
    #[must_use]
    pub fn defaults(&self) -> Option<&Value> {
        self.defaults.as_ref().filter(|v| !v.is_null())
    }

    /// Declared version, if any
    #[inline]
    #[must_use]
    pub fn declared_version(&self) -> Option<u32> {
        self.version
    }

    /// Version the ledger should converge to (declared, else 1)
    #[inline]
    #[must_use]
    pub fn effective_version(&self) -> u32 {
        self.version.filter(|v| *v > 0).unwrap_or(DEFAULT_VERSION)
    }

    /// Run the migration callback against `current`
    ///
    /// Returns `None` when no callback is defined.
    #[must_use]
    pub fn migrate(&self, current: &Value) -> Option<Option<Value>> {
        self.migration
            .as_ref()
            .map(|migrate| migrate(current, self.defaults()))
    }
}

impl fmt::Debug for KeySchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySchema")
            .field("defaults", &self.defaults)
            .field("version", &self.version)
            .field("migration", &self.migration.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Identity hook for declaring a schema at its definition site
///
/// Has no runtime effect; it exists so schema constants can be written as
/// `register_key_schema(KeySchema::new(...))` and checked where they are defined.
#[inline]
#[must_use]
pub fn register_key_schema(schema: KeySchema) -> KeySchema {
    schema
}

/// Falsy in the sense the migration contract uses
///
/// `null`, `false`, `0` and `""` are falsy; every array and object is truthy.
#[must_use]
pub fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}
