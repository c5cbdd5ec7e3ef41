//! Storage binding engine
//!
//! [`Store`] owns everything that used to be process-wide state: the
//! configuration registry, the version ledger cache and the session tracker.
//! Two stores never share activation history, which keeps tests isolated and
//! lets a "process restart" be modelled as a fresh store over the same backend.
//!
//! # Activation
//!
//! ```text
//! activate(key)
//!   ├─ schema lookup ─────────── missing → warn, empty schema
//!   ├─ session tracker ───────── already activated?
//!   ├─ backend read ──────────── raw value
//!   ├─ nothing stored, first time, has defaults → seed defaults + ledger
//!   ├─ something stored ──────── decode and adopt
//!   ├─ first time → migration check against the ledger
//!   ├─ mark activated
//!   └─ bind into host state by physical key → (value, dispatcher)
//! ```
//!
//! Activations on one store are serialized, so the check-then-mark sequence
//! on the tracker and the ledger read-modify-write never interleave.

use crate::activation::{Activation, ActivationReport, MigrationOutcome};
use crate::config::{ConfigPatch, ConfigRegistry, StoreConfig};
use crate::dispatcher::Dispatcher;
use crate::error::{MigrationError, StoreError, StoreResult, StoreWarning};
use crate::ledger::{Ledger, VersionLedger};
use crate::schema::{is_falsy, KeySchema};
use crate::tracker::SessionTracker;
use parking_lot::Mutex;
use pks_storage::{codec, Decoded, KeyNamer, MemoryBackend, StorageBackend};
use serde_json::Value;
use std::sync::Arc;

/// Versioned, namespaced key-value store
///
/// Cheap to clone; clones share all state.
#[derive(Debug, Clone, Default)]
pub struct Store {
    inner: Arc<StoreInner>,
}

#[derive(Debug)]
struct StoreInner {
    registry: ConfigRegistry,
    ledger: VersionLedger,
    tracker: SessionTracker,
    /// Backend used while the configuration names none
    fallback: Arc<dyn StorageBackend>,
    activation: Mutex<()>,
}

impl Default for StoreInner {
    fn default() -> Self {
        Self {
            registry: ConfigRegistry::new(),
            ledger: VersionLedger::new(),
            tracker: SessionTracker::new(),
            fallback: Arc::new(MemoryBackend::new()),
            activation: Mutex::new(()),
        }
    }
}

/// Physical location of a store's data under the current configuration
struct Location {
    namer: KeyNamer,
    backend: Arc<dyn StorageBackend>,
}

impl Store {
    /// Create store with empty configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create store and merge an initial configuration
    #[must_use]
    pub fn with_config(patch: ConfigPatch) -> Self {
        let store = Self::new();
        store.configure(patch);
        store
    }

    /// Merge configuration; takes effect on the next operation
    pub fn configure(&self, patch: ConfigPatch) -> StoreConfig {
        self.inner.registry.merge(patch)
    }

    /// Copy of the current configuration
    #[must_use]
    pub fn config(&self) -> StoreConfig {
        self.inner.registry.snapshot()
    }

    /// Backend in effect under the current configuration
    #[must_use]
    pub fn backend(&self) -> Arc<dyn StorageBackend> {
        self.location().backend
    }

    /// Physical key for a logical key under the current configuration
    #[must_use]
    pub fn physical_key(&self, key: &str) -> String {
        self.location().namer.name(key)
    }

    /// Version ledger under the current namespace
    ///
    /// # Errors
    /// Returns error if the ledger cannot be read
    pub fn ledger(&self) -> StoreResult<Ledger> {
        let location = self.location();
        self.inner
            .ledger
            .load(location.backend.as_ref(), &location.namer.ledger_key())
    }

    /// Ledger version recorded for a logical key
    ///
    /// # Errors
    /// Returns error if the ledger cannot be read
    pub fn ledger_version(&self, key: &str) -> StoreResult<Option<u32>> {
        let location = self.location();
        Ok(self
            .inner
            .ledger
            .entry(location.backend.as_ref(), &location.namer.ledger_key(), key)?
            .map(|entry| entry.v))
    }

    /// Whether `key` was activated in this session under the current namespace
    #[must_use]
    pub fn is_activated(&self, key: &str) -> bool {
        let namer = self.location().namer;
        self.inner.tracker.is_activated(&namer.init_key(), key)
    }

    /// Logical keys activated in this session under the current namespace, sorted
    #[must_use]
    pub fn activated_keys(&self) -> Vec<String> {
        let namer = self.location().namer;
        self.inner.tracker.activated_keys(&namer.init_key())
    }

    /// Activate a logical key
    ///
    /// Seeds defaults and runs the migration check the first time the key is
    /// activated on this store; later activations only read and bind.
    ///
    /// # Errors
    /// Returns [`StoreError::MissingBinder`] if no state binder is configured,
    /// or a backend error if storage cannot be read or written. Migration
    /// problems are not errors; they are reported in
    /// [`ActivationReport::migration`].
    pub fn activate(&self, key: &str) -> StoreResult<Activation> {
        let config = self.inner.registry.snapshot();
        let binder = config.binder.clone().ok_or(StoreError::MissingBinder)?;

        let mut report = ActivationReport::default();
        let schema = match config.schema(key) {
            Some(schema) => schema.clone(),
            None => {
                let warning = StoreWarning::MissingDefinition {
                    key: key.to_string(),
                };
                tracing::warn!(key, "{warning}");
                report.warnings.push(warning);
                KeySchema::empty()
            }
        };

        let location = self.location_for(&config);
        let physical_key = location.namer.name(key);
        let value = {
            let _guard = self.inner.activation.lock();
            self.activate_locked(key, &schema, &location, &mut report)?
        };

        let bound = binder.bind(&physical_key, value);
        tracing::debug!(
            key,
            %physical_key,
            seeded = report.seeded,
            already_activated = report.already_activated,
            "activated key"
        );

        Ok(Activation {
            value: bound.current,
            dispatcher: Dispatcher::new(self.clone(), key, schema, bound.setter),
            report,
        })
    }

    /// Steps that read or write shared state; caller holds the activation lock
    fn activate_locked(
        &self,
        key: &str,
        schema: &KeySchema,
        location: &Location,
        report: &mut ActivationReport,
    ) -> StoreResult<Value> {
        let backend = location.backend.as_ref();
        let init_key = location.namer.init_key();
        let physical_key = location.namer.name(key);
        let ledger_key = location.namer.ledger_key();

        let already_activated = self.inner.tracker.is_activated(&init_key, key);
        report.already_activated = already_activated;

        let raw = backend.get(&physical_key)?.filter(|raw| !raw.is_empty());

        let mut value = Value::Null;
        match raw {
            None => {
                if let Some(defaults) = schema.defaults().filter(|_| !already_activated) {
                    save(backend, &physical_key, defaults)?;
                    self.inner.ledger.record_version(
                        backend,
                        &ledger_key,
                        key,
                        schema.effective_version(),
                    )?;
                    tracing::info!(key, %physical_key, "seeded defaults");
                    report.seeded = true;
                    value = defaults.clone();
                }
            }
            Some(raw) => {
                value = match codec::decode(&raw) {
                    Decoded::Json(value) => value,
                    Decoded::Raw { raw, reason } => {
                        tracing::debug!(key, %reason, "stored value is not JSON, adopting raw string");
                        report.warnings.push(StoreWarning::RawValue {
                            key: key.to_string(),
                            reason,
                        });
                        Value::String(raw)
                    }
                };
            }
        }

        if !already_activated {
            let (outcome, migrated) =
                self.check_migration(key, schema, &value, backend, &physical_key, &ledger_key)?;
            if let Some(migrated) = migrated {
                value = migrated;
            }
            report.migration = outcome;
            self.inner.tracker.mark_activated(&init_key, key);
        }

        Ok(value)
    }

    /// Compare the ledger against the schema version and migrate if needed
    ///
    /// Returns the outcome and, when a migration result was persisted, the new
    /// current value.
    fn check_migration(
        &self,
        key: &str,
        schema: &KeySchema,
        current: &Value,
        backend: &dyn StorageBackend,
        physical_key: &str,
        ledger_key: &str,
    ) -> StoreResult<(MigrationOutcome, Option<Value>)> {
        let target = schema.effective_version();

        let Some(entry) = self.inner.ledger.entry(backend, ledger_key, key)? else {
            self.inner
                .ledger
                .record_version(backend, ledger_key, key, target)?;
            return Ok((MigrationOutcome::Recorded { version: target }, None));
        };

        if entry.v == target {
            return Ok((MigrationOutcome::UpToDate { version: target }, None));
        }

        let from = entry.v;
        let Some(result) = schema.migrate(current) else {
            let err = MigrationError::Undefined {
                key: key.to_string(),
                from,
                to: target,
            };
            tracing::error!(key, from, to = target, "{err}");
            return Ok((MigrationOutcome::Failed(err), None));
        };

        let migrated = result.filter(|value| !is_falsy(value));
        let outcome = match &migrated {
            Some(value) => {
                save(backend, physical_key, value)?;
                tracing::info!(key, from, to = target, "migrated stored value");
                MigrationOutcome::Migrated { from, to: target }
            }
            None => {
                let err = MigrationError::InvalidResult {
                    key: key.to_string(),
                    from,
                    to: target,
                };
                tracing::error!(key, from, to = target, "{err}");
                MigrationOutcome::Failed(err)
            }
        };

        // Advanced even when the result was unusable
        self.inner
            .ledger
            .record_version(backend, ledger_key, key, target)?;

        Ok((outcome, migrated))
    }

    /// Persist `value` for `key` and record `version` in the ledger
    pub(crate) fn persist(&self, key: &str, value: &Value, version: u32) -> StoreResult<()> {
        let location = self.location();
        let backend = location.backend.as_ref();
        save(backend, &location.namer.name(key), value)?;
        self.inner
            .ledger
            .record_version(backend, &location.namer.ledger_key(), key, version)
    }

    /// Delete the stored value for `key` and its ledger entry
    pub(crate) fn erase(&self, key: &str) -> StoreResult<()> {
        let location = self.location();
        let backend = location.backend.as_ref();
        let physical_key = location.namer.name(key);
        backend.remove(&physical_key)?;
        self.inner
            .ledger
            .remove(backend, &location.namer.ledger_key(), key)?;
        tracing::info!(key, %physical_key, "removed stored value");
        Ok(())
    }

    fn location(&self) -> Location {
        self.location_for(&self.inner.registry.snapshot())
    }

    fn location_for(&self, config: &StoreConfig) -> Location {
        Location {
            namer: config.namer(),
            backend: config
                .backend
                .clone()
                .unwrap_or_else(|| self.inner.fallback.clone()),
        }
    }
}

/// Encode and write one value
fn save(backend: &dyn StorageBackend, physical_key: &str, value: &Value) -> StoreResult<()> {
    let encoded = codec::encode(value);
    backend.set(physical_key, encoded.as_str())?;
    Ok(())
}
