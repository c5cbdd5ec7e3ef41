//! Mutation handle for an activated key
//!
//! Each operation pushes the new value into the bound host state through the
//! setter captured at activation, then writes storage and the ledger under
//! whatever namespace and backend the configuration names at call time.

use crate::binder::StateSetter;
use crate::engine::Store;
use crate::error::{StoreResult, StoreWarning};
use crate::schema::KeySchema;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Update/reset/remove operations bound to one logical key
#[derive(Clone)]
pub struct Dispatcher {
    store: Store,
    key: String,
    /// Schema as it was when the key was activated
    schema: KeySchema,
    setter: Arc<dyn StateSetter>,
}

impl Dispatcher {
    pub(crate) fn new(
        store: Store,
        key: &str,
        schema: KeySchema,
        setter: Arc<dyn StateSetter>,
    ) -> Self {
        Self {
            store,
            key: key.to_string(),
            schema,
            setter,
        }
    }

    /// Logical key this dispatcher is bound to
    #[inline]
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Replace the value, persist it and record the schema version
    ///
    /// # Errors
    /// Returns error if storage or the ledger cannot be written
    pub fn update(&self, value: Value) -> StoreResult<()> {
        self.setter.set(value.clone());
        self.store
            .persist(&self.key, &value, self.schema.effective_version())
    }

    /// Replace the value with a typed struct
    ///
    /// # Errors
    /// Returns error if the value cannot be represented as JSON, or if
    /// storage or the ledger cannot be written
    pub fn update_typed<T: Serialize>(&self, value: &T) -> StoreResult<()> {
        self.update(serde_json::to_value(value)?)
    }

    /// Restore the schema's default value
    ///
    /// Without a default, `null` is stored and a warning is returned.
    ///
    /// # Errors
    /// Returns error if storage or the ledger cannot be written
    pub fn reset(&self) -> StoreResult<Option<StoreWarning>> {
        let (value, warning) = match self.schema.defaults() {
            Some(defaults) => (defaults.clone(), None),
            None => {
                let warning = StoreWarning::MissingDefinition {
                    key: self.key.clone(),
                };
                tracing::warn!(key = %self.key, "{warning}");
                (Value::Null, Some(warning))
            }
        };

        self.setter.set(value.clone());
        self.store
            .persist(&self.key, &value, self.schema.effective_version())?;
        Ok(warning)
    }

    /// Delete the stored value and its ledger entry, and clear bound state
    ///
    /// The key stays marked as activated for the rest of the session, so a
    /// later activation neither re-seeds defaults nor re-runs the migration
    /// check.
    ///
    /// # Errors
    /// Returns error if storage or the ledger cannot be written
    pub fn remove(&self) -> StoreResult<()> {
        self.store.erase(&self.key)?;
        self.setter.set(Value::Null);
        Ok(())
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("key", &self.key)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use crate::binder::SharedStateBinder;
    use crate::config::ConfigPatch;
    use crate::engine::Store;
    use crate::error::StoreWarning;
    use crate::schema::KeySchema;
    use pks_storage::{MemoryBackend, StorageBackend};
    use serde::Serialize;
    use serde_json::{json, Value};
    use std::sync::Arc;

    struct Fixture {
        store: Store,
        backend: Arc<MemoryBackend>,
        binder: Arc<SharedStateBinder>,
    }

    fn fixture(schema: KeySchema) -> Fixture {
        let backend = Arc::new(MemoryBackend::new());
        let binder = Arc::new(SharedStateBinder::new());
        let store = Store::with_config(
            ConfigPatch::new()
                .namespace("gx")
                .delimiter("#")
                .storage("user", schema)
                .backend(backend.clone())
                .binder(binder.clone()),
        );
        Fixture {
            store,
            backend,
            binder,
        }
    }

    #[test]
    fn update_persists_and_pushes_state() {
        let fx = fixture(KeySchema::new(json!({"name": "guest"})).with_version(2));
        let (_, dispatcher) = fx.store.activate("user").unwrap().into_parts();

        dispatcher.update(json!({"name": "Tony Stark"})).unwrap();

        assert_eq!(
            fx.backend.get("gx#user").unwrap().as_deref(),
            Some(r#"{"name":"Tony Stark"}"#)
        );
        assert_eq!(fx.binder.get("gx#user"), Some(json!({"name": "Tony Stark"})));
        assert_eq!(fx.store.ledger_version("user").unwrap(), Some(2));
    }

    #[test]
    fn update_typed_serializes() {
        #[derive(Serialize)]
        struct User {
            name: &'static str,
        }

        let fx = fixture(KeySchema::new(json!({"name": "guest"})));
        let activation = fx.store.activate("user").unwrap();
        activation
            .dispatcher()
            .update_typed(&User { name: "Pepper" })
            .unwrap();

        assert!(fx.backend.get("gx#user").unwrap().unwrap().contains("Pepper"));
    }

    #[test]
    fn reset_restores_defaults() {
        let fx = fixture(KeySchema::new(json!({"name": "guest"})));
        let (_, dispatcher) = fx.store.activate("user").unwrap().into_parts();

        dispatcher.update(json!({"name": "Tony Stark"})).unwrap();
        let warning = dispatcher.reset().unwrap();

        assert!(warning.is_none());
        assert_eq!(
            fx.backend.get("gx#user").unwrap().as_deref(),
            Some(r#"{"name":"guest"}"#)
        );
        assert_eq!(fx.binder.get("gx#user"), Some(json!({"name": "guest"})));
    }

    #[test]
    fn reset_without_defaults_stores_null() {
        let fx = fixture(KeySchema::empty());
        let (_, dispatcher) = fx.store.activate("user").unwrap().into_parts();
        dispatcher.update(json!(5)).unwrap();

        let warning = dispatcher.reset().unwrap();
        assert_eq!(
            warning,
            Some(StoreWarning::MissingDefinition {
                key: "user".to_string()
            })
        );
        assert_eq!(fx.backend.get("gx#user").unwrap().as_deref(), Some("null"));
        assert_eq!(fx.binder.get("gx#user"), Some(Value::Null));
    }

    #[test]
    fn remove_clears_value_ledger_and_state() {
        let fx = fixture(KeySchema::new(json!({"name": "guest"})));
        let (_, dispatcher) = fx.store.activate("user").unwrap().into_parts();

        dispatcher.remove().unwrap();

        assert!(fx.backend.get("gx#user").unwrap().is_none());
        assert!(!fx.store.ledger().unwrap().contains_key("user"));
        assert_eq!(fx.backend.get("gx#track").unwrap().as_deref(), Some("{}"));
        assert_eq!(fx.binder.get("gx#user"), Some(Value::Null));
        assert!(fx.store.is_activated("user"));
    }

    #[test]
    fn dispatcher_follows_namespace_changes() {
        let fx = fixture(KeySchema::new(json!(1)));
        let (_, dispatcher) = fx.store.activate("user").unwrap().into_parts();

        fx.store.configure(ConfigPatch::new().namespace("other"));
        dispatcher.update(json!(2)).unwrap();

        assert_eq!(fx.backend.get("other#user").unwrap().as_deref(), Some("2"));
        assert_eq!(fx.backend.get("gx#user").unwrap().as_deref(), Some("1"));
    }
}
