//! Configuration registry
//!
//! [`StoreConfig`] is the resolved configuration; [`ConfigPatch`] is what
//! callers merge into it. Merging is shallow: every field set on the patch
//! replaces the current one, and `storages` is replaced wholesale rather than
//! merged per key.
//!
//! The engine reads the registry at the start of every operation, so a merge
//! takes effect on the next activation or dispatcher call.

use crate::binder::StateBinder;
use crate::schema::KeySchema;
use parking_lot::RwLock;
use pks_storage::{KeyNamer, StorageBackend};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Schemas by logical key
pub type Storages = BTreeMap<String, KeySchema>;

/// Resolved store configuration
#[derive(Clone, Default)]
pub struct StoreConfig {
    /// Namespace prefixed to every physical key
    pub namespace: Option<String>,
    /// Separator between namespace and logical key
    pub delimiter: Option<String>,
    /// Schema per logical key
    pub storages: Storages,
    /// Backend; the store's in-memory backend is used when unset
    pub backend: Option<Arc<dyn StorageBackend>>,
    /// State-binding capability; required for activation
    pub binder: Option<Arc<dyn StateBinder>>,
}

impl StoreConfig {
    /// Create empty configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Key namer for the current namespace and delimiter
    #[must_use]
    pub fn namer(&self) -> KeyNamer {
        KeyNamer::from_parts(self.namespace.as_deref(), self.delimiter.as_deref())
    }

    /// Schema for a logical key
    #[inline]
    #[must_use]
    pub fn schema(&self, key: &str) -> Option<&KeySchema> {
        self.storages.get(key)
    }

    /// Apply a patch, shallowly
    pub fn apply(&mut self, patch: ConfigPatch) {
        let ConfigPatch {
            namespace,
            delimiter,
            storages,
            backend,
            binder,
        } = patch;

        if let Some(namespace) = namespace {
            self.namespace = Some(namespace);
        }
        if let Some(delimiter) = delimiter {
            self.delimiter = Some(delimiter);
        }
        if let Some(storages) = storages {
            self.storages = storages;
        }
        if let Some(backend) = backend {
            self.backend = Some(backend);
        }
        if let Some(binder) = binder {
            self.binder = Some(binder);
        }
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("namespace", &self.namespace)
            .field("delimiter", &self.delimiter)
            .field("storages", &self.storages.keys().collect::<Vec<_>>())
            .field("backend", &self.backend)
            .field("binder", &self.binder.is_some())
            .finish()
    }
}

/// Partial configuration merged into the registry
#[derive(Clone, Default)]
pub struct ConfigPatch {
    namespace: Option<String>,
    delimiter: Option<String>,
    storages: Option<Storages>,
    backend: Option<Arc<dyn StorageBackend>>,
    binder: Option<Arc<dyn StateBinder>>,
}

impl ConfigPatch {
    /// Create empty patch
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With namespace
    #[inline]
    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// With delimiter
    #[inline]
    #[must_use]
    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }

    /// Add one schema to the patch's storages mapping
    ///
    /// The mapping as a whole still replaces the registry's on merge.
    #[must_use]
    pub fn storage(mut self, key: impl Into<String>, schema: KeySchema) -> Self {
        self.storages
            .get_or_insert_with(Storages::new)
            .insert(key.into(), schema);
        self
    }

    /// With complete storages mapping
    #[inline]
    #[must_use]
    pub fn storages(mut self, storages: Storages) -> Self {
        self.storages = Some(storages);
        self
    }

    /// With backend
    #[inline]
    #[must_use]
    pub fn backend(mut self, backend: Arc<dyn StorageBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// With state binder
    #[inline]
    #[must_use]
    pub fn binder(mut self, binder: Arc<dyn StateBinder>) -> Self {
        self.binder = Some(binder);
        self
    }
}

impl fmt::Debug for ConfigPatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigPatch")
            .field("namespace", &self.namespace)
            .field("delimiter", &self.delimiter)
            .field(
                "storages",
                &self.storages.as_ref().map(|s| s.keys().collect::<Vec<_>>()),
            )
            .field("backend", &self.backend.is_some())
            .field("binder", &self.binder.is_some())
            .finish()
    }
}

/// Serializable subset of the configuration, for settings files
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreSettings {
    /// Namespace prefixed to every physical key
    pub namespace: Option<String>,
    /// Separator between namespace and logical key
    pub delimiter: Option<String>,
}

impl StoreSettings {
    /// Overlay `other` on top of these settings
    #[must_use]
    pub fn overlay(self, other: StoreSettings) -> Self {
        Self {
            namespace: other.namespace.or(self.namespace),
            delimiter: other.delimiter.or(self.delimiter),
        }
    }

    /// Patch carrying these settings
    #[must_use]
    pub fn into_patch(self) -> ConfigPatch {
        ConfigPatch {
            namespace: self.namespace,
            delimiter: self.delimiter,
            ..ConfigPatch::default()
        }
    }
}

/// Process-wide configuration holder
#[derive(Debug, Default)]
pub struct ConfigRegistry {
    current: RwLock<StoreConfig>,
}

impl ConfigRegistry {
    /// Create registry with empty configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `patch` and return the resulting configuration
    pub fn merge(&self, patch: ConfigPatch) -> StoreConfig {
        let mut current = self.current.write();
        current.apply(patch);
        tracing::debug!(
            namespace = ?current.namespace,
            delimiter = ?current.delimiter,
            storages = current.storages.len(),
            "merged store configuration"
        );
        current.clone()
    }

    /// Copy of the current configuration
    #[must_use]
    pub fn snapshot(&self) -> StoreConfig {
        self.current.read().clone()
    }
}
