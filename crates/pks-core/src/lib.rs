//! PKS Core
//!
//! Binds persisted values to live application state and migrates stale
//! persisted data when a key's schema version changes.
//!
//! # Core Concepts
//!
//! - [`KeySchema`]: defaults, version and migration for one logical key
//! - [`Store`]: configuration, version ledger and session tracker in one owner
//! - [`Activation`]: current value plus a [`Dispatcher`] (update/reset/remove)
//! - [`VersionLedger`]: persisted `key -> {v}` record, cached write-through
//! - [`SessionTracker`]: keys already activated during this store's lifetime
//! - [`StateBinder`]: host capability that owns the live value
//!
//! # Example
//!
//! ```rust
//! use pks_core::{ConfigPatch, KeySchema, SharedStateBinder, Store};
//! use pks_storage::{MemoryBackend, StorageBackend};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let backend = Arc::new(MemoryBackend::new());
//! let store = Store::with_config(
//!     ConfigPatch::new()
//!         .storage("user", KeySchema::new(json!({"name": "guest"})))
//!         .backend(backend.clone())
//!         .binder(Arc::new(SharedStateBinder::new())),
//! );
//!
//! let (value, dispatcher) = store.activate("user").unwrap().into_parts();
//! assert_eq!(value, json!({"name": "guest"}));
//! assert_eq!(backend.get("track").unwrap().as_deref(), Some(r#"{"user":{"v":1}}"#));
//!
//! dispatcher.update(json!({"name": "Tony Stark"})).unwrap();
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod activation;
pub mod binder;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod schema;
pub mod tracker;

// Re-exports
pub use activation::{Activation, ActivationReport, MigrationOutcome};
pub use binder::{BoundState, SharedStateBinder, StateBinder, StateSetter};
pub use config::{ConfigPatch, ConfigRegistry, StoreConfig, StoreSettings, Storages};
pub use dispatcher::Dispatcher;
pub use engine::Store;
pub use error::{MigrationError, StoreError, StoreResult, StoreWarning};
pub use ledger::{Ledger, LedgerEntry, VersionLedger};
pub use schema::{is_falsy, register_key_schema, KeySchema, MigrationFn, DEFAULT_VERSION};
pub use tracker::SessionTracker;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the store
    pub use crate::{
        register_key_schema, Activation, ConfigPatch, Dispatcher, KeySchema, MigrationOutcome,
        SharedStateBinder, StateBinder, Store, StoreError, StoreResult,
    };
    pub use pks_storage::{FileBackend, MemoryBackend, StorageBackend};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
