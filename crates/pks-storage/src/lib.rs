//! PKS Storage
//!
//! The physical side of the persisted key store: where strings live and how
//! logical keys and values become physical keys and strings.
//!
//! # Overview
//!
//! - [`StorageBackend`]: synchronous get/set/remove by string key
//! - [`MemoryBackend`]: process-local map (default backend)
//! - [`FileBackend`]: single JSON document on disk
//! - [`KeyNamer`]: logical key → namespaced physical key
//! - [`codec`]: total encode/decode between values and stored strings
//!
//! # Example
//!
//! ```rust
//! use pks_storage::{KeyNamer, MemoryBackend, StorageBackend};
//!
//! let namer = KeyNamer::new().with_namespace("gx").with_delimiter("#");
//! assert_eq!(namer.name("user"), "gx#user");
//!
//! let backend = MemoryBackend::new();
//! backend.set(&namer.name("user"), r#"{"name":"guest"}"#).unwrap();
//! assert!(backend.get("gx#user").unwrap().is_some());
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod backend;
pub mod codec;
pub mod error;
pub mod file;
pub mod namer;

// Re-exports
pub use backend::{MemoryBackend, StorageBackend};
pub use codec::{decode, encode, Decoded, Encoded};
pub use error::{BackendError, BackendResult};
pub use file::FileBackend;
pub use namer::{KeyNamer, DEFAULT_DELIMITER, INIT_KEY, LEDGER_KEY};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for storage operations
    pub use crate::{
        decode, encode, BackendError, Decoded, Encoded, FileBackend, KeyNamer, MemoryBackend,
        StorageBackend,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
