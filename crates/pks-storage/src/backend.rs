//! Backend contract and the in-memory backend
//!
//! Every backend call is synchronous: it completes before the caller proceeds.

use crate::error::BackendResult;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt::Debug;

/// Synchronous string key-value store
///
/// Implementations must be shareable across threads; the engine holds them
/// behind an `Arc<dyn StorageBackend>`.
pub trait StorageBackend: Debug + Send + Sync {
    /// Read the string stored under `key`
    ///
    /// # Errors
    /// Returns error if the backend cannot be read
    fn get(&self, key: &str) -> BackendResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    ///
    /// # Errors
    /// Returns error if the write cannot be completed
    fn set(&self, key: &str, value: &str) -> BackendResult<()>;

    /// Delete `key`; deleting a missing key is not an error
    ///
    /// # Errors
    /// Returns error if the delete cannot be completed
    fn remove(&self, key: &str) -> BackendResult<()>;

    /// List all physical keys, sorted
    ///
    /// # Errors
    /// Returns error if the backend cannot be read
    fn keys(&self) -> BackendResult<Vec<String>>;
}

/// Process-local backend
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryBackend {
    /// Create empty backend
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create backend pre-seeded with entries
    #[must_use]
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: RwLock::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    /// Copy of every stored entry
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries.read().clone()
    }

    /// Number of stored entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if nothing is stored
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> BackendResult<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> BackendResult<()> {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> BackendResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn keys(&self) -> BackendResult<Vec<String>> {
        Ok(self.entries.read().keys().cloned().collect())
    }
}
