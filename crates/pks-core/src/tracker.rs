//! Session tracker
//!
//! Remembers which logical keys have been activated during the lifetime of a
//! store, grouped by the physical init-marker key of the namespace they were
//! activated under. Never persisted.

use dashmap::DashMap;
use std::collections::HashSet;

/// Activated logical keys per init marker
#[derive(Debug, Default)]
pub struct SessionTracker {
    activated: DashMap<String, HashSet<String>>,
}

impl SessionTracker {
    /// Create empty tracker
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `key` was already activated under `init_key`
    #[must_use]
    pub fn is_activated(&self, init_key: &str, key: &str) -> bool {
        self.activated
            .get(init_key)
            .is_some_and(|keys| keys.contains(key))
    }

    /// Mark `key` activated under `init_key`
    ///
    /// Returns `true` if the key was not marked before.
    pub fn mark_activated(&self, init_key: &str, key: &str) -> bool {
        self.activated
            .entry(init_key.to_string())
            .or_default()
            .insert(key.to_string())
    }

    /// Activated keys under `init_key`, sorted
    #[must_use]
    pub fn activated_keys(&self, init_key: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .activated
            .get(init_key)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}
