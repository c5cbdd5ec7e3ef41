//! Version ledger
//!
//! Records, per logical key, the schema version its persisted value was last
//! written at. The ledger is itself persisted as one JSON object under the
//! reserved `track` key (`{"user":{"v":1}}`).
//!
//! The ledger is hydrated from the backend once per physical ledger key and
//! served from memory afterwards. Every mutation rewrites the full ledger
//! (write-through): the cache only changes after the backend write succeeds,
//! so memory and storage agree whenever a call returns.

use crate::error::StoreResult;
use indexmap::IndexMap;
use parking_lot::Mutex;
use pks_storage::{codec, Decoded, StorageBackend};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Ledger record for one logical key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Last applied schema version
    pub v: u32,
}

impl LedgerEntry {
    /// Create entry at version
    #[inline]
    #[must_use]
    pub fn new(version: u32) -> Self {
        Self { v: version }
    }
}

/// Ledger contents, in insertion order
pub type Ledger = IndexMap<String, LedgerEntry>;

/// Cached, write-through version ledger
#[derive(Debug, Default)]
pub struct VersionLedger {
    /// Hydrated ledgers by physical ledger key
    cache: Mutex<HashMap<String, Ledger>>,
}

impl VersionLedger {
    /// Create ledger with empty cache
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current ledger stored under `ledger_key`
    ///
    /// # Errors
    /// Returns error if the backend read fails during hydration
    pub fn load(&self, backend: &dyn StorageBackend, ledger_key: &str) -> StoreResult<Ledger> {
        let mut cache = self.cache.lock();
        Ok(hydrate(&mut cache, backend, ledger_key)?.clone())
    }

    /// Ledger entry for one logical key
    ///
    /// # Errors
    /// Returns error if the backend read fails during hydration
    pub fn entry(
        &self,
        backend: &dyn StorageBackend,
        ledger_key: &str,
        key: &str,
    ) -> StoreResult<Option<LedgerEntry>> {
        let mut cache = self.cache.lock();
        Ok(hydrate(&mut cache, backend, ledger_key)?.get(key).copied())
    }

    /// Record `version` for `key` and persist the whole ledger
    ///
    /// # Errors
    /// Returns error if the ledger cannot be read or written
    pub fn record_version(
        &self,
        backend: &dyn StorageBackend,
        ledger_key: &str,
        key: &str,
        version: u32,
    ) -> StoreResult<()> {
        self.mutate(backend, ledger_key, |ledger| {
            ledger.insert(key.to_string(), LedgerEntry::new(version));
        })?;
        tracing::debug!(key, version, ledger_key, "recorded ledger version");
        Ok(())
    }

    /// Drop `key` from the ledger and persist the whole ledger
    ///
    /// # Errors
    /// Returns error if the ledger cannot be read or written
    pub fn remove(
        &self,
        backend: &dyn StorageBackend,
        ledger_key: &str,
        key: &str,
    ) -> StoreResult<()> {
        self.mutate(backend, ledger_key, |ledger| {
            ledger.shift_remove(key);
        })?;
        tracing::debug!(key, ledger_key, "removed ledger entry");
        Ok(())
    }

    fn mutate<F>(&self, backend: &dyn StorageBackend, ledger_key: &str, apply: F) -> StoreResult<()>
    where
        F: FnOnce(&mut Ledger),
    {
        let mut cache = self.cache.lock();
        let mut next = hydrate(&mut cache, backend, ledger_key)?.clone();
        apply(&mut next);

        let encoded = codec::encode(&serde_json::to_value(&next)?);
        backend.set(ledger_key, encoded.as_str())?;

        cache.insert(ledger_key.to_string(), next);
        Ok(())
    }
}

/// Cached ledger for `ledger_key`, reading it from the backend on first use
fn hydrate<'a>(
    cache: &'a mut HashMap<String, Ledger>,
    backend: &dyn StorageBackend,
    ledger_key: &str,
) -> StoreResult<&'a mut Ledger> {
    if !cache.contains_key(ledger_key) {
        let ledger = read_ledger(backend, ledger_key)?;
        tracing::debug!(ledger_key, entries = ledger.len(), "hydrated version ledger");
        cache.insert(ledger_key.to_string(), ledger);
    }
    Ok(cache.entry(ledger_key.to_string()).or_default())
}

/// Read and decode the persisted ledger; absent or malformed means empty
fn read_ledger(backend: &dyn StorageBackend, ledger_key: &str) -> StoreResult<Ledger> {
    let Some(raw) = backend.get(ledger_key)? else {
        return Ok(Ledger::new());
    };

    let ledger = match codec::decode(&raw) {
        Decoded::Json(serde_json::Value::Null) => Ledger::new(),
        Decoded::Json(value) => serde_json::from_value(value).unwrap_or_else(|e| {
            tracing::warn!(ledger_key, error = %e, "malformed version ledger, starting empty");
            Ledger::new()
        }),
        Decoded::Raw { reason, .. } => {
            tracing::warn!(ledger_key, %reason, "version ledger is not JSON, starting empty");
            Ledger::new()
        }
    };
    Ok(ledger)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pks_storage::{BackendError, BackendResult, MemoryBackend};
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Memory backend whose writes can be refused
    #[derive(Debug, Default)]
    struct Switchable {
        inner: MemoryBackend,
        read_only: AtomicBool,
    }

    impl Switchable {
        fn refuse_writes(&self) {
            self.read_only.store(true, Ordering::SeqCst);
        }

        fn check(&self) -> BackendResult<()> {
            if self.read_only.load(Ordering::SeqCst) {
                return Err(BackendError::Unavailable("read-only".to_string()));
            }
            Ok(())
        }
    }

    impl StorageBackend for Switchable {
        fn get(&self, key: &str) -> BackendResult<Option<String>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> BackendResult<()> {
            self.check()?;
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> BackendResult<()> {
            self.check()?;
            self.inner.remove(key)
        }

        fn keys(&self) -> BackendResult<Vec<String>> {
            self.inner.keys()
        }
    }

    #[test]
    fn failed_record_leaves_cache_and_storage_unchanged() {
        let backend = Switchable::default();
        let ledger = VersionLedger::new();
        ledger.record_version(&backend, "track", "user", 1).unwrap();

        backend.refuse_writes();
        assert!(ledger.record_version(&backend, "track", "user", 2).is_err());
        assert!(ledger.record_version(&backend, "track", "cart", 1).is_err());

        assert_eq!(
            ledger.entry(&backend, "track", "user").unwrap(),
            Some(LedgerEntry::new(1))
        );
        assert_eq!(ledger.entry(&backend, "track", "cart").unwrap(), None);
        assert_eq!(
            backend.get("track").unwrap().as_deref(),
            Some(r#"{"user":{"v":1}}"#)
        );
    }

    #[test]
    fn failed_remove_keeps_entry() {
        let backend = Switchable::default();
        let ledger = VersionLedger::new();
        ledger.record_version(&backend, "track", "user", 3).unwrap();

        backend.refuse_writes();
        assert!(ledger.remove(&backend, "track", "user").is_err());

        assert_eq!(
            ledger.entry(&backend, "track", "user").unwrap(),
            Some(LedgerEntry::new(3))
        );
        assert_eq!(
            backend.get("track").unwrap().as_deref(),
            Some(r#"{"user":{"v":3}}"#)
        );
    }

    #[test]
    fn load_missing_ledger_is_empty() {
        let backend = MemoryBackend::new();
        let ledger = VersionLedger::new();
        assert!(ledger.load(&backend, "track").unwrap().is_empty());
        assert!(backend.get("track").unwrap().is_none());
    }

    #[test]
    fn record_writes_through() {
        let backend = MemoryBackend::new();
        let ledger = VersionLedger::new();

        ledger.record_version(&backend, "track", "user", 1).unwrap();
        assert_eq!(
            backend.get("track").unwrap().as_deref(),
            Some(r#"{"user":{"v":1}}"#)
        );
        assert_eq!(
            ledger.entry(&backend, "track", "user").unwrap(),
            Some(LedgerEntry::new(1))
        );
    }

    #[test]
    fn entries_keep_insertion_order() {
        let backend = MemoryBackend::new();
        let ledger = VersionLedger::new();

        ledger.record_version(&backend, "track", "user", 1).unwrap();
        ledger.record_version(&backend, "track", "cart", 2).unwrap();
        ledger.record_version(&backend, "track", "user", 3).unwrap();

        assert_eq!(
            backend.get("track").unwrap().as_deref(),
            Some(r#"{"user":{"v":3},"cart":{"v":2}}"#)
        );
    }

    #[test]
    fn remove_persists_shorter_ledger() {
        let backend = MemoryBackend::with_entries([("track", r#"{"user":{"v":1},"cart":{"v":1}}"#)]);
        let ledger = VersionLedger::new();

        ledger.remove(&backend, "track", "user").unwrap();
        assert_eq!(
            backend.get("track").unwrap().as_deref(),
            Some(r#"{"cart":{"v":1}}"#)
        );
    }

    #[test]
    fn hydrates_once() {
        let backend = MemoryBackend::with_entries([("track", r#"{"user":{"v":2}}"#)]);
        let ledger = VersionLedger::new();
        assert_eq!(
            ledger.entry(&backend, "track", "user").unwrap(),
            Some(LedgerEntry::new(2))
        );

        // Out-of-band writes are not observed after hydration
        backend.set("track", r#"{"user":{"v":9}}"#).unwrap();
        assert_eq!(
            ledger.entry(&backend, "track", "user").unwrap(),
            Some(LedgerEntry::new(2))
        );
    }

    #[test]
    fn malformed_ledger_starts_empty() {
        let backend = MemoryBackend::with_entries([("track", "not json")]);
        let ledger = VersionLedger::new();
        assert!(ledger.load(&backend, "track").unwrap().is_empty());

        let backend = MemoryBackend::with_entries([("track", r#"{"user":"v1"}"#)]);
        let ledger = VersionLedger::new();
        assert!(ledger.load(&backend, "track").unwrap().is_empty());
    }

    #[test]
    fn ledgers_are_cached_per_physical_key() {
        let backend = MemoryBackend::new();
        let ledger = VersionLedger::new();

        ledger.record_version(&backend, "a#track", "user", 1).unwrap();
        ledger.record_version(&backend, "b#track", "user", 2).unwrap();

        assert_eq!(
            ledger.entry(&backend, "a#track", "user").unwrap(),
            Some(LedgerEntry::new(1))
        );
        assert_eq!(
            ledger.entry(&backend, "b#track", "user").unwrap(),
            Some(LedgerEntry::new(2))
        );
    }
}
