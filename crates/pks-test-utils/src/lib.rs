//! Testing utilities for PKS workspace
//!
//! Shared test helpers, fixtures, and instrumented backends.

#![allow(missing_docs)]

use parking_lot::Mutex;
use pks_core::{ConfigPatch, KeySchema, SharedStateBinder, Store};
use pks_storage::{BackendError, BackendResult, MemoryBackend, StorageBackend};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Backend operation as seen by [`RecordingBackend`]
#[derive(Debug, Clone, PartialEq, Eq)]
enum Op {
    Get(String),
    Set(String, String),
    Remove(String),
}

/// In-memory backend that logs every call
#[derive(Debug, Default)]
pub struct RecordingBackend {
    inner: MemoryBackend,
    ops: Mutex<Vec<Op>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            inner: MemoryBackend::with_entries(entries),
            ops: Mutex::new(Vec::new()),
        }
    }

    /// Number of writes to `key`
    pub fn set_count(&self, key: &str) -> usize {
        self.ops
            .lock()
            .iter()
            .filter(|op| matches!(op, Op::Set(k, _) if k == key))
            .count()
    }

    /// Number of reads of `key`
    pub fn get_count(&self, key: &str) -> usize {
        self.ops
            .lock()
            .iter()
            .filter(|op| matches!(op, Op::Get(k) if k == key))
            .count()
    }

    pub fn clear_ops(&self) {
        self.ops.lock().clear();
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.inner.snapshot()
    }

    /// Stored string for `key`, bypassing the op log
    pub fn raw(&self, key: &str) -> Option<String> {
        self.inner.snapshot().remove(key)
    }

    /// Stored value for `key` parsed as JSON, bypassing the op log
    pub fn json(&self, key: &str) -> Option<Value> {
        self.raw(key).and_then(|raw| serde_json::from_str(&raw).ok())
    }
}

impl StorageBackend for RecordingBackend {
    fn get(&self, key: &str) -> BackendResult<Option<String>> {
        self.ops.lock().push(Op::Get(key.to_string()));
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> BackendResult<()> {
        self.ops
            .lock()
            .push(Op::Set(key.to_string(), value.to_string()));
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> BackendResult<()> {
        self.ops.lock().push(Op::Remove(key.to_string()));
        self.inner.remove(key)
    }

    fn keys(&self) -> BackendResult<Vec<String>> {
        self.inner.keys()
    }
}

/// In-memory backend whose writes can be switched off
#[derive(Debug, Default)]
pub struct FailingBackend {
    inner: MemoryBackend,
    fail_writes: AtomicBool,
}

impl FailingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.inner.snapshot()
    }

    fn check(&self) -> BackendResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable("writes disabled".to_string()));
        }
        Ok(())
    }
}

impl StorageBackend for FailingBackend {
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

pub fn guest_defaults() -> Value {
    json!({"name": "guest"})
}

pub fn user_schema() -> KeySchema {
    KeySchema::new(guest_defaults())
}

/// Store over `backend` with a fresh binder and one `user` schema
pub fn store_for(backend: Arc<dyn StorageBackend>, schema: KeySchema) -> (Store, Arc<SharedStateBinder>) {
    let binder = Arc::new(SharedStateBinder::new());
    let store = Store::with_config(
        ConfigPatch::new()
            .storage("user", schema)
            .backend(backend)
            .binder(binder.clone()),
    );
    (store, binder)
}
