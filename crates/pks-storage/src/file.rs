//! File-backed storage
//!
//! Keeps the whole store as one JSON object (`{ physicalKey: string }`) on disk.
//! The document is read once on open and rewritten in full after every
//! mutation, via a sibling temp file and a rename so a crash never leaves a
//! half-written document behind.

use crate::backend::StorageBackend;
use crate::error::{BackendError, BackendResult};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Backend persisting to a single JSON file
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileBackend {
    /// Open (or lazily create) the store document at `path`
    ///
    /// A missing file is an empty store; the file is created on first write.
    ///
    /// # Errors
    /// Returns error if the file exists but cannot be read or is not a JSON
    /// object of strings
    pub fn open(path: impl Into<PathBuf>) -> BackendResult<Self> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text)
                .map_err(|e| BackendError::corrupt(&path, e))?,
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(BackendError::io_error(&path, e)),
        };

        tracing::debug!(path = %path.display(), entries = entries.len(), "opened file store");

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Path of the backing document
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `mutate` to a copy of the entries, persist, then commit in memory
    fn write_with<F>(&self, mutate: F) -> BackendResult<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let mut guard = self.entries.lock();
        let mut next = guard.clone();
        mutate(&mut next);
        self.persist(&next)?;
        *guard = next;
        Ok(())
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> BackendResult<()> {
        let body = serde_json::to_string_pretty(entries)
            .map_err(|e| BackendError::corrupt(&self.path, e))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| BackendError::io_error(parent, e))?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, body).map_err(|e| BackendError::io_error(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| BackendError::io_error(&self.path, e))
    }
}

impl StorageBackend for FileBackend {
    fn get(&self, key: &str) -> BackendResult<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> BackendResult<()> {
        self.write_with(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> BackendResult<()> {
        if !self.entries.lock().contains_key(key) {
            return Ok(());
        }
        self.write_with(|entries| {
            entries.remove(key);
        })
    }

    fn keys(&self) -> BackendResult<Vec<String>> {
        Ok(self.entries.lock().keys().cloned().collect())
    }
}
