//! Logical → physical key naming
//!
//! With a namespace `N` and delimiter `D`, logical key `K` is stored under
//! `N + D + K`. Without a namespace the logical key is used verbatim.
//!
//! The reserved names [`LEDGER_KEY`] and [`INIT_KEY`] go through the same
//! mapping, so a user key literally named `track` shares the ledger's physical
//! key. That collision is not guarded against.

/// Delimiter used when a namespace is set but no delimiter is
pub const DEFAULT_DELIMITER: &str = "/";

/// Reserved logical name of the version ledger
pub const LEDGER_KEY: &str = "track";

/// Reserved logical name of the session init marker
pub const INIT_KEY: &str = "init";

/// Deterministic namespace/delimiter key mapping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyNamer {
    namespace: Option<String>,
    delimiter: Option<String>,
}

impl KeyNamer {
    /// Create namer without namespace
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create namer from optional parts, as found in configuration
    #[must_use]
    pub fn from_parts(namespace: Option<&str>, delimiter: Option<&str>) -> Self {
        Self {
            namespace: namespace.map(str::to_string),
            delimiter: delimiter.map(str::to_string),
        }
    }

    /// With namespace
    #[inline]
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// With delimiter
    #[inline]
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }

    /// Active namespace; an empty namespace counts as none
    #[inline]
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref().filter(|ns| !ns.is_empty())
    }

    /// Effective delimiter
    #[inline]
    #[must_use]
    pub fn delimiter(&self) -> &str {
        self.delimiter
            .as_deref()
            .filter(|d| !d.is_empty())
            .unwrap_or(DEFAULT_DELIMITER)
    }

    /// Physical key for a logical key
    #[must_use]
    pub fn name(&self, logical_key: &str) -> String {
        match self.namespace() {
            Some(ns) => format!("{ns}{}{logical_key}", self.delimiter()),
            None => logical_key.to_string(),
        }
    }

    /// Physical key of the version ledger
    #[inline]
    #[must_use]
    pub fn ledger_key(&self) -> String {
        self.name(LEDGER_KEY)
    }

    /// Physical key of the session init marker
    #[inline]
    #[must_use]
    pub fn init_key(&self) -> String {
        self.name(INIT_KEY)
    }
}
