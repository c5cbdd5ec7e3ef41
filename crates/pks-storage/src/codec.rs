//! Value ↔ stored-string codec
//!
//! Both directions are total. Instead of silently falling back, each returns a
//! tagged result so callers can tell structured data from pass-through data:
//!
//! - [`Encoded::Passthrough`]: the value could not be serialized and its
//!   display form was stored as-is
//! - [`Decoded::Raw`]: the stored string is not JSON (a bare primitive written
//!   by someone else, or corrupt data) and is handed back unchanged

use serde::Serialize;
use serde_json::Value;
use std::fmt::Display;

/// Result of encoding a value for storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Encoded {
    /// Structured (JSON) serialization
    Json(String),
    /// Serialization failed; the value's display form is stored
    Passthrough(String),
}

impl Encoded {
    /// String to hand to the backend
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Json(s) | Self::Passthrough(s) => s,
        }
    }

    /// Consume into the stored string
    #[inline]
    #[must_use]
    pub fn into_string(self) -> String {
        match self {
            Self::Json(s) | Self::Passthrough(s) => s,
        }
    }

    /// Check if structured serialization succeeded
    #[inline]
    #[must_use]
    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json(_))
    }
}

/// Result of decoding a stored string
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// Stored string parsed as JSON
    Json(Value),
    /// Stored string is not JSON; returned unchanged
    Raw {
        /// The stored string
        raw: String,
        /// Why structured parsing failed
        reason: String,
    },
}

impl Decoded {
    /// Collapse into a value; raw strings become JSON strings
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Json(value) => value,
            Self::Raw { raw, .. } => Value::String(raw),
        }
    }

    /// Check if the stored string was JSON
    #[inline]
    #[must_use]
    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json(_))
    }
}

/// Encode a JSON value for storage
#[inline]
#[must_use]
pub fn encode(value: &Value) -> Encoded {
    encode_serialize(value)
}

/// Encode any serializable value, falling back to its display form
#[must_use]
pub fn encode_serialize<T>(value: &T) -> Encoded
where
    T: Serialize + Display + ?Sized,
{
    match serde_json::to_string(value) {
        Ok(json) => Encoded::Json(json),
        Err(e) => {
            tracing::debug!(error = %e, "value not serializable, storing display form");
            Encoded::Passthrough(value.to_string())
        }
    }
}

/// Decode a stored string
#[must_use]
pub fn decode(raw: &str) -> Decoded {
    match serde_json::from_str(raw) {
        Ok(value) => Decoded::Json(value),
        Err(e) => Decoded::Raw {
            raw: raw.to_string(),
            reason: e.to_string(),
        },
    }
}
