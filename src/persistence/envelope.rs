//! Versioned storage envelope
//!
//! Every value written by the store is wrapped as
//! `{"version": "...", "payload": ..., "savedAt": "..."}`. Values written
//! before versioning existed are bare payloads and are read as-is.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Schema version stamped on every save
pub const CURRENT_VERSION: &str = "1.0.0";

/// Envelope persisted under each key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecord<T> {
    pub version: String,
    pub payload: T,
    pub saved_at: DateTime<Utc>,
}

impl<T> StoredRecord<T> {
    /// Wrap a payload with the current version and timestamp
    pub fn new(payload: T) -> Self {
        Self {
            version: CURRENT_VERSION.to_string(),
            payload,
            saved_at: Utc::now(),
        }
    }
}

/// Version tag of a parsed value, if it is shaped like an envelope
///
/// An envelope is an object with a string `version` and a `payload` field.
pub fn envelope_version(value: &Value) -> Option<&str> {
    let obj = value.as_object()?;
    if !obj.contains_key("payload") {
        return None;
    }
    obj.get("version")?.as_str()
}

/// Take the payload out of an envelope-shaped value
pub fn into_payload(value: Value) -> Value {
    match value {
        Value::Object(mut obj) => obj.remove("payload").unwrap_or(Value::Null),
        other => other,
    }
}
