//! Read-side cleanup of stored documents.
//!
//! Older writers stored `content` as a JSON-encoded string and `createdAt`
//! as an RFC 3339 string or an extended-JSON `{"$date": ...}` wrapper. Both
//! are rewritten into the canonical shape before typed decoding.

use chrono::DateTime;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::warn;

use crate::error::{MemoryError, MemoryResult};
use crate::storage::{Document, Field};

/// Rewrite `content` and `createdAt` into their canonical forms.
pub fn normalize_document(mut doc: Document) -> Document {
    let content = match doc.get(Field::Content.as_str()) {
        Some(Value::String(raw)) => Some(parse_content(raw)),
        _ => None,
    };
    if let Some(content) = content {
        doc.insert(Field::Content.to_string(), content);
    }

    let created_at = doc.get(Field::CreatedAt.as_str()).and_then(timestamp_millis);
    if let Some(millis) = created_at {
        doc.insert(Field::CreatedAt.to_string(), Value::from(millis));
    }
    doc
}

fn parse_content(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ Value::Object(_)) => value,
        // Plain text that happened to be stored as a string
        _ => json!({ "text": raw }),
    }
}

/// Epoch milliseconds from any accepted timestamp encoding.
pub fn timestamp_millis(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.timestamp_millis())
            .ok()
            .or_else(|| s.parse::<i64>().ok()),
        Value::Object(map) => map.get("$date").and_then(timestamp_millis),
        _ => None,
    }
}

/// Normalize and decode one document.
pub fn decode<T: DeserializeOwned>(doc: Document) -> MemoryResult<T> {
    let id = doc
        .get(Field::Id.as_str())
        .map(|v| v.as_str().map_or_else(|| v.to_string(), str::to_string))
        .unwrap_or_default();
    serde_json::from_value(Value::Object(normalize_document(doc))).map_err(|e| {
        MemoryError::Decode {
            id,
            reason: e.to_string(),
        }
    })
}

/// Decode a batch, dropping documents that do not decode.
pub fn decode_lossy<T: DeserializeOwned>(docs: impl IntoIterator<Item = Document>) -> Vec<T> {
    docs.into_iter()
        .filter_map(|doc| match decode(doc) {
            Ok(record) => Some(record),
            Err(error) => {
                warn!(%error, "Skipping undecodable document");
                None
            }
        })
        .collect()
}
