//! Value encoding between callers, the local tier and the remote store.
//!
//! Callers hand in any `Serialize` value. It is turned into an owned
//! `serde_json::Value` tree once, so the local tier never aliases caller
//! memory, and encoded as JSON bytes for the remote store. JSON numbers are
//! plain ASCII decimals, which keeps cached numbers usable as remote
//! counters.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use stratum_core::{CacheKey, CodecError};

/// Remote value treated as "not found" rather than as data.
const NOT_FOUND_ALIAS: i64 = -1;

pub(crate) fn to_value<T: Serialize + ?Sized>(key: &CacheKey, data: &T) -> Result<Value, CodecError> {
    serde_json::to_value(data).map_err(|e| CodecError::Encode {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

pub(crate) fn from_value<T: DeserializeOwned>(key: &CacheKey, value: Value) -> Result<T, CodecError> {
    serde_json::from_value(value).map_err(|e| CodecError::Decode {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

/// `None` and JSON `null` both read back as "no value".
pub(crate) fn typed<T: DeserializeOwned>(
    key: &CacheKey,
    value: Option<Value>,
) -> Result<Option<T>, CodecError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(value) => from_value(key, value).map(Some),
    }
}

pub(crate) fn encode(key: &CacheKey, value: &Value) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(value).map_err(|e| CodecError::Encode {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

/// Decode remote bytes. Plain UTF-8 text written by other clients comes
/// back as a JSON string.
pub(crate) fn decode(key: &CacheKey, bytes: &[u8]) -> Result<Value, CodecError> {
    match serde_json::from_slice(bytes) {
        Ok(value) => Ok(value),
        Err(e) => std::str::from_utf8(bytes)
            .map(|text| Value::String(text.to_string()))
            .map_err(|_| CodecError::Decode {
                key: key.to_string(),
                reason: e.to_string(),
            }),
    }
}

/// Whether a remote value reads as a miss: empty or falsy, or the `-1`
/// not-found alias.
pub(crate) fn is_miss_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => {
            n.as_i64() == Some(0)
                || n.as_u64() == Some(0)
                || n.as_f64() == Some(0.0)
                || n.as_i64() == Some(NOT_FOUND_ALIAS)
        }
        Value::String(s) => s.is_empty() || s == "0",
        Value::Array(items) => items.is_empty(),
        Value::Object(_) => false,
    }
}
