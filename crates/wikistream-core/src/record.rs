//! Decoded event records and the message decoder.
//!
//! Every raw payload delivered by a transport is parsed once into an
//! [`EventRecord`]. The record is an open mapping: the core never fixes a
//! schema, filters and listeners look at whatever fields the feed carries.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::trace;

use crate::error::DecodeError;

/// One decoded message from an event feed.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord(Value);

impl EventRecord {
    /// Wraps an already parsed JSON value.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Returns the value stored under `key`, if the record is an object that has it.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns the string stored under `key`.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Returns the boolean stored under `key`.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    /// Returns the integer stored under `key`.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    /// Returns the record as a field map, if it is a JSON object.
    pub fn as_object(&self) -> Option<&Map<String, Value>> {
        self.0.as_object()
    }

    /// Returns the underlying JSON value.
    pub fn value(&self) -> &Value {
        &self.0
    }

    /// Consumes the record, returning the underlying JSON value.
    pub fn into_value(self) -> Value {
        self.0
    }

    /// Deserializes the record into a typed view such as
    /// [`RecentChange`](crate::model::RecentChange).
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, DecodeError> {
        T::deserialize(&self.0).map_err(DecodeError::from)
    }
}

impl From<Value> for EventRecord {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for EventRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parses one raw payload, reporting why it was rejected.
pub fn try_decode(raw: &str) -> Result<EventRecord, DecodeError> {
    let value: Value = serde_json::from_str(raw)?;
    Ok(EventRecord(value))
}

/// Parses one raw payload into an [`EventRecord`].
///
/// Malformed payloads yield `None`. They are never reported as stream errors.
pub fn decode(raw: &str) -> Option<EventRecord> {
    match try_decode(raw) {
        Ok(record) => Some(record),
        Err(e) => {
            trace!(len = raw.len(), error = %e, "Dropping malformed message");
            None
        }
    }
}
