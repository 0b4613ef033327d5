//! Listener filters.
//!
//! A [`Filter`] is either a field mapping or an arbitrary predicate. Both are
//! compiled once, at registration, into a [`CompiledFilter`] so the dispatch
//! path only ever calls a single predicate shape.
//!
//! # Example
//!
//! ```rust,ignore
//! use wikistream_core::Filter;
//!
//! // Field mapping: every listed field must be present and equal.
//! let edits = Filter::field("type", "edit").and("bot", false);
//!
//! // Arbitrary predicate.
//! let articles = Filter::predicate(|rec| rec.get_i64("namespace") == Some(0));
//!
//! // Match everything.
//! let all = Filter::any();
//! ```

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::StreamError;
use crate::record::EventRecord;

/// A type-erased predicate over decoded records.
pub type PredicateFn = Arc<dyn Fn(&EventRecord) -> bool + Send + Sync>;

/// Decides whether a listener runs for a given record.
#[derive(Clone)]
pub enum Filter {
    /// Every key must be present in the record with an equal value.
    ///
    /// An empty mapping matches every record.
    Fields(Map<String, Value>),

    /// A caller-supplied predicate.
    Predicate(PredicateFn),
}

impl Default for Filter {
    fn default() -> Self {
        Self::any()
    }
}

impl Filter {
    /// A filter that matches every record.
    pub fn any() -> Self {
        Self::Fields(Map::new())
    }

    /// A field filter with a single key.
    pub fn field(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::any().and(key, value)
    }

    /// A predicate filter.
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&EventRecord) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(f))
    }

    /// Adds a required field.
    ///
    /// On a predicate filter the field check is combined with the predicate.
    pub fn and(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        let value = value.into();
        match self {
            Self::Fields(mut fields) => {
                fields.insert(key, value);
                Self::Fields(fields)
            }
            Self::Predicate(pred) => {
                let mut fields = Map::new();
                fields.insert(key, value);
                Self::predicate(move |rec| pred(rec) && fields_match(&fields, rec))
            }
        }
    }

    /// Compiles this filter into a uniform predicate.
    pub fn compile(&self) -> CompiledFilter {
        match self {
            Self::Predicate(pred) => CompiledFilter(Arc::clone(pred)),
            Self::Fields(fields) if fields.is_empty() => {
                CompiledFilter(Arc::new(|_: &EventRecord| true))
            }
            Self::Fields(fields) => {
                let fields = fields.clone();
                CompiledFilter(Arc::new(move |rec: &EventRecord| fields_match(&fields, rec)))
            }
        }
    }
}

impl From<Map<String, Value>> for Filter {
    fn from(fields: Map<String, Value>) -> Self {
        Self::Fields(fields)
    }
}

impl TryFrom<Value> for Filter {
    type Error = StreamError;

    /// Builds a field filter from a JSON object. `null` is treated as `{}`.
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(fields) => Ok(Self::Fields(fields)),
            Value::Null => Ok(Self::any()),
            other => Err(StreamError::InvalidFilter(format!(
                "expected a JSON object of field values, got {other}"
            ))),
        }
    }
}

impl std::fmt::Debug for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fields(fields) => f.debug_tuple("Fields").field(fields).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// A filter in its dispatch-ready form.
#[derive(Clone)]
pub struct CompiledFilter(PredicateFn);

impl CompiledFilter {
    /// Evaluates the filter against a record.
    pub fn matches(&self, record: &EventRecord) -> bool {
        (self.0)(record)
    }
}

impl std::fmt::Debug for CompiledFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CompiledFilter(..)")
    }
}

/// Returns `true` if every expected field is present in the record and equal.
///
/// A missing key never matches, even when the expected value is `null`.
fn fields_match(fields: &Map<String, Value>, record: &EventRecord) -> bool {
    fields.iter().all(|(key, expected)| {
        record
            .get(key)
            .is_some_and(|actual| values_equal(actual, expected))
    })
}

/// Strict equality, except that numbers compare by numeric value.
fn values_equal(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => a.as_f64() == b.as_f64(),
        },
        _ => actual == expected,
    }
}
