//! Field values stored in content records.
//!
//! Records are JSON on disk. In memory every value is one of a closed set of
//! variants with explicit, total conversions:
//!
//! | conversion  | Null  | Bool            | Number            | Text                          | List             | Record      |
//! |-------------|-------|-----------------|-------------------|-------------------------------|------------------|-------------|
//! | truthy      | false | itself          | non-zero          | non-empty, not `"0"`/`"false"`| non-empty        | non-empty   |
//! | as text     | `""`  | `"true"`/`""`   | JSON digits       | itself                        | joined by `", "` | `""`        |
//! | as date     | none  | none            | Unix seconds      | RFC 3339, datetime, date      | none             | none        |
//! | as items    | empty | error           | error             | error                         | record elements  | error       |

use std::{borrow::Cow, collections::BTreeMap};

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An ordered mapping from field name to value.
pub type Record = BTreeMap<String, Value>;

/// A single field value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum Value {
    /// Explicit `null`.
    #[default]
    Null,
    /// Boolean flag.
    Bool(bool),
    /// Number, kept in its JSON representation.
    Number(serde_json::Number),
    /// String.
    Text(String),
    /// Ordered list (structure fields, tags, multi-file fields).
    List(Vec<Value>),
    /// Nested mapping.
    Record(Record),
}

/// A value did not have the shape an accessor required.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("expected {expected}, found {found}")]
pub struct TypeMismatch {
    /// Shape the accessor wanted.
    pub expected: &'static str,
    /// Shape that was stored.
    pub found: &'static str,
}

impl Value {
    /// Short name of the variant, for diagnostics.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::Text(_) => "text",
            Self::List(_) => "list",
            Self::Record(_) => "record",
        }
    }

    /// Truthiness used by conditional template blocks.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
            Self::Text(s) => !(s.is_empty() || s == "0" || s == "false"),
            Self::List(items) => !items.is_empty(),
            Self::Record(record) => !record.is_empty(),
        }
    }

    /// Text rendering of the value.
    #[must_use]
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Self::Null | Self::Record(_) => Cow::Borrowed(""),
            Self::Bool(true) => Cow::Borrowed("true"),
            Self::Bool(false) => Cow::Borrowed(""),
            Self::Number(n) => Cow::Owned(n.to_string()),
            Self::Text(s) => Cow::Borrowed(s),
            Self::List(_) => Cow::Owned(self.join(", ")),
        }
    }

    /// Join list elements with `separator`; scalars render as themselves.
    #[must_use]
    pub fn join(&self, separator: &str) -> String {
        match self {
            Self::List(items) => items
                .iter()
                .map(|item| match item {
                    // Nested lists never flatten silently into one level.
                    Self::List(_) => String::new(),
                    other => other.as_text().into_owned(),
                })
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(separator),
            other => other.as_text().into_owned(),
        }
    }

    /// Interpret the value as a point in time.
    #[must_use]
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
            Self::Text(s) => parse_datetime(s.trim()),
            _ => None,
        }
    }

    /// Sub-records of a structure field.
    pub fn as_items(&self) -> Result<Vec<&Record>, TypeMismatch> {
        match self {
            Self::Null => Ok(Vec::new()),
            Self::List(items) => items
                .iter()
                .map(|item| match item {
                    Self::Record(record) => Ok(record),
                    other => Err(TypeMismatch {
                        expected: "record",
                        found: other.kind_name(),
                    }),
                })
                .collect(),
            other => Err(TypeMismatch {
                expected: "list of records",
                found: other.kind_name(),
            }),
        }
    }

    /// Borrow the nested record, if this is one.
    #[must_use]
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record(record) => Some(record),
            _ => None,
        }
    }

    /// Borrow the string, if this is text.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Look up a dotted path (`author.name`) in a record.
#[must_use]
pub fn lookup<'a>(record: &'a Record, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = record.get(first)?;
    for segment in segments {
        current = current.as_record()?.get(segment)?;
    }
    Some(current)
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n),
            serde_json::Value::String(s) => Self::Text(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => {
                Self::Record(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::Text(s) => Self::String(s),
            Value::List(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Value::Record(record) => {
                Self::Object(record.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Self::Record(record)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}
