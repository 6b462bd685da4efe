//! Content kinds and the system fields carried by records.

use serde::{Deserialize, Serialize};

use crate::value::{Record, Value};

/// Metadata sub-object written by the admin side on every save.
pub const META_FIELD: &str = "_meta";
/// Explicit slug of a collection item.
pub const SLUG_FIELD: &str = "_slug";
/// Publication status of a collection item.
pub const STATUS_FIELD: &str = "_status";
/// Featured flag of a collection item.
pub const FEATURED_FIELD: &str = "_featured";

/// Extension of stored records.
pub const RECORD_EXTENSION: &str = "json";

/// Whether a content type holds one record or many.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// Exactly one record, rendered to one file.
    Page,
    /// Many records, one output file per item.
    Collection,
}

/// Publication status of a collection item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Not yet public.
    Draft,
    /// Public and listed.
    #[default]
    Published,
    /// Public but left out of listings.
    Unlisted,
}

impl Status {
    /// Read the status of a record; missing or unknown values count as published.
    #[must_use]
    pub fn of(record: &Record) -> Self {
        match record.get(STATUS_FIELD).and_then(Value::as_str) {
            Some("draft") => Self::Draft,
            Some("unlisted") => Self::Unlisted,
            _ => Self::Published,
        }
    }

    /// Name written into the transient `status` field.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Unlisted => "unlisted",
        }
    }
}

/// Creation and update timestamps from a record's `_meta` object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Meta {
    /// `_meta.created`, as stored.
    pub created: Option<Value>,
    /// `_meta.updated`, as stored.
    pub updated: Option<Value>,
}

impl Meta {
    /// Extract the timestamps without modifying the record.
    #[must_use]
    pub fn of(record: &Record) -> Self {
        let Some(meta) = record.get(META_FIELD).and_then(Value::as_record) else {
            return Self::default();
        };
        Self {
            created: meta.get("created").cloned(),
            updated: meta.get("updated").cloned(),
        }
    }

    /// Write `created_at` / `updated_at` convenience fields into `record`.
    pub fn apply(&self, record: &mut Record) {
        if let Some(created) = &self.created {
            record.insert("created_at".to_string(), created.clone());
        }
        if let Some(updated) = &self.updated {
            record.insert("updated_at".to_string(), updated.clone());
        }
    }
}

/// Whether the record is flagged as featured.
#[must_use]
pub fn is_featured(record: &Record) -> bool {
    record.get(FEATURED_FIELD).is_some_and(Value::is_truthy)
}
