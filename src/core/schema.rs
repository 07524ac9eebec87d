//! Schema resolution: which columns each CSV row carries, in which order.
//!
//! Two policies exist, selected by [`SchemaMode`]:
//!
//! - **Static** — an explicit column list. Record keys not in the list are
//!   dropped; listed keys a record lacks render as an empty cell. A column
//!   named twice is emitted twice, both cells sourced from the same key.
//! - **Dynamic** — the keys of the first record, in that record's order.
//!   Keys that only show up in later records are dropped, not appended.

use std::borrow::Cow;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::models::{Record, render_value};

/// Column list used by the original Cloudflare edge-log exports.
///
/// `response_body_size` appears twice; the duplicate is kept on purpose.
pub const CLOUDFLARE_LOG_COLUMNS: &[&str] = &[
    "timestamp",
    "geo_city",
    "response_status",
    "org",
    "apiKey",
    "shield",
    "cache",
    "host",
    "pop",
    "resTime",
    "response_body_size",
    "request_user_agent",
    "response_body_size",
    "url",
];

/// How the output columns are chosen.
///
/// Serializes as `"dynamic"` or `{"static": ["col", ...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaMode {
    /// Columns are the keys of the first valid record.
    #[default]
    Dynamic,
    /// Columns are given explicitly.
    Static(Vec<String>),
}

impl SchemaMode {
    /// Creates a static mode from any list of column names.
    pub fn fixed<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SchemaMode::Static(columns.into_iter().map(Into::into).collect())
    }

    /// Static mode with [`CLOUDFLARE_LOG_COLUMNS`].
    pub fn cloudflare() -> Self {
        Self::fixed(CLOUDFLARE_LOG_COLUMNS.iter().copied())
    }

    /// Returns `true` for [`SchemaMode::Dynamic`].
    pub fn is_dynamic(&self) -> bool {
        matches!(self, SchemaMode::Dynamic)
    }
}

/// Ordered column list, fixed once resolved.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    columns: Vec<String>,
}

impl Schema {
    /// Creates a schema from column names, keeping order and duplicates.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Takes the keys of `record`, in its own order.
    pub fn from_record(record: &Record) -> Self {
        Self::new(record.keys().cloned())
    }

    /// Returns the column names in output order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Returns each column name that occurs more than once, in first-seen order.
    pub fn duplicate_columns(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        let mut reported = HashSet::new();
        let mut duplicates = Vec::new();
        for column in &self.columns {
            if !seen.insert(column.as_str()) && reported.insert(column.as_str()) {
                duplicates.push(column.as_str());
            }
        }
        duplicates
    }

    /// Maps a record onto this schema, one cell per column.
    ///
    /// Missing keys yield an empty cell; keys the schema doesn't list are ignored.
    ///
    /// # Example
    ///
    /// ```
    /// use logpack::core::{Record, Schema};
    ///
    /// let schema = Schema::new(["b", "missing", "b"]);
    /// let record: Record = serde_json::from_str(r#"{"a": 1, "b": "x"}"#).unwrap();
    ///
    /// let row: Vec<_> = schema.project(&record).collect();
    /// assert_eq!(row, ["x", "", "x"]);
    /// ```
    pub fn project<'a>(&'a self, record: &'a Record) -> impl Iterator<Item = Cow<'a, str>> + 'a {
        self.columns.iter().map(move |column| {
            record
                .get(column)
                .map(render_value)
                .unwrap_or(Cow::Borrowed(""))
        })
    }
}

/// Fixes the [`Schema`] for a run according to a [`SchemaMode`].
#[derive(Debug, Clone)]
pub struct SchemaResolver {
    mode: SchemaMode,
}

impl SchemaResolver {
    pub fn new(mode: SchemaMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> &SchemaMode {
        &self.mode
    }

    /// Returns `true` if resolution has to wait for the first record.
    pub fn needs_first_record(&self) -> bool {
        self.mode.is_dynamic()
    }

    /// Resolves the schema.
    ///
    /// `first` is the first valid record of the run, or `None` if the input
    /// holds no valid record. Static mode ignores it; dynamic mode with no
    /// record resolves to an empty schema.
    pub fn resolve(&self, first: Option<&Record>) -> Schema {
        match &self.mode {
            SchemaMode::Static(columns) => {
                let schema = Schema::new(columns.iter().cloned());
                let duplicates = schema.duplicate_columns();
                if !duplicates.is_empty() {
                    warn!(
                        columns = ?duplicates,
                        "static schema repeats column names; each occurrence is written as its own column"
                    );
                }
                schema
            }
            SchemaMode::Dynamic => match first {
                Some(record) => {
                    let schema = Schema::from_record(record);
                    if schema.is_empty() {
                        warn!("first record has no keys; dynamic schema is empty");
                    }
                    debug!(columns = schema.len(), "schema derived from first record");
                    schema
                }
                None => {
                    warn!("no valid records; dynamic schema is empty");
                    Schema::default()
                }
            },
        }
    }
}

/// Tracks record keys that a dynamic schema cannot represent.
///
/// Each distinct dropped key is logged once, the first time it appears.
#[derive(Debug, Default)]
pub struct KeyAudit {
    known: HashSet<String>,
    dropped: HashSet<String>,
}

impl KeyAudit {
    pub fn new(schema: &Schema) -> Self {
        Self {
            known: schema.columns().iter().cloned().collect(),
            dropped: HashSet::new(),
        }
    }

    /// Records any keys of `record` that are outside the schema.
    pub fn observe(&mut self, record: &Record, line: u64) {
        for key in record.keys() {
            if !self.known.contains(key) && !self.dropped.contains(key) {
                debug!(key = %key, line, "key not in dynamic schema; dropping");
                self.dropped.insert(key.clone());
            }
        }
    }

    /// Returns the dropped keys, sorted.
    pub fn into_dropped(self) -> Vec<String> {
        let mut dropped: Vec<String> = self.dropped.into_iter().collect();
        dropped.sort();
        dropped
    }
}
