//! Data shapes that flow between the pipeline stages.
//!
//! `ObjectEvent` enters, `RawTable` leaves the parser, `TargetTable` leaves the
//! transformer and is handed to the warehouse together with a `TableSchema`.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::constants::*;
use crate::error::{LoaderError, Result};

/// Notification that an object was created in a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectEvent {
    pub container: String,
    pub object_key: String,
    pub event_id: String,
    pub event_type: String,
}

impl ObjectEvent {
    pub fn new(
        container: impl Into<String>,
        object_key: impl Into<String>,
        event_id: impl Into<String>,
        event_type: impl Into<String>,
    ) -> Self {
        Self {
            container: container.into(),
            object_key: object_key.into(),
            event_id: event_id.into(),
            event_type: event_type.into(),
        }
    }
}

/// A validated (container, key) pair the fetcher can resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub container: String,
    pub key: String,
}

impl ObjectRef {
    pub fn uri(&self) -> String {
        format!("gs://{}/{}", self.container, self.key)
    }
}

/// Parsed delimited text: a header plus rows aligned to it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// Appends a row. Callers align the row to the header width first.
    pub fn push_row(&mut self, row: Vec<String>) {
        debug_assert_eq!(row.len(), self.headers.len());
        self.rows.push(row);
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = RawRecord<'_>> {
        self.rows.iter().map(move |values| RawRecord {
            headers: &self.headers,
            values,
        })
    }
}

/// Column-name view over one row of a `RawTable`.
#[derive(Debug, Clone, Copy)]
pub struct RawRecord<'a> {
    headers: &'a [String],
    values: &'a [String],
}

impl<'a> RawRecord<'a> {
    /// Raw text for `column`; `None` when the column is absent or the cell is empty.
    pub fn get(&self, column: &str) -> Option<&'a str> {
        let idx = self.headers.iter().position(|h| h == column)?;
        let value = self.values.get(idx)?.as_str();
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    }
}

/// One row of the warehouse table. Field order is the column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetRow {
    /// `None` for a blank cell, loaded as NULL
    pub user_id: Option<String>,
    #[serde(serialize_with = "serialize_timestamp")]
    pub event_timestamp: DateTime<Utc>,
    pub country_code: String,
    pub value: f64,
    pub is_high_value: bool,
    #[serde(serialize_with = "serialize_datetime")]
    pub processing_datetime: NaiveDateTime,
}

fn serialize_timestamp<S: Serializer>(
    ts: &DateTime<Utc>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Micros, true))
}

fn serialize_datetime<S: Serializer>(
    dt: &NaiveDateTime,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&dt.format("%Y-%m-%dT%H:%M:%S%.6f").to_string())
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetTable {
    pub rows: Vec<TargetRow>,
}

impl TargetTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Newline-delimited JSON, one object per row.
    pub fn to_ndjson(&self) -> std::result::Result<String, serde_json::Error> {
        let mut out = String::new();
        for row in &self.rows {
            out.push_str(&serde_json::to_string(row)?);
            out.push('\n');
        }
        Ok(out)
    }
}

/// Fully qualified warehouse table, `project.dataset.table`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableId {
    pub project: String,
    pub dataset: String,
    pub table: String,
}

impl TableId {
    pub fn new(
        project: impl Into<String>,
        dataset: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            dataset: dataset.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

impl FromStr for TableId {
    type Err = LoaderError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('.').collect();
        match parts.as_slice() {
            [p, d, t] if !p.is_empty() && !d.is_empty() && !t.is_empty() => {
                Ok(TableId::new(*p, *d, *t))
            }
            _ => Err(LoaderError::Config(format!(
                "table id '{}' is not of the form project.dataset.table",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldType {
    String,
    Integer,
    Float,
    Boolean,
    Timestamp,
    Datetime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldMode {
    Required,
    Nullable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub mode: FieldMode,
}

impl FieldSchema {
    fn nullable(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            mode: FieldMode::Nullable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub fields: Vec<FieldSchema>,
}

impl TableSchema {
    /// The six target columns in load order.
    pub fn target(user_id_type: FieldType) -> Self {
        Self {
            fields: vec![
                FieldSchema::nullable(COL_USER_ID, user_id_type),
                FieldSchema::nullable(COL_EVENT_TIMESTAMP, FieldType::Timestamp),
                FieldSchema::nullable(COL_COUNTRY_CODE, FieldType::String),
                FieldSchema::nullable(COL_VALUE, FieldType::Float),
                FieldSchema::nullable(COL_IS_HIGH_VALUE, FieldType::Boolean),
                FieldSchema::nullable(COL_PROCESSING_DATETIME, FieldType::Datetime),
            ],
        }
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }
}

/// What the warehouse reports after an append completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendResult {
    pub job_id: String,
    pub output_row_count: u64,
}
