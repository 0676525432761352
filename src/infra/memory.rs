//! In-memory store and warehouse for local runs and tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

use crate::app::ports::{ObjectStorePort, WarehousePort};
use crate::domain::{AppendResult, TableId, TableSchema, TargetRow, TargetTable};
use crate::error::{LoaderError, Result};
use crate::pipeline::fetcher::decode_text;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
    read_failure: Mutex<Option<String>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, container: &str, key: &str, content: impl Into<Vec<u8>>) {
        lock(&self.objects).insert((container.to_string(), key.to_string()), content.into());
    }

    /// Makes every subsequent read fail like a broken transport.
    pub fn fail_reads_with(&self, message: &str) {
        *lock(&self.read_failure) = Some(message.to_string());
    }
}

#[async_trait]
impl ObjectStorePort for InMemoryObjectStore {
    async fn exists(&self, container: &str, key: &str) -> Result<bool> {
        Ok(lock(&self.objects).contains_key(&(container.to_string(), key.to_string())))
    }

    async fn read_text(&self, container: &str, key: &str) -> Result<String> {
        if let Some(message) = lock(&self.read_failure).clone() {
            return Err(LoaderError::fetch(container, key, message));
        }
        let bytes = lock(&self.objects)
            .get(&(container.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| LoaderError::NotFound {
                container: container.to_string(),
                key: key.to_string(),
            })?;
        decode_text(container, key, bytes)
    }
}

struct MemoryTable {
    schema: TableSchema,
    rows: Vec<TargetRow>,
}

/// Append-only tables keyed by id. Appends to unknown tables fail, and rows tagged
/// with an insert id already seen are dropped, as BigQuery does for `insertId`.
#[derive(Default)]
pub struct InMemoryWarehouse {
    tables: Mutex<HashMap<TableId, MemoryTable>>,
    insert_ids: Mutex<HashSet<String>>,
    rejection: Mutex<Option<String>>,
    fail_counts: AtomicBool,
    append_calls: AtomicUsize,
}

impl InMemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_table(&self, table: &TableId, schema: TableSchema) {
        lock(&self.tables).insert(
            table.clone(),
            MemoryTable {
                schema,
                rows: Vec::new(),
            },
        );
    }

    pub fn reject_loads_with(&self, message: &str) {
        *lock(&self.rejection) = Some(message.to_string());
    }

    pub fn fail_row_counts(&self, fail: bool) {
        self.fail_counts.store(fail, Ordering::SeqCst);
    }

    pub fn rows(&self, table: &TableId) -> Vec<TargetRow> {
        lock(&self.tables)
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    pub fn append_calls(&self) -> usize {
        self.append_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WarehousePort for InMemoryWarehouse {
    async fn append_rows(
        &self,
        table: &TableId,
        rows: &TargetTable,
        schema: &TableSchema,
        job_id: Option<&str>,
    ) -> Result<AppendResult> {
        self.append_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = lock(&self.rejection).clone() {
            return Err(LoaderError::load(table, message));
        }

        let mut tables = lock(&self.tables);
        let target = tables
            .get_mut(table)
            .ok_or_else(|| LoaderError::load(table, format!("Not found: Table {}", table)))?;
        if target.schema != *schema {
            return Err(LoaderError::load(
                table,
                format!(
                    "Provided schema {:?} does not match table schema {:?}",
                    schema.field_names(),
                    target.schema.field_names()
                ),
            ));
        }

        let mut seen = lock(&self.insert_ids);
        let mut deduplicated = 0usize;
        for (index, row) in rows.rows.iter().enumerate() {
            if let Some(id) = job_id {
                if !seen.insert(format!("{}_{}", id, index)) {
                    deduplicated += 1;
                    continue;
                }
            }
            target.rows.push(row.clone());
        }

        let load_id = job_id
            .map(str::to_string)
            .unwrap_or_else(|| format!("csv_loader_{}", Uuid::new_v4().simple()));
        debug!(load_id = %load_id, rows = rows.len(), deduplicated, "Appended rows to {}", table);
        // insertAll reports every accepted row, deduplicated or not
        Ok(AppendResult {
            job_id: load_id,
            output_row_count: rows.len() as u64,
        })
    }

    async fn get_row_count(&self, table: &TableId) -> Result<u64> {
        if self.fail_counts.load(Ordering::SeqCst) {
            return Err(LoaderError::load(table, "row count unavailable"));
        }
        lock(&self.tables)
            .get(table)
            .map(|t| t.rows.len() as u64)
            .ok_or_else(|| LoaderError::load(table, format!("Not found: Table {}", table)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FieldType;
    use chrono::{TimeZone, Utc};

    fn row(user: &str) -> TargetRow {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        TargetRow {
            user_id: Some(user.to_string()),
            event_timestamp: ts,
            country_code: "OT".to_string(),
            value: 1.0,
            is_high_value: false,
            processing_datetime: ts.naive_utc(),
        }
    }

    #[tokio::test]
    async fn test_repeated_load_id_is_deduplicated() {
        let warehouse = InMemoryWarehouse::new();
        let table = TableId::new("p", "d", "t");
        let schema = TableSchema::target(FieldType::String);
        warehouse.create_table(&table, schema.clone());
        let rows = TargetTable {
            rows: vec![row("u1"), row("u2")],
        };

        for _ in 0..2 {
            let result = warehouse
                .append_rows(&table, &rows, &schema, Some("load-1"))
                .await
                .unwrap();
            assert_eq!(result.job_id, "load-1");
            assert_eq!(result.output_row_count, 2);
        }
        assert_eq!(warehouse.rows(&table).len(), 2);
        assert_eq!(warehouse.append_calls(), 2);

        warehouse.append_rows(&table, &rows, &schema, None).await.unwrap();
        warehouse.append_rows(&table, &rows, &schema, None).await.unwrap();
        assert_eq!(warehouse.get_row_count(&table).await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_row_count_failure_toggle() {
        let warehouse = InMemoryWarehouse::new();
        let table = TableId::new("p", "d", "t");
        warehouse.create_table(&table, TableSchema::target(FieldType::String));
        warehouse.fail_row_counts(true);
        assert!(warehouse.get_row_count(&table).await.is_err());
        warehouse.fail_row_counts(false);
        assert_eq!(warehouse.get_row_count(&table).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_schema_mismatch_rejected() {
        let warehouse = InMemoryWarehouse::new();
        let table = TableId::new("p", "d", "t");
        warehouse.create_table(&table, TableSchema::target(FieldType::Integer));
        let err = warehouse
            .append_rows(
                &table,
                &TargetTable::default(),
                &TableSchema::target(FieldType::String),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LoaderError::Load { .. }));
    }

    #[tokio::test]
    async fn test_unknown_table_rejected() {
        let warehouse = InMemoryWarehouse::new();
        let table = TableId::new("p", "d", "missing");
        let err = warehouse
            .append_rows(
                &table,
                &TargetTable::default(),
                &TableSchema::target(FieldType::String),
                None,
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Not found"));
        assert!(warehouse.get_row_count(&table).await.is_err());
    }
}
