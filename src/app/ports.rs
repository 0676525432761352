use async_trait::async_trait;

use crate::domain::{AppendResult, TableId, TableSchema, TargetTable};
use crate::error::Result;

/// Read side of the object store that raised the event.
#[async_trait]
pub trait ObjectStorePort: Send + Sync {
    async fn exists(&self, container: &str, key: &str) -> Result<bool>;
    async fn read_text(&self, container: &str, key: &str) -> Result<String>;
}

/// Append-only warehouse sink.
#[async_trait]
pub trait WarehousePort: Send + Sync {
    /// Submits an append load and blocks until the warehouse reports it finished.
    /// `job_id` is generated by the adapter when `None`.
    async fn append_rows(
        &self,
        table: &TableId,
        rows: &TargetTable,
        schema: &TableSchema,
        job_id: Option<&str>,
    ) -> Result<AppendResult>;

    async fn get_row_count(&self, table: &TableId) -> Result<u64>;
}
