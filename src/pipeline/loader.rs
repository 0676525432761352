use tracing::{info, warn};

use crate::app::ports::WarehousePort;
use crate::domain::{TableId, TableSchema, TargetTable};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    /// `None` when there was nothing to load
    pub job_id: Option<String>,
    pub rows_written: u64,
    /// Best-effort read after the load; `None` if the count lookup failed
    pub total_rows: Option<u64>,
}

/// Appends a transformed table and reports what the warehouse says it wrote.
pub struct SinkLoader<'a> {
    warehouse: &'a dyn WarehousePort,
    table: &'a TableId,
    schema: &'a TableSchema,
}

impl<'a> SinkLoader<'a> {
    pub fn new(warehouse: &'a dyn WarehousePort, table: &'a TableId, schema: &'a TableSchema) -> Self {
        Self {
            warehouse,
            table,
            schema,
        }
    }

    pub async fn load(&self, rows: &TargetTable, job_id: Option<&str>) -> Result<LoadSummary> {
        if rows.is_empty() {
            info!("No rows to load into {}", self.table);
            return Ok(LoadSummary {
                job_id: None,
                rows_written: 0,
                total_rows: self.row_count().await,
            });
        }

        info!("Loading {} rows into table: {}", rows.len(), self.table);
        let result = self
            .warehouse
            .append_rows(self.table, rows, self.schema, job_id)
            .await?;

        if result.output_row_count != rows.len() as u64 {
            warn!(
                job_id = %result.job_id,
                submitted = rows.len(),
                written = result.output_row_count,
                "Warehouse wrote a different number of rows than submitted"
            );
        }

        let total_rows = self.row_count().await;
        info!(
            "Load job {} completed. Output rows: {}. Total rows in '{}': {}",
            result.job_id,
            result.output_row_count,
            self.table,
            total_rows.map_or_else(|| "unknown".to_string(), |n| n.to_string())
        );

        Ok(LoadSummary {
            job_id: Some(result.job_id),
            rows_written: result.output_row_count,
            total_rows,
        })
    }

    async fn row_count(&self) -> Option<u64> {
        match self.warehouse.get_row_count(self.table).await {
            Ok(n) => Some(n),
            Err(e) => {
                warn!(error = %e, "Could not read row count for {}", self.table);
                None
            }
        }
    }
}
