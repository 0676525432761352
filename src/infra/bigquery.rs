//! BigQuery sink through `gcp-bigquery-client`.
//!
//! Rows are appended with `tabledata.insertAll` in batches of [`INSERT_BATCH_SIZE`].
//! Invalid rows are not skipped, so a batch with any bad row is rejected as a whole.
//! When a load id is supplied each row gets the insert id `<load id>_<row index>`,
//! which lets BigQuery drop a redelivered batch.

use async_trait::async_trait;
use gcp_bigquery_client::model::table_data_insert_all_request::TableDataInsertAllRequest;
use gcp_bigquery_client::model::table_data_insert_all_request_rows::TableDataInsertAllRequestRows;
use gcp_bigquery_client::Client;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::app::ports::WarehousePort;
use crate::domain::{AppendResult, TableId, TableSchema, TargetTable};
use crate::error::{LoaderError, Result};

pub const INSERT_BATCH_SIZE: usize = 500;

/// BigQuery client resolved from Application Default Credentials on first use.
#[derive(Default)]
pub struct BigQueryWarehouse {
    client: OnceCell<Client>,
}

impl BigQueryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client: OnceCell::new_with(Some(client)),
        }
    }

    async fn client(&self, table: &TableId) -> Result<&Client> {
        self.client
            .get_or_try_init(|| async {
                let client = Client::from_application_default_credentials()
                    .await
                    .map_err(|e| {
                        LoaderError::load(
                            table,
                            format!("Failed to create BigQuery client with ADC: {}", e),
                        )
                    })?;
                info!("Initialized BigQuery client");
                Ok::<_, LoaderError>(client)
            })
            .await
    }
}

/// Splits the table into insert requests, tagging rows with insert ids when `load_id` is set.
fn build_batches(
    table: &TableId,
    rows: &TargetTable,
    load_id: Option<&str>,
) -> Result<Vec<Vec<TableDataInsertAllRequestRows>>> {
    let mut batches = Vec::new();
    for (chunk_idx, chunk) in rows.rows.chunks(INSERT_BATCH_SIZE).enumerate() {
        let mut batch = Vec::with_capacity(chunk.len());
        for (offset, row) in chunk.iter().enumerate() {
            let index = chunk_idx * INSERT_BATCH_SIZE + offset;
            let json = serde_json::to_value(row)
                .map_err(|e| LoaderError::load(table, format!("row {} not encodable: {}", index, e)))?;
            batch.push(TableDataInsertAllRequestRows {
                insert_id: load_id.map(|id| format!("{}_{}", id, index)),
                json,
            });
        }
        batches.push(batch);
    }
    Ok(batches)
}

#[async_trait]
impl WarehousePort for BigQueryWarehouse {
    async fn append_rows(
        &self,
        table: &TableId,
        rows: &TargetTable,
        schema: &TableSchema,
        job_id: Option<&str>,
    ) -> Result<AppendResult> {
        let client = self.client(table).await?;
        let load_id = job_id
            .map(str::to_string)
            .unwrap_or_else(|| format!("csv_loader_{}", Uuid::new_v4().simple()));
        let insert_ids = job_id.map(|_| load_id.as_str());
        debug!(columns = ?schema.field_names(), "Appending to {}", table);

        let mut written = 0u64;
        for batch in build_batches(table, rows, insert_ids)? {
            let batch_size = batch.len();
            let mut request = TableDataInsertAllRequest::new();
            request
                .add_rows(batch)
                .map_err(|e| LoaderError::load(table, format!("Failed to add rows: {}", e)))?;

            let response = client
                .tabledata()
                .insert_all(&table.project, &table.dataset, &table.table, request)
                .await
                .map_err(|e| {
                    LoaderError::load(table, format!("{} (rows already appended: {})", e, written))
                })?;

            if let Some(insert_errors) = response.insert_errors.filter(|errs| !errs.is_empty()) {
                let details: Vec<String> = insert_errors
                    .iter()
                    .take(5)
                    .map(|err| format!("row {}: {:?}", err.index.unwrap_or(0), err.errors))
                    .collect();
                return Err(LoaderError::load(
                    table,
                    format!(
                        "{} of {} rows rejected (rows already appended: {}): {}",
                        insert_errors.len(),
                        batch_size,
                        written,
                        details.join("; ")
                    ),
                ));
            }
            written += batch_size as u64;
            debug!(written, "Inserted batch into {}", table);
        }

        Ok(AppendResult {
            job_id: load_id,
            output_row_count: written,
        })
    }

    async fn get_row_count(&self, table: &TableId) -> Result<u64> {
        let client = self.client(table).await?;
        let resource = client
            .table()
            .get(&table.project, &table.dataset, &table.table, None)
            .await
            .map_err(|e| LoaderError::load(table, e.to_string()))?;
        let rows = resource.num_rows.as_deref().and_then(|n| n.parse().ok());
        if rows.is_none() {
            warn!("Table {} reported no row count", table);
        }
        Ok(rows.unwrap_or(0))
    }
}
