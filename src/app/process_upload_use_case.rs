use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, Instrument};

use crate::app::ports::{ObjectStorePort, WarehousePort};
use crate::config::LoaderConfig;
use crate::domain::{ObjectEvent, TableId, TableSchema};
use crate::error::Result;
use crate::idempotency::load_job_id;
use crate::observability::metrics;
use crate::pipeline::{EventReceiver, Reception, RecordParser, SinkLoader, SourceFetcher, Transformer};

/// Result of one successful invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InvocationOutcome {
    Skipped { key: String, reason: String },
    Loaded(LoadReport),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadReport {
    pub event_id: String,
    pub source: String,
    pub table: String,
    pub rows_parsed: usize,
    pub rows_written: u64,
    pub job_id: Option<String>,
    pub total_rows: Option<u64>,
    pub elapsed_ms: u64,
}

/// Receive → fetch → parse → transform → load for a single object event.
pub struct ProcessUploadUseCase {
    store: Arc<dyn ObjectStorePort>,
    warehouse: Arc<dyn WarehousePort>,
    receiver: EventReceiver,
    parser: RecordParser,
    transformer: Transformer,
    table: TableId,
    schema: TableSchema,
    deterministic_job_id: bool,
}

impl ProcessUploadUseCase {
    pub fn new(
        config: &LoaderConfig,
        store: Arc<dyn ObjectStorePort>,
        warehouse: Arc<dyn WarehousePort>,
    ) -> Self {
        Self {
            store,
            warehouse,
            receiver: EventReceiver::new(&config.source.extension),
            parser: RecordParser::from_config(&config.source),
            transformer: Transformer::from_config(&config.transform),
            table: config.table_id(),
            schema: TableSchema::target(config.warehouse.user_id_type),
            deterministic_job_id: config.load.deterministic_job_id,
        }
    }

    /// Runs the event end to end. Failures are logged with their stage and returned
    /// unchanged; nothing is retried.
    pub async fn process_event(&self, event: &ObjectEvent) -> Result<InvocationOutcome> {
        let span = tracing::info_span!(
            "invocation",
            event_id = %event.event_id,
            bucket = %event.container,
            object = %event.object_key
        );
        let started = Instant::now();
        metrics::receiver::event_received();

        let result = self.run(event, started).instrument(span.clone()).await;
        metrics::invocation::duration(started.elapsed().as_secs_f64());

        if let Err(e) = &result {
            let _enter = span.enter();
            error!(stage = e.stage(), error = %e, "Invocation failed");
            metrics::invocation::failed(e.stage());
        }
        result
    }

    async fn run(&self, event: &ObjectEvent, started: Instant) -> Result<InvocationOutcome> {
        let object = match self.receiver.receive(event)? {
            Reception::Accepted(object) => object,
            Reception::Skipped { key, reason } => {
                metrics::receiver::event_skipped();
                return Ok(InvocationOutcome::Skipped { key, reason });
            }
        };

        let content = SourceFetcher::new(self.store.as_ref()).fetch(&object).await?;
        metrics::parser::source_bytes(content.len());

        let job_id = self
            .deterministic_job_id
            .then(|| load_job_id(&object.container, &object.key, &content));

        let raw = self.parser.parse(&content)?;
        drop(content);
        metrics::parser::rows_parsed(raw.len());
        info!(rows = raw.len(), columns = ?raw.headers(), "Parsed source file");

        let target = self.transformer.transform_at(&raw, Utc::now())?;

        let loader = SinkLoader::new(self.warehouse.as_ref(), &self.table, &self.schema);
        let summary = loader.load(&target, job_id.as_deref()).await?;
        if summary.job_id.is_some() {
            metrics::loader::load_job();
        }
        metrics::loader::rows_loaded(summary.rows_written);

        Ok(InvocationOutcome::Loaded(LoadReport {
            event_id: event.event_id.clone(),
            source: object.uri(),
            table: self.table.to_string(),
            rows_parsed: raw.len(),
            rows_written: summary.rows_written,
            job_id: summary.job_id,
            total_rows: summary.total_rows,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }))
    }
}
