//! Metrics for the loader, recorded through the `metrics` facade.
//!
//! Nothing is exported unless the binary installs the Prometheus recorder via
//! [`init`]; without it every call here is a no-op.

use std::fmt;
use std::net::SocketAddr;
use tracing::{info, warn};

/// Every metric the loader records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Receiver
    EventsReceived,
    EventsSkipped,

    // Fetch / parse
    SourceBytes,
    RowsParsed,

    // Load
    RowsLoaded,
    LoadJobs,

    // Invocation
    InvocationFailures,
    InvocationDuration,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::EventsReceived => "csv_loader_events_received_total",
            MetricName::EventsSkipped => "csv_loader_events_skipped_total",
            MetricName::SourceBytes => "csv_loader_source_bytes",
            MetricName::RowsParsed => "csv_loader_rows_parsed_total",
            MetricName::RowsLoaded => "csv_loader_rows_loaded_total",
            MetricName::LoadJobs => "csv_loader_load_jobs_total",
            MetricName::InvocationFailures => "csv_loader_invocation_failures_total",
            MetricName::InvocationDuration => "csv_loader_invocation_duration_seconds",
        }
    }

    pub fn all_metrics() -> impl Iterator<Item = MetricName> {
        use MetricName::*;
        [
            EventsReceived,
            EventsSkipped,
            SourceBytes,
            RowsParsed,
            RowsLoaded,
            LoadJobs,
            InvocationFailures,
            InvocationDuration,
        ]
        .into_iter()
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Installs the Prometheus exporter on `0.0.0.0:<port>`. Must run inside a Tokio runtime.
pub fn init(port: u16) {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(addr);
    match builder.install() {
        Ok(()) => info!("Prometheus exporter listening on http://{}/metrics", addr),
        Err(e) => warn!("Prometheus exporter install failed (possibly already installed): {}", e),
    }
}

pub mod receiver {
    use super::MetricName;

    pub fn event_received() {
        ::metrics::counter!(MetricName::EventsReceived.as_str()).increment(1);
    }

    pub fn event_skipped() {
        ::metrics::counter!(MetricName::EventsSkipped.as_str()).increment(1);
    }
}

pub mod parser {
    use super::MetricName;

    pub fn source_bytes(bytes: usize) {
        ::metrics::histogram!(MetricName::SourceBytes.as_str()).record(bytes as f64);
    }

    pub fn rows_parsed(count: usize) {
        ::metrics::counter!(MetricName::RowsParsed.as_str()).increment(count as u64);
    }
}

pub mod loader {
    use super::MetricName;

    pub fn rows_loaded(count: u64) {
        ::metrics::counter!(MetricName::RowsLoaded.as_str()).increment(count);
    }

    pub fn load_job() {
        ::metrics::counter!(MetricName::LoadJobs.as_str()).increment(1);
    }
}

pub mod invocation {
    use super::MetricName;

    pub fn failed(stage: &'static str) {
        ::metrics::counter!(MetricName::InvocationFailures.as_str(), "stage" => stage).increment(1);
    }

    pub fn duration(secs: f64) {
        ::metrics::histogram!(MetricName::InvocationDuration.as_str()).record(secs);
    }
}
