use axum::{
    body::Bytes,
    extract::State,
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use hyper::Server;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info};

use crate::app::process_upload_use_case::{InvocationOutcome, ProcessUploadUseCase};
use crate::config::LoaderConfig;
use crate::domain::ObjectEvent;
use crate::error::{LoaderError, Result};
use crate::infra::clients::Clients;

const STRUCTURED_CONTENT_TYPE: &str = "application/cloudevents+json";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<LoaderConfig>,
    pub clients: Arc<Clients>,
}

impl AppState {
    pub fn new(config: Arc<LoaderConfig>, clients: Arc<Clients>) -> Self {
        Self { config, clients }
    }
}

/// Storage notification payload, the `data` of the CloudEvent.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StorageObjectData {
    bucket: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct StructuredEvent {
    #[serde(default)]
    id: String,
    #[serde(default, rename = "type")]
    event_type: String,
    #[serde(default)]
    data: StorageObjectData,
}

/// Decodes a CloudEvent in either binary content mode (`ce-*` headers, data as the body)
/// or structured mode (whole event as `application/cloudevents+json`).
pub fn decode_cloud_event(headers: &HeaderMap, body: &[u8]) -> Result<ObjectEvent> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if content_type.starts_with(STRUCTURED_CONTENT_TYPE) {
        let event: StructuredEvent = serde_json::from_slice(body)
            .map_err(|e| LoaderError::Validation(format!("undecodable cloud event: {}", e)))?;
        return Ok(ObjectEvent::new(
            event.data.bucket,
            event.data.name,
            event.id,
            event.event_type,
        ));
    }

    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };
    let data: StorageObjectData = serde_json::from_slice(body)
        .map_err(|e| LoaderError::Validation(format!("undecodable event data: {}", e)))?;
    Ok(ObjectEvent::new(data.bucket, data.name, header("ce-id"), header("ce-type")))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "csv_loader",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn handle_event(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    match process(&state, &headers, &body).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn process(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<InvocationOutcome> {
    let event = decode_cloud_event(headers, body)?;
    debug!(event_id = %event.event_id, event_type = %event.event_type, "Decoded cloud event");
    let store = state.clients.object_store.get()?;
    let warehouse = state.clients.warehouse.get()?;
    ProcessUploadUseCase::new(&state.config, store, warehouse)
        .process_event(&event)
        .await
}

fn error_response(e: &LoaderError) -> Response {
    let status = if e.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    let body = Json(serde_json::json!({
        "status": "failed",
        "stage": e.stage(),
        "error": e.to_string(),
    }));
    (status, body).into_response()
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(handle_event))
        .route("/healthz", get(health))
        .with_state(state)
}

/// Serves the event endpoint until the process is stopped.
pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let app = router(state);
    info!("HTTP server listening on http://{}", addr);
    info!("Health check: http://{}/healthz", addr);
    Server::bind(&addr).serve(app.into_make_service()).await?;
    Ok(())
}
