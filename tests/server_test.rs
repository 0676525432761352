use axum::body::Body;
use axum::http::{Request, StatusCode};
use csv_loader::config::LoaderConfig;
use csv_loader::domain::{TableId, TableSchema};
use csv_loader::infra::clients::Clients;
use csv_loader::infra::memory::{InMemoryObjectStore, InMemoryWarehouse};
use csv_loader::server::{router, AppState};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

fn setup() -> (Arc<InMemoryObjectStore>, Arc<InMemoryWarehouse>, TableId, axum::Router) {
    let table = TableId::new("analytics", "raw", "events");
    let config = LoaderConfig::for_table(&table);
    let store = Arc::new(InMemoryObjectStore::new());
    let warehouse = Arc::new(InMemoryWarehouse::new());
    warehouse.create_table(&table, TableSchema::target(config.warehouse.user_id_type));
    let clients = Clients::new(store.clone(), warehouse.clone());
    let app = router(AppState::new(Arc::new(config), Arc::new(clients)));
    (store, warehouse, table, app)
}

fn binary_event(body: &'static str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", "application/json")
        .header("ce-id", "evt-42")
        .header("ce-type", "google.cloud.storage.object.v1.finalized")
        .body(Body::from(body))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_binary_event_loads_rows() {
    let (store, warehouse, table, app) = setup();
    store.put("uploads", "daily.csv", "user_id,event_timestamp,country,value\nu1,2024-01-01,Singapore,250\n");

    let response = app
        .oneshot(binary_event(r#"{"bucket":"uploads","name":"daily.csv"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "loaded");
    assert_eq!(body["event_id"], "evt-42");
    assert_eq!(body["rows_written"], 1);

    let rows = warehouse.rows(&table);
    assert_eq!(rows[0].country_code, "SG");
}

#[tokio::test]
async fn test_structured_event_is_skipped_for_other_extensions() {
    let (_store, warehouse, _table, app) = setup();
    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", "application/cloudevents+json")
        .body(Body::from(
            r#"{"id":"evt-7","type":"finalized","data":{"bucket":"uploads","name":"notes.txt"}}"#,
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "skipped");
    assert_eq!(body["key"], "notes.txt");
    assert_eq!(warehouse.append_calls(), 0);
}

#[tokio::test]
async fn test_malformed_event_is_bad_request() {
    let (_store, _warehouse, _table, app) = setup();
    let response = app.oneshot(binary_event(r#"{"name":"daily.csv"}"#)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["stage"], "receive");
}

#[tokio::test]
async fn test_missing_object_is_server_error() {
    let (_store, _warehouse, _table, app) = setup();
    let response = app
        .oneshot(binary_event(r#"{"bucket":"uploads","name":"gone.csv"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["status"], "failed");
    assert_eq!(body["stage"], "fetch");
}

#[tokio::test]
async fn test_healthz() {
    let (_store, _warehouse, _table, app) = setup();
    let response = app
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
}
