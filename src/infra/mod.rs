// Adapters behind the app ports

pub mod bigquery;
pub mod clients;
pub mod gcs_store;
pub mod local_store;
pub mod memory;
