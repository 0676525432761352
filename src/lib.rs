pub mod config;
pub mod constants;
pub mod error;
pub mod idempotency;
pub mod logging;
pub mod observability;
pub mod pipeline;
pub mod server;

// Layered boundaries for application and infrastructure
pub mod app;
pub mod infra;

// Domain data shapes shared across layers
pub mod domain;
