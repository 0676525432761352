use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const ENV_LOG_DIR: &str = "CSV_LOADER_LOG_DIR";

fn log_dir() -> String {
    std::env::var(ENV_LOG_DIR).unwrap_or_else(|_| "logs".to_string())
}

/// Initializes console logging plus a daily-rotated JSON file under `CSV_LOADER_LOG_DIR`
/// (default `logs`). When the directory cannot be created (read-only function sandboxes)
/// only the console layer is installed.
///
/// Keep the returned guard alive for the life of the process so buffered file logs flush.
pub fn init_logging() -> Option<WorkerGuard> {
    let log_dir = log_dir();

    let (file_layer, guard) = match fs::create_dir_all(&log_dir) {
        Ok(()) => {
            let file_appender = tracing_appender::rolling::daily(&log_dir, "csv_loader.log");
            let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer().json().with_writer(non_blocking_writer);
            (Some(layer), Some(guard))
        }
        Err(_) => (None, None),
    };

    let console_layer = fmt::layer()
        .with_target(true)
        .with_writer(std::io::stdout);

    // RUST_LOG wins; otherwise verbose for this crate
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("csv_loader=debug,info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .init();

    guard
}
