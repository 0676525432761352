/// Defaults and fixed names shared across the loader.
/// Deployments override the defaults through `LoaderConfig`.

// Accepted object suffix
pub const DEFAULT_EXTENSION: &str = ".csv";

// Rows with a coerced value strictly above this are flagged high value
pub const DEFAULT_HIGH_VALUE_THRESHOLD: f64 = 100.0;

// Country coding
pub const COUNTRY_SENTINEL: &str = "OT";
pub const DEFAULT_COUNTRY_CODES: [(&str, &str); 4] = [
    ("MALAYSIA", "MY"),
    ("SINGAPORE", "SG"),
    ("THAILAND", "TH"),
    ("INDONESIA", "ID"),
];

// Source columns
pub const COL_USER_ID: &str = "user_id";
pub const COL_EVENT_TIMESTAMP: &str = "event_timestamp";
pub const COL_COUNTRY: &str = "country";
pub const COL_VALUE: &str = "value";

// Target-only columns
pub const COL_COUNTRY_CODE: &str = "country_code";
pub const COL_IS_HIGH_VALUE: &str = "is_high_value";
pub const COL_PROCESSING_DATETIME: &str = "processing_datetime";

/// Columns every source file must carry.
pub const REQUIRED_SOURCE_COLUMNS: [&str; 4] =
    [COL_USER_ID, COL_EVENT_TIMESTAMP, COL_COUNTRY, COL_VALUE];

// Environment variables
pub const ENV_CONFIG_PATH: &str = "CSV_LOADER_CONFIG";
pub const ENV_PROJECT_ID: &str = "CSV_LOADER_PROJECT_ID";
pub const ENV_DATASET_ID: &str = "CSV_LOADER_DATASET_ID";
pub const ENV_TABLE_ID: &str = "CSV_LOADER_TABLE_ID";
pub const ENV_EXTENSION: &str = "CSV_LOADER_EXTENSION";
pub const ENV_HIGH_VALUE_THRESHOLD: &str = "CSV_LOADER_HIGH_VALUE_THRESHOLD";
pub const ENV_PARSE_MODE: &str = "CSV_LOADER_PARSE_MODE";
pub const ENV_METRICS_PORT: &str = "CSV_LOADER_METRICS_PORT";

pub const DEFAULT_CONFIG_FILE: &str = "config.toml";
