use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::constants::*;
use crate::domain::{FieldType, TableId};
use crate::error::{LoaderError, Result};

/// Static deployment configuration. Built once at startup, never mutated.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub warehouse: WarehouseConfig,
    pub source: SourceConfig,
    pub transform: TransformConfig,
    pub load: LoadConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
    pub project_id: String,
    pub dataset_id: String,
    pub table_id: String,
    /// Warehouse type of the pass-through `user_id` column
    pub user_id_type: FieldType,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            dataset_id: String::new(),
            table_id: String::new(),
            user_id_type: FieldType::String,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    /// Reject any row whose field count differs from the header
    #[default]
    Strict,
    /// Pad short rows, truncate long ones
    Lenient,
}

impl std::str::FromStr for ParseMode {
    type Err = LoaderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(ParseMode::Strict),
            "lenient" => Ok(ParseMode::Lenient),
            other => Err(LoaderError::Config(format!("unknown parse mode '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Gcs,
    Local,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub extension: String,
    pub delimiter: char,
    pub parse_mode: ParseMode,
    pub store: StoreKind,
    /// Root directory for `StoreKind::Local`; each container is a subdirectory
    pub local_root: Option<PathBuf>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            extension: DEFAULT_EXTENSION.to_string(),
            delimiter: ',',
            parse_mode: ParseMode::default(),
            store: StoreKind::default(),
            local_root: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    pub high_value_threshold: f64,
    /// Uppercased country name -> two-letter code
    pub country_codes: BTreeMap<String, String>,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            high_value_threshold: DEFAULT_HIGH_VALUE_THRESHOLD,
            country_codes: DEFAULT_COUNTRY_CODES
                .iter()
                .map(|(name, code)| (name.to_string(), code.to_string()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Derive the load job id from the object identity and content
    pub deterministic_job_id: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

impl LoaderConfig {
    /// Defaults pointed at a single target table.
    pub fn for_table(table: &TableId) -> Self {
        let mut config = Self::default();
        config.warehouse.project_id = table.project.clone();
        config.warehouse.dataset_id = table.dataset.clone();
        config.warehouse.table_id = table.table.clone();
        config
    }

    /// Reads the TOML file named by `CSV_LOADER_CONFIG` (or `config.toml` when present),
    /// then applies environment overrides and validates.
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let explicit = std::env::var(ENV_CONFIG_PATH).ok().map(PathBuf::from);
        let mut config = match explicit {
            Some(path) => Self::from_file(&path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => {
                debug!("No config file found, using defaults plus environment");
                Self::default()
            }
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        info!(table = %config.table_id(), extension = %config.source.extension, "Configuration loaded");
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            LoaderError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: LoaderConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Applies `CSV_LOADER_*` overrides looked up through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_PROJECT_ID) {
            self.warehouse.project_id = v;
        }
        if let Some(v) = lookup(ENV_DATASET_ID) {
            self.warehouse.dataset_id = v;
        }
        if let Some(v) = lookup(ENV_TABLE_ID) {
            self.warehouse.table_id = v;
        }
        if let Some(v) = lookup(ENV_EXTENSION) {
            self.source.extension = v;
        }
        if let Some(v) = lookup(ENV_HIGH_VALUE_THRESHOLD) {
            self.transform.high_value_threshold = v.trim().parse().map_err(|_| {
                LoaderError::Config(format!("{} must be a number, got '{}'", ENV_HIGH_VALUE_THRESHOLD, v))
            })?;
        }
        if let Some(v) = lookup(ENV_PARSE_MODE) {
            self.source.parse_mode = v.parse()?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let w = &self.warehouse;
        if w.project_id.is_empty() || w.dataset_id.is_empty() || w.table_id.is_empty() {
            return Err(LoaderError::Config(
                "warehouse project_id, dataset_id and table_id must all be set".to_string(),
            ));
        }
        if !matches!(w.user_id_type, FieldType::String | FieldType::Integer) {
            return Err(LoaderError::Config(
                "user_id_type must be STRING or INTEGER".to_string(),
            ));
        }
        if !self.source.extension.starts_with('.') || self.source.extension.len() < 2 {
            return Err(LoaderError::Config(format!(
                "extension '{}' must start with '.'",
                self.source.extension
            )));
        }
        if !self.source.delimiter.is_ascii() {
            return Err(LoaderError::Config("delimiter must be a single ASCII character".to_string()));
        }
        if self.source.store == StoreKind::Local && self.source.local_root.is_none() {
            return Err(LoaderError::Config("local store requires source.local_root".to_string()));
        }
        if !self.transform.high_value_threshold.is_finite() {
            return Err(LoaderError::Config("high_value_threshold must be finite".to_string()));
        }
        for (name, code) in &self.transform.country_codes {
            let valid = code.len() == 2 && code.chars().all(|c| c.is_ascii_uppercase());
            if !valid {
                return Err(LoaderError::Config(format!(
                    "country code '{}' for '{}' must be two uppercase letters",
                    code, name
                )));
            }
        }
        Ok(())
    }

    pub fn table_id(&self) -> TableId {
        TableId::new(
            self.warehouse.project_id.clone(),
            self.warehouse.dataset_id.clone(),
            self.warehouse.table_id.clone(),
        )
    }
}
