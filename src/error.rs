use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Invalid event: {0}")]
    Validation(String),

    #[error("Object not found: gs://{container}/{key}")]
    NotFound { container: String, key: String },

    #[error("Failed to fetch gs://{container}/{key}: {message}")]
    Fetch {
        container: String,
        key: String,
        message: String,
    },

    #[error("Failed to parse delimited content: {0}")]
    Parse(String),

    #[error("Transformation failed: {0}")]
    Transform(String),

    #[error("Load into {table} failed: {message}")]
    Load { table: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl LoaderError {
    pub fn fetch(container: &str, key: &str, message: impl Into<String>) -> Self {
        LoaderError::Fetch {
            container: container.to_string(),
            key: key.to_string(),
            message: message.into(),
        }
    }

    pub fn load(table: impl ToString, message: impl Into<String>) -> Self {
        LoaderError::Load {
            table: table.to_string(),
            message: message.into(),
        }
    }

    /// Pipeline stage the error belongs to, used as a log field and metric label.
    pub fn stage(&self) -> &'static str {
        match self {
            LoaderError::Validation(_) => "receive",
            LoaderError::NotFound { .. } | LoaderError::Fetch { .. } => "fetch",
            LoaderError::Parse(_) => "parse",
            LoaderError::Transform(_) => "transform",
            LoaderError::Load { .. } => "load",
            LoaderError::Config(_) => "config",
        }
    }

    /// True when redelivering the same event cannot succeed.
    pub fn is_client_error(&self) -> bool {
        matches!(self, LoaderError::Validation(_))
    }
}

impl From<toml::de::Error> for LoaderError {
    fn from(err: toml::de::Error) -> Self {
        LoaderError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LoaderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        assert_eq!(LoaderError::Validation("x".into()).stage(), "receive");
        assert_eq!(
            LoaderError::NotFound {
                container: "b".into(),
                key: "k".into()
            }
            .stage(),
            "fetch"
        );
        assert_eq!(LoaderError::load("p.d.t", "quota").stage(), "load");
    }

    #[test]
    fn test_display_includes_context() {
        let err = LoaderError::fetch("uploads", "a.csv", "403 Forbidden");
        assert_eq!(
            err.to_string(),
            "Failed to fetch gs://uploads/a.csv: 403 Forbidden"
        );
        assert!(!err.is_client_error());
        assert!(LoaderError::Validation("empty".into()).is_client_error());
    }
}
