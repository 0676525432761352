use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

use crate::app::ports::ObjectStorePort;
use crate::error::{LoaderError, Result};
use crate::pipeline::fetcher::decode_text;

/// Filesystem-backed store: `<root>/<container>/<key>`.
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, container: &str, key: &str) -> Result<PathBuf> {
        let escapes = |p: &str| {
            Path::new(p)
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        };
        if escapes(container) || escapes(key) {
            return Err(LoaderError::fetch(
                container,
                key,
                "path escapes the store root",
            ));
        }
        Ok(self.root.join(container).join(key))
    }
}

#[async_trait]
impl ObjectStorePort for LocalObjectStore {
    async fn exists(&self, container: &str, key: &str) -> Result<bool> {
        let path = self.resolve(container, key)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(LoaderError::fetch(container, key, e.to_string())),
        }
    }

    async fn read_text(&self, container: &str, key: &str) -> Result<String> {
        let path = self.resolve(container, key)?;
        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LoaderError::NotFound {
                    container: container.to_string(),
                    key: key.to_string(),
                }
            } else {
                LoaderError::fetch(container, key, e.to_string())
            }
        })?;
        decode_text(container, key, bytes)
    }
}
