use tracing::{debug, info};

use crate::app::ports::ObjectStorePort;
use crate::domain::ObjectRef;
use crate::error::{LoaderError, Result};

/// Resolves an accepted object to its text content.
pub struct SourceFetcher<'a> {
    store: &'a dyn ObjectStorePort,
}

impl<'a> SourceFetcher<'a> {
    pub fn new(store: &'a dyn ObjectStorePort) -> Self {
        Self { store }
    }

    pub async fn fetch(&self, object: &ObjectRef) -> Result<String> {
        debug!("Checking {} exists", object.uri());
        if !self.store.exists(&object.container, &object.key).await? {
            return Err(LoaderError::NotFound {
                container: object.container.clone(),
                key: object.key.clone(),
            });
        }

        let content = self.store.read_text(&object.container, &object.key).await?;
        info!(bytes = content.len(), "Downloaded {}", object.uri());
        Ok(content)
    }
}

/// Decodes object bytes as UTF-8, dropping a leading byte-order mark.
pub fn decode_text(container: &str, key: &str, bytes: Vec<u8>) -> Result<String> {
    let mut text = String::from_utf8(bytes)
        .map_err(|e| LoaderError::fetch(container, key, format!("content is not UTF-8: {}", e)))?;
    if text.starts_with('\u{feff}') {
        text.drain(..'\u{feff}'.len_utf8());
    }
    Ok(text)
}
