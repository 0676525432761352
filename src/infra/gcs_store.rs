use async_trait::async_trait;
use google_cloud_storage::client::{Client, ClientConfig};
use google_cloud_storage::http::objects::download::Range;
use google_cloud_storage::http::objects::get::GetObjectRequest;
use google_cloud_storage::http::Error as GcsError;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::app::ports::ObjectStorePort;
use crate::error::{LoaderError, Result};
use crate::pipeline::fetcher::decode_text;

/// Google Cloud Storage. The client resolves Application Default Credentials
/// (`GOOGLE_APPLICATION_CREDENTIALS`, gcloud user credentials, then the metadata server)
/// on first use.
#[derive(Default)]
pub struct GcsObjectStore {
    client: OnceCell<Client>,
}

impl GcsObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Already-configured client, e.g. an anonymous one pointed at an emulator.
    pub fn with_client(client: Client) -> Self {
        Self {
            client: OnceCell::new_with(Some(client)),
        }
    }

    async fn client(&self, container: &str, key: &str) -> Result<&Client> {
        self.client
            .get_or_try_init(|| async {
                let config = ClientConfig::default().with_auth().await.map_err(|e| {
                    LoaderError::fetch(
                        container,
                        key,
                        format!("Failed to initialize GCS client with ADC: {}", e),
                    )
                })?;
                info!("Initialized GCS client");
                Ok::<_, LoaderError>(Client::new(config))
            })
            .await
    }
}

fn request(container: &str, key: &str) -> GetObjectRequest {
    GetObjectRequest {
        bucket: container.to_string(),
        object: key.to_string(),
        ..Default::default()
    }
}

fn is_not_found(err: &GcsError) -> bool {
    matches!(err, GcsError::Response(resp) if resp.code == 404)
}

fn fetch_error(container: &str, key: &str, err: GcsError) -> LoaderError {
    if is_not_found(&err) {
        LoaderError::NotFound {
            container: container.to_string(),
            key: key.to_string(),
        }
    } else {
        LoaderError::fetch(container, key, err.to_string())
    }
}

#[async_trait]
impl ObjectStorePort for GcsObjectStore {
    async fn exists(&self, container: &str, key: &str) -> Result<bool> {
        let client = self.client(container, key).await?;
        match client.get_object(&request(container, key)).await {
            Ok(object) => {
                debug!(size = object.size, "Found gs://{}/{}", container, key);
                Ok(true)
            }
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(fetch_error(container, key, e)),
        }
    }

    async fn read_text(&self, container: &str, key: &str) -> Result<String> {
        let client = self.client(container, key).await?;
        let bytes = client
            .download_object(&request(container, key), &Range::default())
            .await
            .map_err(|e| fetch_error(container, key, e))?;
        debug!(bytes = bytes.len(), "Downloaded gs://{}/{}", container, key);
        decode_text(container, key, bytes)
    }
}
