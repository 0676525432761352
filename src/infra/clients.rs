use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing::info;

use crate::app::ports::{ObjectStorePort, WarehousePort};
use crate::config::{LoaderConfig, StoreKind};
use crate::error::{LoaderError, Result};
use crate::infra::bigquery::BigQueryWarehouse;
use crate::infra::gcs_store::GcsObjectStore;
use crate::infra::local_store::LocalObjectStore;

type Factory<T> = Box<dyn Fn() -> Result<Arc<T>> + Send + Sync>;

/// A client built on first use and shared afterwards.
pub struct LazyClient<T: ?Sized> {
    cell: OnceCell<Arc<T>>,
    factory: Factory<T>,
}

impl<T: ?Sized + Send + Sync + 'static> LazyClient<T> {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<Arc<T>> + Send + Sync + 'static,
    {
        Self {
            cell: OnceCell::new(),
            factory: Box::new(factory),
        }
    }

    /// Already-built client, e.g. a test fake.
    pub fn ready(client: Arc<T>) -> Self {
        let cell = OnceCell::new();
        let _ = cell.set(client.clone());
        Self {
            cell,
            factory: Box::new(move || Ok(client.clone())),
        }
    }

    pub fn get(&self) -> Result<Arc<T>> {
        self.cell.get_or_try_init(|| (self.factory)()).map(Arc::clone)
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }
}

/// Process-wide store and warehouse clients, reused across invocations.
pub struct Clients {
    pub object_store: LazyClient<dyn ObjectStorePort>,
    pub warehouse: LazyClient<dyn WarehousePort>,
}

impl Clients {
    pub fn new(object_store: Arc<dyn ObjectStorePort>, warehouse: Arc<dyn WarehousePort>) -> Self {
        Self {
            object_store: LazyClient::ready(object_store),
            warehouse: LazyClient::ready(warehouse),
        }
    }

    /// Lazily built production clients for `config`. Cloud clients resolve their
    /// credentials on first request, not here.
    pub fn from_config(config: Arc<LoaderConfig>) -> Self {
        let object_store = LazyClient::new(move || -> Result<Arc<dyn ObjectStorePort>> {
            let source = &config.source;
            match source.store {
                StoreKind::Gcs => Ok(Arc::new(GcsObjectStore::new())),
                StoreKind::Local => {
                    let root = source.local_root.clone().ok_or_else(|| {
                        LoaderError::Config("local store requires source.local_root".to_string())
                    })?;
                    info!(root = %root.display(), "Initialized local object store");
                    Ok(Arc::new(LocalObjectStore::new(root)))
                }
            }
        });

        let warehouse = LazyClient::new(|| -> Result<Arc<dyn WarehousePort>> {
            Ok(Arc::new(BigQueryWarehouse::new()))
        });

        Self {
            object_store,
            warehouse,
        }
    }
}
