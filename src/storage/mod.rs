//! Blob sink abstraction.
//!
//! Provides the [`SinkUploader`] seam used by the pipeline and an
//! `object_store` implementation that works against Azure Blob Storage,
//! a local directory tree, or an in-memory store.
//!
//! Containers are never created here: a missing container is an error.

mod azure;

pub use azure::AzureConnectionString;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};
use tracing::debug;

use crate::error::{ExportError, Result};
use crate::model::EncodedPayload;

/// Scheme selecting the local filesystem backend
pub const LOCAL_SCHEME: &str = "file://";

/// Scheme selecting the in-memory backend
pub const MEMORY_SCHEME: &str = "memory://";

/// Access to the blob container that receives exports
#[async_trait]
pub trait SinkUploader: Send + Sync {
    /// Handle on one named container
    type Container: Send + Sync;

    /// Resolve a container handle without touching the network
    fn container(&self, connection_string: &str, name: &str) -> Result<Self::Container>;

    /// Read-only existence check
    async fn container_exists(&self, container: &Self::Container) -> Result<bool>;

    /// Upload `payload` as `blob_name`, replacing any blob of that name
    async fn write(
        &self,
        container: &Self::Container,
        blob_name: &str,
        payload: &EncodedPayload,
    ) -> Result<()>;

    /// Fail with `ContainerNotFound` unless the container exists
    async fn ensure_container(&self, container: &Self::Container, name: &str) -> Result<()> {
        if self.container_exists(container).await? {
            Ok(())
        } else {
            Err(ExportError::container_not_found(name))
        }
    }
}

/// Backend a container handle resolves to
#[derive(Debug, Clone)]
enum Backend {
    Azure(Arc<dyn ObjectStore>),
    Local(PathBuf),
    Memory(Arc<InMemory>),
}

/// Handle on one container of an [`ObjectStoreUploader`]
#[derive(Debug, Clone)]
pub struct BlobContainer {
    name: String,
    backend: Backend,
}

impl BlobContainer {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Store and object path for a blob in this container
    fn locate(&self, blob_name: &str) -> Result<(Arc<dyn ObjectStore>, Path)> {
        match &self.backend {
            Backend::Azure(store) => Ok((store.clone(), Path::from(blob_name))),
            Backend::Local(dir) => {
                let store = LocalFileSystem::new_with_prefix(dir).map_err(|e| {
                    ExportError::transport(format!(
                        "Cannot open container directory {}",
                        dir.display()
                    ))
                    .with_source(e)
                })?;
                Ok((Arc::new(store), Path::from(blob_name)))
            }
            Backend::Memory(store) => Ok((
                store.clone(),
                Path::from_iter([self.name.as_str(), blob_name]),
            )),
        }
    }
}

/// [`SinkUploader`] backed by `object_store`
///
/// The connection string selects the backend:
/// - `file://<root>`: containers are directories under `<root>`
/// - `memory://`: a process-local store where every container exists
/// - anything else: an Azure storage connection string
#[derive(Debug, Clone, Default)]
pub struct ObjectStoreUploader {
    memory: Arc<InMemory>,
}

impl ObjectStoreUploader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a caller-provided in-memory store for `memory://` containers
    pub fn with_memory_store(memory: Arc<InMemory>) -> Self {
        Self { memory }
    }
}

/// Azure reports a missing container with a 404 carrying this error code
const CONTAINER_NOT_FOUND_CODE: &str = "ContainerNotFound";

/// Whether a listing failure means the container is absent
///
/// `object_store` surfaces the listing 404 as `Generic`, so the error and
/// its sources are searched for the service error code or the 404 status.
fn is_missing_container(err: &object_store::Error) -> bool {
    if matches!(err, object_store::Error::NotFound { .. }) {
        return true;
    }
    let mut current = Some(err as &(dyn std::error::Error + 'static));
    while let Some(e) = current {
        let rendered = e.to_string();
        if rendered.contains(CONTAINER_NOT_FOUND_CODE)
            || rendered.contains("404 Not Found")
            || rendered.contains("status 404")
        {
            return true;
        }
        current = e.source();
    }
    false
}

#[async_trait]
impl SinkUploader for ObjectStoreUploader {
    type Container = BlobContainer;

    fn container(&self, connection_string: &str, name: &str) -> Result<BlobContainer> {
        let backend = if let Some(root) = connection_string.strip_prefix(LOCAL_SCHEME) {
            if root.is_empty() {
                return Err(ExportError::config_invalid(
                    "file:// sink requires a root directory",
                ));
            }
            Backend::Local(PathBuf::from(root).join(name))
        } else if connection_string.starts_with(MEMORY_SCHEME) {
            Backend::Memory(self.memory.clone())
        } else {
            let parsed = AzureConnectionString::parse(connection_string)?;
            let store: Arc<dyn ObjectStore> = parsed.build_store(name)?;
            Backend::Azure(store)
        };

        Ok(BlobContainer {
            name: name.to_string(),
            backend,
        })
    }

    async fn container_exists(&self, container: &BlobContainer) -> Result<bool> {
        match &container.backend {
            Backend::Azure(store) => match store.list_with_delimiter(None).await {
                Ok(_) => Ok(true),
                Err(e) if is_missing_container(&e) => Ok(false),
                Err(e) => Err(ExportError::transport(format!(
                    "Failed to check container '{}'",
                    container.name
                ))
                .with_source(e)),
            },
            Backend::Local(dir) => match tokio::fs::metadata(dir).await {
                Ok(metadata) => Ok(metadata.is_dir()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
                Err(e) => Err(ExportError::transport(format!(
                    "Failed to check container directory {}",
                    dir.display()
                ))
                .with_source(e)),
            },
            Backend::Memory(_) => Ok(true),
        }
    }

    async fn write(
        &self,
        container: &BlobContainer,
        blob_name: &str,
        payload: &EncodedPayload,
    ) -> Result<()> {
        let (store, location) = container.locate(blob_name)?;

        // The local backend rejects object attributes
        let mut options = PutOptions::default();
        if matches!(container.backend, Backend::Azure(_)) {
            let mut attributes = Attributes::new();
            attributes.insert(Attribute::ContentType, EncodedPayload::CONTENT_TYPE.into());
            options.attributes = attributes;
        }

        store
            .put_opts(&location, PutPayload::from(payload.to_bytes()), options)
            .await
            .map_err(|e| {
                ExportError::transport(format!(
                    "Failed to upload blob '{}' to container '{}'",
                    blob_name, container.name
                ))
                .with_source(e)
            })?;

        debug!(
            "Uploaded {} bytes to {}/{}",
            payload.len(),
            container.name,
            blob_name
        );
        Ok(())
    }
}
