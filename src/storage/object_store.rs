use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use crate::config::MessagingConfig;
use crate::error::StoreError;

/// Blob storage for message attachments.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `bytes` durably under `path` and returns its retrieval URL.
    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<String, StoreError>;
}

/// Object store rooted in a local directory.
pub struct FsObjectStore {
    root: PathBuf,
    base_url: String,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &MessagingConfig) -> Self {
        Self::new(&config.object_store_root, config.object_base_url.clone())
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<String, StoreError> {
        let relative = path.trim_start_matches('/');
        let escapes = Path::new(relative)
            .components()
            .any(|component| !matches!(component, Component::Normal(_)));
        if relative.is_empty() || escapes {
            return Err(StoreError::InvalidPath(path.to_string()));
        }
        let target = self.root.join(relative);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, &bytes).await?;
        log::debug!("Stored {} bytes at {}", bytes.len(), target.display());
        Ok(format!("{}/{}", self.base_url, relative))
    }
}
