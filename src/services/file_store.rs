//! File store collaborator - persists uploaded evidence and hands back URLs.

use crate::config::StorageConfig;
use crate::errors::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// A file received from the caller, not yet stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    /// Original file name, used only for its extension
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }
}

#[async_trait]
pub trait FileStore: Send + Sync {
    /// Stores every file under `folder` and returns their public URLs in input
    /// order. Either all files are stored or none are.
    async fn upload_many(&self, folder: &str, files: Vec<UploadFile>) -> Result<Vec<String>>;
}

/// Stores files on the local filesystem below a configured root directory.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root_dir: PathBuf,
    public_base_url: String,
    timeout: Duration,
}

impl LocalFileStore {
    #[must_use]
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            root_dir: config.root_dir.clone(),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
            timeout: config.upload_timeout(),
        }
    }

    async fn write_all(&self, folder: &str, files: Vec<UploadFile>) -> Result<Vec<String>> {
        let dir = self.root_dir.join(folder);
        tokio::fs::create_dir_all(&dir).await?;

        let mut written: Vec<PathBuf> = Vec::with_capacity(files.len());
        let mut urls = Vec::with_capacity(files.len());
        for file in files {
            let stored_name = stored_file_name(&file.file_name);
            let path = dir.join(&stored_name);
            if let Err(e) = tokio::fs::write(&path, &file.bytes).await {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "upload failed, removing files already written"
                );
                remove_all(&written).await;
                return Err(e.into());
            }
            debug!(path = %path.display(), size = file.bytes.len(), "stored upload");
            written.push(path);
            urls.push(format!("{}/{folder}/{stored_name}", self.public_base_url));
        }
        Ok(urls)
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    #[instrument(skip(self, files), fields(count = files.len()))]
    async fn upload_many(&self, folder: &str, files: Vec<UploadFile>) -> Result<Vec<String>> {
        if folder.is_empty() || Path::new(folder).components().count() != 1 || folder == ".." {
            return Err(Error::Config {
                message: format!("Invalid upload folder: {folder:?}"),
            });
        }
        super::with_deadline("file_store.upload_many", self.timeout, self.write_all(folder, files))
            .await
    }
}

/// Random name keeping the original extension, so uploads never collide.
fn stored_file_name(original: &str) -> String {
    match Path::new(original).extension().and_then(|ext| ext.to_str()) {
        Some(ext) if !ext.is_empty() => format!("{}.{}", Uuid::new_v4(), ext.to_lowercase()),
        _ => Uuid::new_v4().to_string(),
    }
}

async fn remove_all(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!(path = %path.display(), error = %e, "failed to remove partial upload");
        }
    }
}
