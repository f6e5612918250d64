use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Where downloaded covers end up.
#[async_trait]
pub trait FileSink: Send + Sync {
    /// Creates the directory and any missing parents.
    async fn create_dir_all(&self, path: &Path) -> Result<(), StorageError>;

    /// Writes the full contents, replacing any existing file.
    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), StorageError>;
}

/// Writes straight to the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSink;

#[async_trait]
impl FileSink for LocalFileSink {
    async fn create_dir_all(&self, path: &Path) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| StorageError::io(path, e))
    }

    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .await
            .map_err(|e| StorageError::io(path, e))?;
        file.write_all(bytes)
            .await
            .map_err(|e| StorageError::io(path, e))?;
        file.flush().await.map_err(|e| StorageError::io(path, e))
    }
}
