use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::{next_chunk, validate_key, ReportStorage, StorageError};
use crate::engine::ReportStream;
use crate::error::Result;

/// Local filesystem implementation (for development runs)
///
/// Each upload becomes `{base}/{bucket}/{key}/{version}`, so writing the same
/// key twice keeps both versions side by side.
pub struct LocalReportStorage {
    base_path: PathBuf,
}

impl LocalReportStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Directory holding every version of a key
    fn dir_for_key(&self, bucket: &str, key: &str) -> PathBuf {
        self.base_path.join(bucket).join(key)
    }

    /// Path of one stored version
    pub fn path_for_version(&self, bucket: &str, key: &str, version: &str) -> PathBuf {
        self.dir_for_key(bucket, key).join(version)
    }

    pub async fn read_version(
        &self,
        bucket: &str,
        key: &str,
        version: &str,
    ) -> std::result::Result<Vec<u8>, StorageError> {
        validate_key(key)?;
        Uuid::parse_str(version).map_err(|_| StorageError::NotFound(version.to_string()))?;

        let path = self.path_for_version(bucket, key, version);
        if !path.exists() {
            return Err(StorageError::NotFound(path.display().to_string()));
        }
        Ok(tokio::fs::read(path).await?)
    }

    async fn write_body(
        path: &Path,
        body: &mut ReportStream,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut file = tokio::fs::File::create(path)
            .await
            .map_err(StorageError::from)?;

        while let Some(chunk) = next_chunk(body, cancel).await {
            file.write_all(&chunk?).await.map_err(StorageError::from)?;
        }

        file.flush().await.map_err(StorageError::from)?;
        file.sync_all().await.map_err(StorageError::from)?;
        Ok(())
    }
}

#[async_trait]
impl ReportStorage for LocalReportStorage {
    async fn stream_upload(
        &self,
        bucket: &str,
        key: &str,
        mut body: ReportStream,
        cancel: &CancellationToken,
    ) -> Result<String> {
        validate_key(key)?;

        let dir = self.dir_for_key(bucket, key);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(StorageError::from)?;

        let version = Uuid::new_v4().to_string();
        let path = dir.join(&version);

        if let Err(e) = Self::write_body(&path, &mut body, cancel).await {
            if let Err(remove) = tokio::fs::remove_file(&path).await {
                tracing::warn!(path = %path.display(), error = %remove, "Failed to remove partial report");
            }
            return Err(e);
        }

        tracing::debug!(path = %path.display(), "Report written");
        Ok(version)
    }
}
