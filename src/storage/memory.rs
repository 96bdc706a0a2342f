use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use super::{next_chunk, validate_key, ReportStorage, StorageError};
use crate::engine::ReportStream;
use crate::error::Result;

type ObjectVersions = Vec<(String, Bytes)>;

/// In-memory versioned report storage (for tests and dry runs)
#[derive(Clone, Default)]
pub struct InMemoryReportStorage {
    objects: Arc<RwLock<HashMap<(String, String), ObjectVersions>>>,
}

impl InMemoryReportStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Version ids stored under `bucket`/`key`, oldest first.
    pub async fn versions(&self, bucket: &str, key: &str) -> Vec<String> {
        let objects = self.objects.read().await;
        objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|versions| versions.iter().map(|(id, _)| id.clone()).collect())
            .unwrap_or_default()
    }

    pub async fn read_version(
        &self,
        bucket: &str,
        key: &str,
        version: &str,
    ) -> std::result::Result<Bytes, StorageError> {
        let objects = self.objects.read().await;
        objects
            .get(&(bucket.to_string(), key.to_string()))
            .and_then(|versions| versions.iter().find(|(id, _)| id == version))
            .map(|(_, body)| body.clone())
            .ok_or_else(|| StorageError::NotFound(format!("{}/{}?versionId={}", bucket, key, version)))
    }

    /// Number of objects (across all versions).
    pub async fn object_count(&self) -> usize {
        self.objects.read().await.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl ReportStorage for InMemoryReportStorage {
    async fn stream_upload(
        &self,
        bucket: &str,
        key: &str,
        mut body: ReportStream,
        cancel: &CancellationToken,
    ) -> Result<String> {
        validate_key(key)?;

        let mut buffer = BytesMut::new();
        while let Some(chunk) = next_chunk(&mut body, cancel).await {
            buffer.extend_from_slice(&chunk?);
        }

        let mut objects = self.objects.write().await;
        let versions = objects
            .entry((bucket.to_string(), key.to_string()))
            .or_default();
        let version = format!("v{}", versions.len() + 1);
        versions.push((version.clone(), buffer.freeze()));
        Ok(version)
    }
}
