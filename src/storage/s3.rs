use async_trait::async_trait;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::{Attribute, Attributes, ObjectStore, PutMultipartOpts, WriteMultipart};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

use super::{next_chunk, validate_key, ReportStorage, StorageError, CSV_CONTENT_TYPE};
use crate::config::StorageConfig;
use crate::engine::ReportStream;
use crate::error::{ReportError, Result};

/// S3 implementation using multipart uploads.
///
/// Parts are uploaded while the report is still being generated; at most
/// `upload_concurrency` parts are in flight. Objects are written with SSE-KMS
/// when a key id is configured, and the bucket must have versioning enabled.
///
/// One client is built per bucket on first use and reused afterwards.
pub struct S3ReportStorage {
    config: StorageConfig,
    stores: Mutex<HashMap<String, AmazonS3>>,
}

impl S3ReportStorage {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            stores: Mutex::new(HashMap::new()),
        }
    }

    fn store_for(&self, bucket: &str) -> std::result::Result<AmazonS3, StorageError> {
        let mut stores = self
            .stores
            .lock()
            .map_err(|_| StorageError::Storage("S3 client cache poisoned".into()))?;
        if let Some(store) = stores.get(bucket) {
            return Ok(store.clone());
        }

        let store = self.build_store(bucket)?;
        stores.insert(bucket.to_string(), store.clone());
        Ok(store)
    }

    fn build_store(&self, bucket: &str) -> std::result::Result<AmazonS3, StorageError> {
        tracing::debug!(bucket, region = %self.config.region, "Building S3 client");
        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .with_region(&self.config.region);

        if let Some(endpoint) = &self.config.endpoint {
            builder = builder.with_endpoint(endpoint).with_allow_http(true);
        }
        if let Some(kms_key_id) = &self.config.kms_key_id {
            builder = builder.with_sse_kms_encryption(kms_key_id);
        }

        Ok(builder.build()?)
    }
}

#[async_trait]
impl ReportStorage for S3ReportStorage {
    async fn stream_upload(
        &self,
        bucket: &str,
        key: &str,
        mut body: ReportStream,
        cancel: &CancellationToken,
    ) -> Result<String> {
        validate_key(key)?;
        let store = self.store_for(bucket)?;
        let location = Path::from(key);

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, CSV_CONTENT_TYPE.into());
        let opts = PutMultipartOpts {
            attributes,
            ..Default::default()
        };

        let upload = store
            .put_multipart_opts(&location, opts)
            .await
            .map_err(StorageError::from)?;
        let mut writer = WriteMultipart::new(upload);
        let concurrency = self.config.upload_concurrency.max(1);

        while let Some(chunk) = next_chunk(&mut body, cancel).await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    abort(writer, bucket, key).await;
                    return Err(e);
                }
            };

            if let Err(e) = writer.wait_for_capacity(concurrency).await {
                abort(writer, bucket, key).await;
                return Err(StorageError::from(e).into());
            }
            writer.put(chunk);
        }

        if cancel.is_cancelled() {
            abort(writer, bucket, key).await;
            return Err(ReportError::Cancelled);
        }

        let result = writer.finish().await.map_err(StorageError::from)?;
        tracing::debug!(bucket, key, e_tag = ?result.e_tag, "Multipart upload complete");

        result.version.ok_or_else(|| {
            StorageError::MissingVersion {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }
            .into()
        })
    }
}

async fn abort(writer: WriteMultipart, bucket: &str, key: &str) {
    if let Err(e) = writer.abort().await {
        tracing::warn!(bucket, key, error = %e, "Failed to abort multipart upload");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_builds_for_custom_endpoint() {
        let storage = S3ReportStorage::new(StorageConfig {
            bucket: "reports".into(),
            region: "eu-west-1".into(),
            endpoint: Some("http://localhost:4566".into()),
            kms_key_id: Some("alias/reports".into()),
            upload_concurrency: 2,
        });
        assert!(storage.store_for("reports").is_ok());
    }

    #[test]
    fn test_client_is_built_once_per_bucket() {
        let storage = S3ReportStorage::new(StorageConfig {
            bucket: "reports".into(),
            region: "eu-west-1".into(),
            endpoint: Some("http://localhost:4566".into()),
            kms_key_id: None,
            upload_concurrency: 2,
        });

        storage.store_for("reports").unwrap();
        storage.store_for("reports").unwrap();
        storage.store_for("archive").unwrap();
        assert_eq!(storage.stores.lock().unwrap().len(), 2);
    }
}
