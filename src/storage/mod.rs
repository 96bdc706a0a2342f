//! Report Storage Abstraction
//!
//! Streams a finished report's CSV into durable storage and returns the
//! version id of the written object. Implementations target S3 (production),
//! the local filesystem (development runs) and memory (tests).
//!
//! Every implementation consumes the body without knowing its size up front,
//! and never leaves a completed object behind when the body fails, the write
//! fails or the run is cancelled.

mod local;
mod memory;
mod s3;

pub use local::LocalReportStorage;
pub use memory::InMemoryReportStorage;
pub use s3::S3ReportStorage;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::engine::ReportStream;
use crate::error::{ReportError, Result};

/// Content type of every stored report.
pub const CSV_CONTENT_TYPE: &str = "text/csv";

/// Error type for report storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("store returned no version id for {bucket}/{key}")]
    MissingVersion { bucket: String, key: String },

    #[error("storage error: {0}")]
    Storage(String),
}

/// Durable, versioned storage for generated reports.
#[async_trait]
pub trait ReportStorage: Send + Sync {
    /// Stream `body` to `bucket`/`key`, returning the new object version.
    ///
    /// Writing to an existing key creates a new version. A body error is
    /// returned unchanged after the partial write is discarded; storage
    /// failures come back as `ReportError::Upload`.
    async fn stream_upload(
        &self,
        bucket: &str,
        key: &str,
        body: ReportStream,
        cancel: &CancellationToken,
    ) -> Result<String>;
}

/// Pull the next chunk, giving up if the run is cancelled first.
pub(crate) async fn next_chunk(
    body: &mut ReportStream,
    cancel: &CancellationToken,
) -> Option<Result<Bytes>> {
    tokio::select! {
        _ = cancel.cancelled() => Some(Err(ReportError::Cancelled)),
        chunk = body.next() => chunk,
    }
}

/// Reject keys that could escape a bucket directory.
pub(crate) fn validate_key(key: &str) -> std::result::Result<(), StorageError> {
    if key.is_empty()
        || key.starts_with('/')
        || key.split('/').any(|part| part.is_empty() || part == "." || part == "..")
    {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("schedule_ChequePayments_01:03:2024.csv").is_ok());
        assert!(validate_key("reports/2024/AgedDebt_01:03:2024.csv").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("/etc/passwd").is_err());
        assert!(validate_key("../escape.csv").is_err());
        assert!(validate_key("a//b.csv").is_err());
    }
}
