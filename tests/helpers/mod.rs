//! Shared collaborators for pipeline integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use finance_reports::config::NotifyTemplates;
use finance_reports::engine::{EngineConfig, ReportDataStore, ReportEngine, ReportStream, RowStream};
use finance_reports::error::{NotifyError, ReportError, Result, StorageError};
use finance_reports::notify::{NotificationDispatcher, NotificationPayload, NotifyClient};
use finance_reports::pipeline::{PipelineSettings, ReportPipeline};
use finance_reports::query::{BindValue, RawRow};
use finance_reports::storage::ReportStorage;
use finance_reports::{DownloadTokenCodec, ReportRegistry};

pub const TOKEN_SECRET: &str = "integration-secret";
pub const ADMIN_URL: &str = "https://finance.example/finance-admin";
pub const BUCKET: &str = "reports";

pub fn requested_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap()
}

pub fn go_live() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

/// Serves the same canned rows for every query.
pub struct VecDataStore {
    rows: Vec<RawRow>,
    pub queries: Mutex<Vec<Vec<BindValue>>>,
}

impl VecDataStore {
    pub fn new(rows: Vec<RawRow>) -> Self {
        Self {
            rows,
            queries: Mutex::new(Vec::new()),
        }
    }
}

impl ReportDataStore for VecDataStore {
    fn stream_rows(&self, _sql: &'static str, params: Vec<BindValue>) -> RowStream {
        self.queries.lock().unwrap().push(params);
        stream::iter(self.rows.clone().into_iter().map(Ok)).boxed()
    }
}

/// Records every payload; optionally fails every send or takes a while.
#[derive(Default)]
pub struct RecordingNotify {
    pub sent: Mutex<Vec<NotificationPayload>>,
    fail: bool,
    delay: Duration,
}

impl RecordingNotify {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Records the payload only after a simulated round trip.
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn payloads(&self) -> Vec<NotificationPayload> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotifyClient for RecordingNotify {
    async fn send(&self, payload: &NotificationPayload) -> std::result::Result<(), NotifyError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.sent.lock().unwrap().push(payload.clone());
        if self.fail {
            return Err(NotifyError::InternalServer);
        }
        Ok(())
    }
}

/// Reads the first chunk, then fails like a dropped connection.
pub struct FailingStorage;

#[async_trait]
impl ReportStorage for FailingStorage {
    async fn stream_upload(
        &self,
        _bucket: &str,
        _key: &str,
        mut body: ReportStream,
        _cancel: &CancellationToken,
    ) -> Result<String> {
        let _ = body.next().await;
        Err(StorageError::Storage("simulated connection reset".into()).into())
    }
}

/// Holds the upload open until the run is cancelled.
pub struct HangingStorage;

#[async_trait]
impl ReportStorage for HangingStorage {
    async fn stream_upload(
        &self,
        _bucket: &str,
        _key: &str,
        _body: ReportStream,
        cancel: &CancellationToken,
    ) -> Result<String> {
        cancel.cancelled().await;
        Err(ReportError::Cancelled)
    }
}

/// Tracks how many uploads are in progress at once.
#[derive(Default)]
pub struct TrackingStorage {
    active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub completed: AtomicUsize,
}

#[async_trait]
impl ReportStorage for TrackingStorage {
    async fn stream_upload(
        &self,
        _bucket: &str,
        _key: &str,
        mut body: ReportStream,
        _cancel: &CancellationToken,
    ) -> Result<String> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        let mut bytes = Vec::new();
        while let Some(chunk) = body.next().await {
            let chunk: Bytes = chunk?;
            bytes.extend_from_slice(&chunk);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        self.active.fetch_sub(1, Ordering::SeqCst);
        let n = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("v{}", n))
    }
}

pub fn templates() -> NotifyTemplates {
    NotifyTemplates {
        report_ready: "ready-template".into(),
        report_failed: "failed-template".into(),
        report_accepted: "accepted-template".into(),
        processing_failed: "processing-failed-template".into(),
    }
}

pub fn pipeline(
    data_store: Arc<dyn ReportDataStore>,
    storage: Arc<dyn ReportStorage>,
    notify: Arc<dyn NotifyClient>,
) -> ReportPipeline {
    ReportPipeline::new(
        Arc::new(ReportRegistry::new()),
        ReportEngine::new(
            data_store,
            EngineConfig {
                buffer_chunks: 2,
                chunk_size: 256,
            },
        ),
        storage,
        DownloadTokenCodec::new(TOKEN_SECRET),
        NotificationDispatcher::new(notify, templates()),
        PipelineSettings {
            bucket: BUCKET.into(),
            finance_admin_url: ADMIN_URL.into(),
            go_live_date: go_live(),
            notify_timeout: Duration::from_secs(5),
        },
    )
}
