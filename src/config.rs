//! Pipeline configuration.
//!
//! Each section defaults from environment variables (call `dotenvy::dotenv()`
//! first to pick up a `.env`). A YAML file can override any field.

use anyhow::Context;
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::database::DatabaseConfig;

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env_string(name).and_then(|v| v.parse().ok())
}

/// Object storage configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint (localstack, minio). Plain HTTP is allowed when set.
    pub endpoint: Option<String>,
    /// KMS key id for server-side encryption.
    pub kms_key_id: Option<String>,
    /// Multipart parts in flight per upload.
    pub upload_concurrency: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: env_string("REPORTS_S3_BUCKET").unwrap_or_else(|| "reports".to_string()),
            region: env_string("AWS_REGION").unwrap_or_else(|| "eu-west-1".to_string()),
            endpoint: env_string("AWS_S3_ENDPOINT"),
            kms_key_id: env_string("S3_ENCRYPTION_KEY"),
            upload_concurrency: 4,
        }
    }
}

/// GOV.UK Notify template ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyTemplates {
    pub report_ready: String,
    pub report_failed: String,
    /// Sent for reports that are accepted for processing rather than generated (Fee Accrual).
    pub report_accepted: String,
    pub processing_failed: String,
}

impl Default for NotifyTemplates {
    fn default() -> Self {
        Self {
            report_ready: env_string("REPORT_READY_TEMPLATE_ID")
                .unwrap_or_else(|| "bade69e4-0eb1-4896-a709-bd8f8371a629".to_string()),
            report_failed: env_string("REPORT_FAILED_TEMPLATE_ID")
                .unwrap_or_else(|| "31c40127-b5b6-4d23-aaab-050d90639d83".to_string()),
            report_accepted: env_string("REPORT_ACCEPTED_TEMPLATE_ID")
                .unwrap_or_else(|| "8c85cf6c-695f-493a-a25f-77b4fb5f6a8e".to_string()),
            processing_failed: env_string("PROCESSING_FAILED_TEMPLATE_ID")
                .unwrap_or_else(|| "a8f9ab79-1489-4639-9e6c-cad1f079ebcf".to_string()),
        }
    }
}

/// Notification service configuration.
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    pub api_key: String,
    pub base_url: String,
    pub templates: NotifyTemplates,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            api_key: env_string("OPG_NOTIFY_API_KEY").unwrap_or_default(),
            base_url: env_string("NOTIFY_BASE_URL")
                .unwrap_or_else(|| "https://api.notifications.service.gov.uk".to_string()),
            templates: NotifyTemplates::default(),
        }
    }
}

/// Report run configuration.
#[derive(Debug, Clone)]
pub struct ReportsConfig {
    /// Base URL of the finance admin frontend; download links hang off it.
    pub finance_admin_url: String,
    /// Fallback lower bound for reports with an open date range.
    pub go_live_date: NaiveDate,
    /// Signing key for download tokens.
    pub token_secret: String,
    /// Maximum concurrent report runs.
    pub workers: usize,
    pub run_timeout: Duration,
    pub notify_timeout: Duration,
    /// CSV chunks buffered between the query and the upload.
    pub stream_buffer_chunks: usize,
    /// Bytes of CSV accumulated before a chunk is handed to the uploader.
    pub chunk_size: usize,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        let go_live_date = match env_string("FINANCE_HUB_LIVE_DATE") {
            Some(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d").unwrap_or_else(|e| {
                tracing::warn!(value = %raw, error = %e, "Invalid FINANCE_HUB_LIVE_DATE, ignoring");
                beginning_of_time()
            }),
            None => beginning_of_time(),
        };

        Self {
            finance_admin_url: env_string("FINANCE_ADMIN_URL")
                .unwrap_or_else(|| "http://localhost:8888/finance-admin".to_string()),
            go_live_date,
            token_secret: env_string("DOWNLOAD_TOKEN_SECRET").unwrap_or_default(),
            workers: env_parse("REPORT_WORKERS").unwrap_or(4),
            run_timeout: Duration::from_secs(env_parse("REPORT_RUN_TIMEOUT_SECS").unwrap_or(1800)),
            notify_timeout: Duration::from_secs(30),
            stream_buffer_chunks: 8,
            chunk_size: 64 * 1024,
        }
    }
}

impl ReportsConfig {
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = timeout;
        self
    }

    pub fn notify_timeout(mut self, timeout: Duration) -> Self {
        self.notify_timeout = timeout;
        self
    }

    pub fn chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes.max(1);
        self
    }
}

/// Earliest representable report date, used when no lower bound is known.
pub fn beginning_of_time() -> NaiveDate {
    NaiveDate::from_ymd_opt(1, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Complete application configuration.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub notify: NotifyConfig,
    pub reports: ReportsConfig,
}

/// YAML overrides. Every field is optional; absent fields keep the
/// environment-derived default.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    database_url: Option<String>,
    database_pool_size: Option<u32>,
    bucket: Option<String>,
    region: Option<String>,
    endpoint: Option<String>,
    kms_key_id: Option<String>,
    upload_concurrency: Option<usize>,
    notify_base_url: Option<String>,
    finance_admin_url: Option<String>,
    go_live_date: Option<NaiveDate>,
    workers: Option<usize>,
    run_timeout_secs: Option<u64>,
    notify_timeout_secs: Option<u64>,
    stream_buffer_chunks: Option<usize>,
    chunk_size: Option<usize>,
}

impl AppConfig {
    /// Environment-derived configuration.
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Environment defaults overlaid with a YAML file.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let file: ConfigFile = serde_yaml::from_str(content).context("invalid config YAML")?;
        let mut config = Self::from_env();
        config.apply(file);
        Ok(config)
    }

    fn apply(&mut self, file: ConfigFile) {
        if let Some(v) = file.database_url {
            self.database.database_url = v;
        }
        if let Some(v) = file.database_pool_size {
            self.database.max_connections = v;
        }
        if let Some(v) = file.bucket {
            self.storage.bucket = v;
        }
        if let Some(v) = file.region {
            self.storage.region = v;
        }
        if file.endpoint.is_some() {
            self.storage.endpoint = file.endpoint;
        }
        if file.kms_key_id.is_some() {
            self.storage.kms_key_id = file.kms_key_id;
        }
        if let Some(v) = file.upload_concurrency {
            self.storage.upload_concurrency = v.max(1);
        }
        if let Some(v) = file.notify_base_url {
            self.notify.base_url = v;
        }
        if let Some(v) = file.finance_admin_url {
            self.reports.finance_admin_url = v;
        }
        if let Some(v) = file.go_live_date {
            self.reports.go_live_date = v;
        }
        if let Some(v) = file.workers {
            self.reports.workers = v.max(1);
        }
        if let Some(v) = file.run_timeout_secs {
            self.reports.run_timeout = Duration::from_secs(v);
        }
        if let Some(v) = file.notify_timeout_secs {
            self.reports.notify_timeout = Duration::from_secs(v);
        }
        if let Some(v) = file.stream_buffer_chunks {
            self.reports.stream_buffer_chunks = v.max(1);
        }
        if let Some(v) = file.chunk_size {
            self.reports.chunk_size = v.max(1);
        }
    }
}
