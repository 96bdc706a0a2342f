//! Report pipeline orchestration
//!
//! One run takes a request through resolve, execute, upload and encode, and
//! ends with exactly one notification attempt: "ready" with a download link,
//! "accepted" for reports with nothing to export, or "failed" when any stage
//! errors. `run` never returns an error; the outcome is the terminal state.
//!
//! Execution and upload overlap. The engine produces CSV chunks while the
//! storage backend consumes them, so an execution failure surfaces through
//! the upload call and is told apart by its error kind.

mod worker;

pub use worker::{ReportRunHandle, ReportWorkerPool, RunJoinError};

use chrono::{DateTime, NaiveDate, Utc};
use finance_report_types::ReportRequest;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::clock::FixedClock;
use crate::config::AppConfig;
use crate::engine::{EngineConfig, ReportDataStore, ReportEngine};
use crate::error::{ReportError, Result};
use crate::notify::{NotificationDispatcher, NotifyClient, NotifyError};
use crate::query::{format_params, ReportQuery};
use crate::registry::ReportRegistry;
use crate::storage::ReportStorage;
use crate::token::DownloadTokenCodec;

/// Where a run is, or where it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Requested,
    Resolving,
    Executing,
    Uploading,
    Encoding,
    Notifying,
}

impl RunStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStage::Requested => "requested",
            RunStage::Resolving => "resolving",
            RunStage::Executing => "executing",
            RunStage::Uploading => "uploading",
            RunStage::Encoding => "encoding",
            RunStage::Notifying => "notifying",
        }
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalState {
    /// The "ready" (or "accepted") email was sent.
    NotifiedSuccess,
    /// The "failed" email was sent.
    NotifiedFailure,
    /// Sending the email failed; the run is over regardless.
    NotifyAttemptFailed,
}

impl fmt::Display for TerminalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TerminalState::NotifiedSuccess => "notified_success",
            TerminalState::NotifiedFailure => "notified_failure",
            TerminalState::NotifyAttemptFailed => "notify_attempt_failed",
        };
        f.write_str(s)
    }
}

/// One report request, stamped when it was accepted.
#[derive(Debug, Clone)]
pub struct ReportRun {
    pub run_id: Uuid,
    pub request: ReportRequest,
    pub requested_at: DateTime<Utc>,
}

impl ReportRun {
    pub fn new(request: ReportRequest, requested_at: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            request,
            requested_at,
        }
    }
}

/// Result of a finished run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub terminal: TerminalState,
    /// Stage that failed, if the run failed before notifying.
    pub failed_stage: Option<RunStage>,
    /// Rendered error of the failed stage.
    pub error: Option<String>,
    /// Object key the report was written to.
    pub object_key: Option<String>,
    pub download_link: Option<String>,
}

/// Settings a run needs beyond its collaborators.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub bucket: String,
    pub finance_admin_url: String,
    pub go_live_date: NaiveDate,
    pub notify_timeout: Duration,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            bucket: config.storage.bucket.clone(),
            finance_admin_url: config.reports.finance_admin_url.clone(),
            go_live_date: config.reports.go_live_date,
            notify_timeout: config.reports.notify_timeout,
        }
    }
}

/// What the requester is told on success.
enum Delivery {
    Ready { key: String, link: String },
    Accepted,
}

/// Sequences one report run end to end.
pub struct ReportPipeline {
    registry: Arc<ReportRegistry>,
    engine: ReportEngine,
    storage: Arc<dyn ReportStorage>,
    codec: DownloadTokenCodec,
    notifier: NotificationDispatcher,
    settings: PipelineSettings,
}

impl ReportPipeline {
    pub fn new(
        registry: Arc<ReportRegistry>,
        engine: ReportEngine,
        storage: Arc<dyn ReportStorage>,
        codec: DownloadTokenCodec,
        notifier: NotificationDispatcher,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            registry,
            engine,
            storage,
            codec,
            notifier,
            settings,
        }
    }

    /// Pipeline with the full report catalogue, wired from configuration.
    pub fn from_config(
        config: &AppConfig,
        data_store: Arc<dyn ReportDataStore>,
        storage: Arc<dyn ReportStorage>,
        notify: Arc<dyn NotifyClient>,
    ) -> Self {
        let engine = ReportEngine::new(
            data_store,
            EngineConfig {
                buffer_chunks: config.reports.stream_buffer_chunks,
                chunk_size: config.reports.chunk_size,
            },
        );

        Self::new(
            Arc::new(ReportRegistry::new()),
            engine,
            storage,
            DownloadTokenCodec::new(&config.reports.token_secret),
            NotificationDispatcher::new(notify, config.notify.templates.clone()),
            PipelineSettings::from_config(config),
        )
    }

    pub fn registry(&self) -> &ReportRegistry {
        &self.registry
    }

    /// Run one report to completion.
    ///
    /// Cancelling `cancel` stops the query and aborts the upload; the failure
    /// email is still sent, bounded by the notify timeout.
    pub async fn run(&self, run: &ReportRun, cancel: CancellationToken) -> RunOutcome {
        let span = tracing::info_span!(
            "report_run",
            run_id = %run.run_id,
            report = %run.request.subtype.key(),
        );
        self.run_inner(run, cancel).instrument(span).await
    }

    async fn run_inner(&self, run: &ReportRun, cancel: CancellationToken) -> RunOutcome {
        tracing::info!(
            category = %run.request.category,
            requested_at = %run.requested_at,
            "Report requested"
        );

        let mut stage = RunStage::Requested;
        let generated = self.generate(run, &cancel, &mut stage).await;

        let mut outcome = RunOutcome {
            run_id: run.run_id,
            terminal: TerminalState::NotifiedSuccess,
            failed_stage: None,
            error: None,
            object_key: None,
            download_link: None,
        };

        match &generated {
            Ok(Delivery::Ready { key, link }) => {
                outcome.object_key = Some(key.clone());
                outcome.download_link = Some(link.clone());
            }
            Ok(Delivery::Accepted) => {}
            Err(e) => {
                tracing::error!(stage = %stage, error = %e, "Report run failed");
                outcome.terminal = TerminalState::NotifiedFailure;
                outcome.failed_stage = Some(stage);
                outcome.error = Some(e.to_string());
            }
        }

        tracing::debug!(stage = %RunStage::Notifying, "Sending notification");
        let sent = tokio::time::timeout(self.settings.notify_timeout, self.notify(run, &generated))
            .await
            .unwrap_or(Err(NotifyError::Timeout));

        match sent {
            Ok(()) => {
                tracing::info!(terminal = %outcome.terminal, "Report run complete");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Unable to send notification");
                outcome.terminal = TerminalState::NotifyAttemptFailed;
            }
        }

        outcome
    }

    /// Everything up to, not including, the notification.
    async fn generate(
        &self,
        run: &ReportRun,
        cancel: &CancellationToken,
        stage: &mut RunStage,
    ) -> Result<Delivery> {
        *stage = RunStage::Resolving;
        if cancel.is_cancelled() {
            return Err(ReportError::Cancelled);
        }

        let clock = FixedClock::new(run.requested_at, self.settings.go_live_date);
        let resolved = self.registry.resolve(&run.request, &clock)?;

        let def = match resolved.query {
            ReportQuery::NoQuery => {
                tracing::info!("Report has no query, acknowledging request");
                return Ok(Delivery::Accepted);
            }
            ReportQuery::Streamed(def) => def,
        };

        *stage = RunStage::Executing;
        tracing::info!(
            stage = %stage,
            filename = %resolved.filename,
            params = %format_params(def.params()),
            "Executing report"
        );
        let body = self.engine.execute(def, cancel.clone());

        *stage = RunStage::Uploading;
        let version = match self
            .storage
            .stream_upload(&self.settings.bucket, &resolved.filename, body, cancel)
            .await
        {
            Ok(version) => version,
            Err(e) => {
                if !matches!(e, ReportError::Upload(_) | ReportError::Cancelled) {
                    *stage = RunStage::Executing;
                }
                return Err(e);
            }
        };
        tracing::info!(stage = %stage, version = %version, "Report uploaded");

        *stage = RunStage::Encoding;
        let token = self.codec.encode(&resolved.filename, &version)?;
        let link = format!(
            "{}/download?uid={}",
            self.settings.finance_admin_url.trim_end_matches('/'),
            token
        );

        Ok(Delivery::Ready {
            key: resolved.filename,
            link,
        })
    }

    async fn notify(
        &self,
        run: &ReportRun,
        generated: &Result<Delivery>,
    ) -> std::result::Result<(), NotifyError> {
        let email = &run.request.requester_email;
        let report_name = run.request.subtype.translation();

        match generated {
            Ok(Delivery::Ready { link, .. }) => {
                self.notifier
                    .send_success(email, link, report_name, run.requested_at)
                    .await
            }
            Ok(Delivery::Accepted) => {
                self.notifier
                    .send_accepted(email, report_name, run.requested_at)
                    .await
            }
            Err(_) => {
                self.notifier
                    .send_failure(email, report_name, run.requested_at)
                    .await
            }
        }
    }
}
