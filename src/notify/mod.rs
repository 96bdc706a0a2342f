//! Email notifications via GOV.UK Notify
//!
//! `NotificationDispatcher` turns run outcomes into template payloads;
//! `NotifyClient` implementations deliver them. Sends are best-effort: a
//! failure is returned to the caller to log, never retried here.
//!
//! The pipeline sends the ready, failed and accepted emails. The
//! processing-failed email (`send_processing_failed`) belongs to the ledger
//! upload flow, which lives outside this crate and calls it as library API
//! with the rejected line numbers and their reasons.

mod client;
mod failed_lines;

pub use client::{GovUkNotifyClient, LoggingNotifyClient};
pub use failed_lines::{format_failed_lines, FailedLineReason};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use crate::config::NotifyTemplates;

/// Error type for notification sends
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid Notify API key")]
    InvalidApiKey,

    #[error("failed to sign Notify token: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Notify rejected the request as unauthorized")]
    Unauthorized,

    #[error("Notify rejected the request as malformed")]
    BadRequest,

    #[error("Notify rejected the request as forbidden")]
    Forbidden,

    #[error("Notify endpoint not found")]
    NotFound,

    #[error("Notify internal server error")]
    InternalServer,

    #[error("Notify returned status {0}")]
    Status(u16),

    #[error("notification timed out")]
    Timeout,
}

impl NotifyError {
    /// Map a non-success HTTP status to its error.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => NotifyError::Unauthorized,
            400 => NotifyError::BadRequest,
            403 => NotifyError::Forbidden,
            404 => NotifyError::NotFound,
            500 => NotifyError::InternalServer,
            other => NotifyError::Status(other),
        }
    }
}

/// Which email is being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateId {
    ReportReady,
    ReportFailed,
    /// Acknowledges a report that is processed outside the export pipeline.
    ReportAccepted,
    ProcessingFailed,
}

impl TemplateId {
    /// Configured Notify template id.
    pub fn resolve(self, templates: &NotifyTemplates) -> &str {
        match self {
            TemplateId::ReportReady => &templates.report_ready,
            TemplateId::ReportFailed => &templates.report_failed,
            TemplateId::ReportAccepted => &templates.report_accepted,
            TemplateId::ProcessingFailed => &templates.processing_failed,
        }
    }
}

/// Template fields. Field names match the Notify templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Personalisation {
    ReportReady {
        file_link: String,
        report_name: String,
        requested_date: String,
        requested_date_time: String,
    },
    ReportStatus {
        report_name: String,
        requested_date: String,
        requested_date_time: String,
    },
    ProcessingFailed {
        failed_lines: Vec<String>,
        upload_type: String,
    },
}

impl Personalisation {
    /// Download link of a "report ready" email, if this is one.
    pub fn file_link(&self) -> Option<&str> {
        match self {
            Personalisation::ReportReady { file_link, .. } => Some(file_link),
            _ => None,
        }
    }

    pub fn report_name(&self) -> Option<&str> {
        match self {
            Personalisation::ReportReady { report_name, .. }
            | Personalisation::ReportStatus { report_name, .. } => Some(report_name),
            Personalisation::ProcessingFailed { .. } => None,
        }
    }
}

/// One email, as posted to Notify.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationPayload {
    pub email_address: String,
    pub template_id: String,
    pub personalisation: Personalisation,
    #[serde(skip)]
    pub template: TemplateId,
}

/// Delivers notification payloads.
#[async_trait]
pub trait NotifyClient: Send + Sync {
    async fn send(&self, payload: &NotificationPayload) -> Result<(), NotifyError>;
}

/// `YYYY-MM-DD` and `YYYY-MM-DD HH:MM:SS` renderings of the request time.
fn requested_fields(requested_at: DateTime<Utc>) -> (String, String) {
    (
        requested_at.format("%Y-%m-%d").to_string(),
        requested_at.format("%Y-%m-%d %H:%M:%S").to_string(),
    )
}

/// Builds template payloads and hands them to a `NotifyClient`.
#[derive(Clone)]
pub struct NotificationDispatcher {
    client: Arc<dyn NotifyClient>,
    templates: NotifyTemplates,
}

impl NotificationDispatcher {
    pub fn new(client: Arc<dyn NotifyClient>, templates: NotifyTemplates) -> Self {
        Self { client, templates }
    }

    fn payload(
        &self,
        email: &str,
        template: TemplateId,
        personalisation: Personalisation,
    ) -> NotificationPayload {
        NotificationPayload {
            email_address: email.to_string(),
            template_id: template.resolve(&self.templates).to_string(),
            personalisation,
            template,
        }
    }

    /// "Your report is ready" with the download link.
    pub async fn send_success(
        &self,
        email: &str,
        download_link: &str,
        report_name: &str,
        requested_at: DateTime<Utc>,
    ) -> Result<(), NotifyError> {
        let (requested_date, requested_date_time) = requested_fields(requested_at);
        let payload = self.payload(
            email,
            TemplateId::ReportReady,
            Personalisation::ReportReady {
                file_link: download_link.to_string(),
                report_name: report_name.to_string(),
                requested_date,
                requested_date_time,
            },
        );
        self.client.send(&payload).await
    }

    /// "Your report could not be generated".
    pub async fn send_failure(
        &self,
        email: &str,
        report_name: &str,
        requested_at: DateTime<Utc>,
    ) -> Result<(), NotifyError> {
        self.send_status(email, TemplateId::ReportFailed, report_name, requested_at)
            .await
    }

    /// "Your request has been accepted", for reports with nothing to export.
    pub async fn send_accepted(
        &self,
        email: &str,
        report_name: &str,
        requested_at: DateTime<Utc>,
    ) -> Result<(), NotifyError> {
        self.send_status(email, TemplateId::ReportAccepted, report_name, requested_at)
            .await
    }

    /// Upload processing failed on the listed lines.
    ///
    /// Not used by report runs; called by the ledger upload flow.
    pub async fn send_processing_failed(
        &self,
        email: &str,
        upload_type: &str,
        failed_lines: &BTreeMap<u32, FailedLineReason>,
    ) -> Result<(), NotifyError> {
        let payload = self.payload(
            email,
            TemplateId::ProcessingFailed,
            Personalisation::ProcessingFailed {
                failed_lines: format_failed_lines(failed_lines),
                upload_type: upload_type.to_string(),
            },
        );
        self.client.send(&payload).await
    }

    async fn send_status(
        &self,
        email: &str,
        template: TemplateId,
        report_name: &str,
        requested_at: DateTime<Utc>,
    ) -> Result<(), NotifyError> {
        let (requested_date, requested_date_time) = requested_fields(requested_at);
        let payload = self.payload(
            email,
            template,
            Personalisation::ReportStatus {
                report_name: report_name.to_string(),
                requested_date,
                requested_date_time,
            },
        );
        self.client.send(&payload).await
    }
}
