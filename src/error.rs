//! Error handling for the report pipeline
//!
//! `ReportError` is the pipeline-wide error type. Adapter errors (storage,
//! notification, token) are their own enums and convert into it with `From`.

use finance_report_types::{ReportCategory, ReportSubtype};
use thiserror::Error;

pub use crate::notify::NotifyError;
pub use crate::storage::StorageError;
pub use crate::token::TokenError;

/// Boxed error from a data store driver.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for report runs
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("unimplemented {category} report: {subtype}")]
    UnimplementedReportKind {
        category: ReportCategory,
        subtype: ReportSubtype,
    },

    #[error("{report} report requires {parameter}")]
    MissingParameter {
        report: ReportSubtype,
        parameter: &'static str,
    },

    #[error("query execution failed: {0}")]
    QueryExecution(#[source] BoxError),

    #[error("failed to decode row {row}: {reason}")]
    RowDecode { row: u64, reason: String },

    #[error("CSV encoding failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("upload failed: {0}")]
    Upload(#[from] StorageError),

    #[error("invalid download token: {0}")]
    InvalidToken(#[from] TokenError),

    #[error("notification send failed: {0}")]
    NotificationSend(#[from] NotifyError),

    #[error("report run cancelled")]
    Cancelled,
}

impl ReportError {
    /// Wrap a data store failure.
    pub fn query(err: impl Into<BoxError>) -> Self {
        ReportError::QueryExecution(err.into())
    }

    /// Whether the error came from resolving the request rather than running it.
    pub fn is_resolution(&self) -> bool {
        matches!(
            self,
            ReportError::UnimplementedReportKind { .. } | ReportError::MissingParameter { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ReportError>;
