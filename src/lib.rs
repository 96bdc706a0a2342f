//! Finance report generation and delivery.
//!
//! A report request is resolved against the registry to a query definition,
//! streamed from Postgres as CSV straight into versioned object storage, and
//! the requester is emailed a signed download link (or a failure notice).
//!
//! ## Modules
//!
//! - `registry`: request to query definition, filename and display name
//! - `engine`: cursor-driven CSV streaming with backpressure
//! - `storage`: S3, local and in-memory report storage
//! - `token`: signed download tokens
//! - `notify`: GOV.UK Notify client and email payloads
//! - `pipeline`: the run orchestrator and bounded worker pool

pub mod clock;
pub mod config;
pub mod database;
pub mod engine;
pub mod error;
pub mod notify;
pub mod pipeline;
pub mod query;
pub mod registry;
pub mod storage;
pub mod token;

pub use finance_report_types as types;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::AppConfig;
pub use engine::{EngineConfig, ReportDataStore, ReportEngine, ReportStream, RowStream};
pub use error::{ReportError, Result};
pub use notify::{NotificationDispatcher, NotifyClient};
pub use pipeline::{
    ReportPipeline, ReportRun, ReportRunHandle, ReportWorkerPool, RunJoinError, RunOutcome,
    RunStage, TerminalState,
};
pub use query::{BindValue, QueryDefinition, RawValue, ReportQuery};
pub use registry::{ReportRegistry, ResolvedReport};
pub use storage::ReportStorage;
pub use token::{DownloadToken, DownloadTokenCodec};
