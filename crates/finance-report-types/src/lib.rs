//! Shared types for finance-reports.
//!
//! The report catalogue (categories, subtypes and their display names), the
//! inbound `ReportRequest`, and the ledger vocabularies that report parameters
//! are built from. Every enum travels on the wire as its stable key.

mod keyed;
pub mod ledger;
pub mod report;
pub mod request;

pub use keyed::UnknownKey;
pub use ledger::{AllocationStatus, FeeType, SupervisionLevel, TransactionType};
pub use report::{
    AccountsReceivableType, DebtType, JournalType, ReportCategory, ReportSubtype, ScheduleType,
};
pub use request::ReportRequest;
