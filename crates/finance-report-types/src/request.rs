//! Inbound report request.

use crate::report::{ReportCategory, ReportSubtype};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A request to generate one report, as posted by the finance admin frontend.
///
/// The struct does not enforce that `subtype` belongs to `category`, nor which
/// of the date fields a subtype reads; both are checked when the request is
/// resolved against the report registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    #[serde(rename = "reportType")]
    pub category: ReportCategory,
    #[serde(rename = "reportSubtype")]
    pub subtype: ReportSubtype,
    #[serde(rename = "email")]
    pub requester_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pis_number: Option<i64>,
}

impl ReportRequest {
    /// Request a subtype under its own category.
    pub fn new(subtype: impl Into<ReportSubtype>, requester_email: impl Into<String>) -> Self {
        let subtype = subtype.into();
        Self {
            category: subtype.category(),
            subtype,
            requester_email: requester_email.into(),
            from_date: None,
            to_date: None,
            transaction_date: None,
            pis_number: None,
        }
    }

    /// Override the declared category.
    pub fn with_category(mut self, category: ReportCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_date_range(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.from_date = from;
        self.to_date = to;
        self
    }

    pub fn with_transaction_date(mut self, date: NaiveDate) -> Self {
        self.transaction_date = Some(date);
        self
    }

    pub fn with_pis_number(mut self, pis_number: i64) -> Self {
        self.pis_number = Some(pis_number);
        self
    }
}
