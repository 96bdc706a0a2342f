//! Query definitions.
//!
//! A `QueryDefinition` bundles everything the engine needs to run one report:
//! the CSV header row, the SQL text, the bound parameters and an optional
//! row transform. Definitions are built fresh per run by the registry and are
//! not modified afterwards.

pub mod wide_row;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::fmt;
use std::sync::Arc;

/// A typed bind parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Text(String),
    Int(i64),
    Bool(bool),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    TextArray(Vec<String>),
}

impl From<&str> for BindValue {
    fn from(v: &str) -> Self {
        BindValue::Text(v.to_string())
    }
}

impl From<String> for BindValue {
    fn from(v: String) -> Self {
        BindValue::Text(v)
    }
}

impl From<i64> for BindValue {
    fn from(v: i64) -> Self {
        BindValue::Int(v)
    }
}

impl From<bool> for BindValue {
    fn from(v: bool) -> Self {
        BindValue::Bool(v)
    }
}

impl From<NaiveDate> for BindValue {
    fn from(v: NaiveDate) -> Self {
        BindValue::Date(v)
    }
}

impl From<NaiveDateTime> for BindValue {
    fn from(v: NaiveDateTime) -> Self {
        BindValue::Timestamp(v)
    }
}

impl From<Vec<String>> for BindValue {
    fn from(v: Vec<String>) -> Self {
        BindValue::TextArray(v)
    }
}

impl fmt::Display for BindValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindValue::Text(v) => write!(f, "{:?}", v),
            BindValue::Int(v) => write!(f, "{}", v),
            BindValue::Bool(v) => write!(f, "{}", v),
            BindValue::Date(v) => write!(f, "\"{}\"", v.format("%Y-%m-%d")),
            BindValue::Timestamp(v) => write!(f, "\"{}\"", v.format("%Y-%m-%d %H:%M:%S")),
            BindValue::TextArray(v) => write!(f, "{:?}", v),
        }
    }
}

/// Render a parameter list the way it appears in logs: `["2024-03-01", 42]`.
pub fn format_params(params: &[BindValue]) -> String {
    let inner: Vec<String> = params.iter().map(ToString::to_string).collect();
    format!("[{}]", inner.join(","))
}

/// A column value as read from the data store.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Text(String),
    Int(i64),
    Float(f64),
    /// Arbitrary precision numeric, already rendered.
    Numeric(String),
    Bool(bool),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Json(serde_json::Value),
}

impl RawValue {
    /// Display string written to the CSV. NULL renders as an empty cell.
    pub fn to_display(&self) -> String {
        match self {
            RawValue::Null => String::new(),
            RawValue::Text(v) => v.clone(),
            RawValue::Int(v) => v.to_string(),
            RawValue::Float(v) => v.to_string(),
            RawValue::Numeric(v) => v.clone(),
            RawValue::Bool(v) => v.to_string(),
            RawValue::Date(v) => v.format("%Y-%m-%d").to_string(),
            RawValue::Timestamp(v) => v.format("%Y-%m-%d %H:%M:%S").to_string(),
            RawValue::TimestampTz(v) => v.format("%Y-%m-%d %H:%M:%S").to_string(),
            RawValue::Json(v) => v.to_string(),
        }
    }
}

impl From<&str> for RawValue {
    fn from(v: &str) -> Self {
        RawValue::Text(v.to_string())
    }
}

pub type RawRow = Vec<RawValue>;

type TransformFn = dyn Fn(&[RawValue]) -> Result<Vec<String>, String> + Send + Sync;

/// Turns one raw row into display columns, for reports whose rows need more
/// than a per-column display conversion.
#[derive(Clone)]
pub struct RowTransform {
    name: &'static str,
    apply: Arc<TransformFn>,
}

impl RowTransform {
    pub fn new<F>(name: &'static str, apply: F) -> Self
    where
        F: Fn(&[RawValue]) -> Result<Vec<String>, String> + Send + Sync + 'static,
    {
        Self {
            name,
            apply: Arc::new(apply),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn apply(&self, row: &[RawValue]) -> Result<Vec<String>, String> {
        (self.apply)(row)
    }
}

impl fmt::Debug for RowTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowTransform").field("name", &self.name).finish()
    }
}

/// Headers, SQL, parameters and optional transform for one report run.
#[derive(Debug, Clone)]
pub struct QueryDefinition {
    headers: Vec<String>,
    sql: &'static str,
    params: Vec<BindValue>,
    row_transform: Option<RowTransform>,
}

impl QueryDefinition {
    pub fn new<H>(headers: H, sql: &'static str, params: Vec<BindValue>) -> Self
    where
        H: IntoIterator,
        H::Item: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            sql,
            params,
            row_transform: None,
        }
    }

    pub fn with_row_transform(mut self, transform: RowTransform) -> Self {
        self.row_transform = Some(transform);
        self
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn sql(&self) -> &'static str {
        self.sql
    }

    pub fn params(&self) -> &[BindValue] {
        &self.params
    }

    pub fn row_transform(&self) -> Option<&RowTransform> {
        self.row_transform.as_ref()
    }
}

/// What a resolved report asks the pipeline to do.
#[derive(Debug, Clone)]
pub enum ReportQuery {
    /// Run the query, stream it to storage and send the download link.
    Streamed(QueryDefinition),
    /// Nothing to generate; the request is acknowledged by email only.
    NoQuery,
}

impl ReportQuery {
    pub fn definition(&self) -> Option<&QueryDefinition> {
        match self {
            ReportQuery::Streamed(def) => Some(def),
            ReportQuery::NoQuery => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_params_mixed() {
        let params = vec![
            BindValue::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()),
            BindValue::from("SUPERVISION CHEQUE PAYMENT"),
            BindValue::Int(123456),
        ];
        assert_eq!(
            format_params(&params),
            r#"["2024-03-01","SUPERVISION CHEQUE PAYMENT",123456]"#
        );
    }

    #[test]
    fn test_null_displays_empty() {
        assert_eq!(RawValue::Null.to_display(), "");
        assert_eq!(RawValue::Numeric("12.50".into()).to_display(), "12.50");
        let ts = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(9, 5, 0)
            .unwrap();
        assert_eq!(RawValue::Timestamp(ts).to_display(), "2024-03-01 09:05:00");
    }

    #[test]
    fn test_no_query_has_no_definition() {
        assert!(ReportQuery::NoQuery.definition().is_none());
        let def = QueryDefinition::new(["a", "b"], "SELECT 1, 2", vec![]);
        assert_eq!(def.headers(), &["a".to_string(), "b".to_string()]);
        assert!(ReportQuery::Streamed(def).definition().is_some());
    }
}
