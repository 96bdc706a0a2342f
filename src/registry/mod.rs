//! Report registry
//!
//! Maps every declared `(category, subtype)` pair to a factory that builds the
//! run's `ReportQuery` from the request and a clock. Resolution also derives
//! the output filename and the display name used in emails.
//!
//! ## Filenames
//!
//! `{prefix}{subtype key}_{DD:MM:YYYY}.csv`, where the prefix is `schedule_`
//! for schedules, `debt_` for debt reports and empty otherwise. Journals and
//! schedules are dated by their transaction date; everything else by the
//! requested date. Re-running a request on the same day therefore targets the
//! same object key.

mod accounts_receivable;
mod debt;
mod journal;
mod schedule;

use chrono::NaiveDate;
use finance_report_types::{ReportCategory, ReportRequest, ReportSubtype};
use std::collections::HashMap;

use crate::clock::Clock;
use crate::error::{ReportError, Result};
use crate::query::ReportQuery;

type Factory = Box<dyn Fn(&ReportRequest, &dyn Clock) -> Result<ReportQuery> + Send + Sync>;

/// A request resolved to something the pipeline can run.
#[derive(Debug)]
pub struct ResolvedReport {
    pub query: ReportQuery,
    pub filename: String,
    pub display_name: String,
}

/// Registry of report factories keyed by `(category, subtype)`.
pub struct ReportRegistry {
    factories: HashMap<(ReportCategory, ReportSubtype), Factory>,
}

impl Default for ReportRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportRegistry {
    /// Registry holding every report in the catalogue.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        accounts_receivable::register(&mut registry);
        journal::register(&mut registry);
        schedule::register(&mut registry);
        debt::register(&mut registry);
        registry
    }

    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a factory under the subtype's own category.
    pub fn register<F>(&mut self, subtype: impl Into<ReportSubtype>, factory: F)
    where
        F: Fn(&ReportRequest, &dyn Clock) -> Result<ReportQuery> + Send + Sync + 'static,
    {
        let subtype = subtype.into();
        self.factories
            .insert((subtype.category(), subtype), Box::new(factory));
    }

    pub fn contains(&self, category: ReportCategory, subtype: ReportSubtype) -> bool {
        self.factories.contains_key(&(category, subtype))
    }

    /// Registered subtypes, in catalogue order.
    pub fn subtypes(&self) -> Vec<ReportSubtype> {
        let mut subtypes: Vec<_> = self.factories.keys().map(|(_, s)| *s).collect();
        subtypes.sort();
        subtypes
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Resolve a request to its query, filename and display name.
    pub fn resolve(&self, request: &ReportRequest, clock: &dyn Clock) -> Result<ResolvedReport> {
        let factory = self
            .factories
            .get(&(request.category, request.subtype))
            .ok_or(ReportError::UnimplementedReportKind {
                category: request.category,
                subtype: request.subtype,
            })?;

        let filename = report_filename(request, clock)?;
        let query = factory(request, clock)?;

        Ok(ResolvedReport {
            query,
            filename,
            display_name: request.subtype.translation().to_string(),
        })
    }
}

fn report_filename(request: &ReportRequest, clock: &dyn Clock) -> Result<String> {
    let (prefix, date) = match request.category {
        ReportCategory::AccountsReceivable => ("", clock.today()),
        ReportCategory::Journal => ("", transaction_date(request)?),
        ReportCategory::Schedule => ("schedule_", transaction_date(request)?),
        ReportCategory::Debt => ("debt_", clock.today()),
    };

    Ok(format!(
        "{}{}_{}.csv",
        prefix,
        request.subtype.key(),
        date.format("%d:%m:%Y")
    ))
}

/// The request's transaction date, required by journals and schedules.
pub(crate) fn transaction_date(request: &ReportRequest) -> Result<NaiveDate> {
    request
        .transaction_date
        .ok_or(ReportError::MissingParameter {
            report: request.subtype,
            parameter: "transaction date",
        })
}
