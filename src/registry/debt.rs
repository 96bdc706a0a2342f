//! Debt reports.
//!
//! Fee chase and final fee debt list each customer's outstanding invoices as
//! repeated `InvoiceN`/`AmountN` columns, flattened from the query's trailing
//! JSON column by the wide-row transform.

use finance_report_types::{DebtType, ReportRequest};

use super::ReportRegistry;
use crate::clock::Clock;
use crate::config::beginning_of_time;
use crate::error::Result;
use crate::query::wide_row::{wide_headers, wide_row_transform, MAX_INVOICE_PAIRS};
use crate::query::{QueryDefinition, ReportQuery};

const FEE_CHASE_SQL: &str = include_str!("../../queries/fee_chase.sql");
const FINAL_FEE_DEBT_SQL: &str = include_str!("../../queries/final_fee_debt.sql");
const APPROVED_REFUNDS_SQL: &str = include_str!("../../queries/approved_refunds.sql");
const ALL_REFUNDS_SQL: &str = include_str!("../../queries/all_refunds.sql");

const FEE_CHASE_FIXED_HEADERS: &[&str] = &[
    "Case_no",
    "Client_no",
    "Client_title",
    "Client_forename",
    "Client_surname",
    "Do_not_chase",
    "Payment_method",
    "Deputy_type",
    "Deputy_no",
    "Airmail",
    "Deputy_title",
    "Deputy_Welsh",
    "Deputy_Large_Print",
    "Deputy_name",
    "Email",
    "Address1",
    "Address2",
    "Address3",
    "City_Town",
    "County",
    "Postcode",
    "Total_debt",
];

const FINAL_FEE_DEBT_FIXED_HEADERS: &[&str] = &[
    "Case_no",
    "Client_no",
    "Client_title",
    "Client_forename",
    "Client_surname",
    "Closed_date",
    "Closure_reason",
    "Do_not_chase",
    "Deputy_type",
    "Deputy_no",
    "Airmail",
    "Deputy_title",
    "Deputy_name",
    "Email",
    "Address1",
    "Address2",
    "Address3",
    "City_town",
    "County",
    "Postcode",
    "Total_debt",
];

const APPROVED_REFUNDS_HEADERS: &[&str] = &[
    "Court reference",
    "Amount",
    "Bank account name",
    "Bank account number",
    "Bank account sort code",
    "Created by",
    "Approved by",
];

const ALL_REFUNDS_HEADERS: &[&str] = &[
    "Court reference",
    "Amount",
    "Create date",
    "Created by",
    "Approved by",
    "Status",
    "Status Date",
];

pub(super) fn register(registry: &mut ReportRegistry) {
    registry.register(DebtType::FeeChase, |_, _| {
        Ok(wide_report(FEE_CHASE_FIXED_HEADERS, FEE_CHASE_SQL))
    });
    registry.register(DebtType::FinalFeeDebt, |_, _| {
        Ok(wide_report(FINAL_FEE_DEBT_FIXED_HEADERS, FINAL_FEE_DEBT_SQL))
    });
    registry.register(DebtType::ApprovedRefunds, |_, _| {
        Ok(ReportQuery::Streamed(QueryDefinition::new(
            APPROVED_REFUNDS_HEADERS.iter().copied(),
            APPROVED_REFUNDS_SQL,
            vec![],
        )))
    });
    registry.register(DebtType::AllRefunds, all_refunds);
}

fn wide_report(fixed: &[&str], sql: &'static str) -> ReportQuery {
    ReportQuery::Streamed(
        QueryDefinition::new(wide_headers(fixed, MAX_INVOICE_PAIRS), sql, vec![])
            .with_row_transform(wide_row_transform(fixed.len(), MAX_INVOICE_PAIRS)),
    )
}

fn all_refunds(request: &ReportRequest, clock: &dyn Clock) -> Result<ReportQuery> {
    let from = request.from_date.unwrap_or_else(beginning_of_time);
    let to = request.to_date.unwrap_or_else(|| clock.today());
    Ok(ReportQuery::Streamed(QueryDefinition::new(
        ALL_REFUNDS_HEADERS.iter().copied(),
        ALL_REFUNDS_SQL,
        vec![from.into(), to.into()],
    )))
}
