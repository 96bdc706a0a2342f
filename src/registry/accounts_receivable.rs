//! Accounts receivable reports.

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};
use finance_report_types::{AccountsReceivableType, ReportRequest};

use super::ReportRegistry;
use crate::clock::Clock;
use crate::config::beginning_of_time;
use crate::error::Result;
use crate::query::{BindValue, QueryDefinition, ReportQuery};

const AGED_DEBT_SQL: &str = include_str!("../../queries/aged_debt.sql");
const AGED_DEBT_BY_CUSTOMER_SQL: &str = include_str!("../../queries/aged_debt_by_customer.sql");
const CUSTOMER_CREDIT_SQL: &str = include_str!("../../queries/customer_credit.sql");
const PAID_INVOICES_SQL: &str = include_str!("../../queries/paid_invoices.sql");
const RECEIPTS_SQL: &str = include_str!("../../queries/receipts.sql");
const BAD_DEBT_WRITE_OFF_SQL: &str = include_str!("../../queries/bad_debt_write_off.sql");
const INVOICE_ADJUSTMENTS_SQL: &str = include_str!("../../queries/invoice_adjustments.sql");

const AGED_DEBT_HEADERS: &[&str] = &[
    "Customer name",
    "Customer number",
    "SOP number",
    "Deputy type",
    "Active case?",
    "Entity",
    "Receivable cost centre",
    "Receivable cost centre description",
    "Receivable account code",
    "Revenue cost centre",
    "Revenue cost centre description",
    "Revenue account code",
    "Revenue account code description",
    "Invoice type",
    "Trx number",
    "Transaction description",
    "Invoice date",
    "Due date",
    "Financial year",
    "Payment terms",
    "Original amount",
    "Outstanding amount",
    "Current",
    "0-1 years",
    "1-2 years",
    "2-3 years",
    "3-5 years",
    "5+ years",
    "Debt impairment years",
];

const AGED_DEBT_BY_CUSTOMER_HEADERS: &[&str] = &[
    "Customer Name",
    "Customer number",
    "SOP number",
    "Deputy type",
    "Active case?",
    "Outstanding amount",
    "Current",
    "1 - 21 Days",
    "22 - 35 Days",
    "36 - 65 Days",
    "66 - 90 Days",
    "91 - 120 Days",
    "121 - 365 Days",
    "0-1 years",
    "1-2 years",
    "2-3 years",
    "3-5 years",
    "5+ years",
];

const CUSTOMER_CREDIT_HEADERS: &[&str] = &[
    "Customer name",
    "Customer number",
    "SOP number",
    "Credit balance",
];

const PAID_INVOICES_HEADERS: &[&str] = &[
    "Customer name",
    "Customer number",
    "SOP number",
    "Entity",
    "Cost centre",
    "Cost centre description",
    "Account code",
    "Account code description",
    "Invoice type",
    "Invoice number",
    "Txn number",
    "Txn description",
    "Original amount",
    "Received date",
    "Sirius upload date",
    "Cash amount",
    "Credit amount",
    "Adjustment amount",
    "Memo line description",
];

const RECEIPTS_HEADERS: &[&str] = &[
    "Customer name",
    "Customer number",
    "SOP number",
    "Entity",
    "Receivables cost centre",
    "Receivables cost centre description",
    "Receivables account code",
    "Account code description",
    "Txn number",
    "Txn type",
    "Receipt date",
    "Sirius upload date",
    "Financial Year",
    "Receipt number",
    "Receipt amount",
    "Amount applied",
    "Amount unapplied",
    "Line description (does not feature on report)",
];

const BAD_DEBT_WRITE_OFF_HEADERS: &[&str] = &[
    "Customer name",
    "Customer number",
    "SOP number",
    "Entity",
    "Cost centre",
    "Account code",
    "Account code description",
    "Adjustment amount",
    "Adjustment date",
    "Txn number",
    "Approver",
];

const INVOICE_ADJUSTMENTS_HEADERS: &[&str] = &[
    "Customer Name",
    "Customer number",
    "SOP number",
    "Entity",
    "Revenue cost centre",
    "Revenue cost centre description",
    "Revenue account code",
    "Revenue account descriptions",
    "Txn number and type",
    "Txn description",
    "Remission/exemption term",
    "Financial Year",
    "Approved date",
    "Adjustment amount",
    "Reason for adjustment",
];

pub(super) fn register(registry: &mut ReportRegistry) {
    registry.register(AccountsReceivableType::AgedDebt, aged_debt);
    registry.register(AccountsReceivableType::AgedDebtByCustomer, |_, _| {
        Ok(streamed(AGED_DEBT_BY_CUSTOMER_HEADERS, AGED_DEBT_BY_CUSTOMER_SQL, vec![]))
    });
    registry.register(AccountsReceivableType::UnappliedReceipts, |_, _| {
        Ok(streamed(CUSTOMER_CREDIT_HEADERS, CUSTOMER_CREDIT_SQL, vec![]))
    });
    registry.register(AccountsReceivableType::ArPaidInvoice, paid_invoices);
    registry.register(AccountsReceivableType::TotalReceipts, total_receipts);
    registry.register(AccountsReceivableType::BadDebtWriteOff, bad_debt_write_off);
    registry.register(AccountsReceivableType::FeeAccrual, |_, _| Ok(ReportQuery::NoQuery));
    registry.register(AccountsReceivableType::InvoiceAdjustments, invoice_adjustments);
}

fn streamed(headers: &[&str], sql: &'static str, params: Vec<BindValue>) -> ReportQuery {
    ReportQuery::Streamed(QueryDefinition::new(headers.iter().copied(), sql, params))
}

fn start_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_hms_opt(23, 59, 59)
        .unwrap_or_else(|| start_of_day(date))
}

/// `[from ?? 0001-01-01, to ?? today]`
fn open_range(request: &ReportRequest, clock: &dyn Clock) -> Vec<BindValue> {
    vec![
        request.from_date.unwrap_or_else(beginning_of_time).into(),
        request.to_date.unwrap_or_else(|| clock.today()).into(),
    ]
}

fn aged_debt(request: &ReportRequest, clock: &dyn Clock) -> Result<ReportQuery> {
    Ok(streamed(AGED_DEBT_HEADERS, AGED_DEBT_SQL, open_range(request, clock)))
}

fn total_receipts(request: &ReportRequest, clock: &dyn Clock) -> Result<ReportQuery> {
    Ok(streamed(RECEIPTS_HEADERS, RECEIPTS_SQL, open_range(request, clock)))
}

fn paid_invoices(request: &ReportRequest, clock: &dyn Clock) -> Result<ReportQuery> {
    let from = request.from_date.unwrap_or_else(|| clock.go_live_date());
    let to = request.to_date.unwrap_or_else(|| clock.today());
    Ok(streamed(
        PAID_INVOICES_HEADERS,
        PAID_INVOICES_SQL,
        vec![from.into(), to.into()],
    ))
}

fn invoice_adjustments(request: &ReportRequest, clock: &dyn Clock) -> Result<ReportQuery> {
    let from = request.from_date.unwrap_or_else(|| clock.go_live_date());
    let to = request.to_date.unwrap_or_else(|| clock.today());
    Ok(streamed(
        INVOICE_ADJUSTMENTS_HEADERS,
        INVOICE_ADJUSTMENTS_SQL,
        vec![start_of_day(from).into(), end_of_day(to).into()],
    ))
}

fn bad_debt_write_off(request: &ReportRequest, clock: &dyn Clock) -> Result<ReportQuery> {
    let from = request.from_date.unwrap_or_else(|| clock.go_live_date());
    let to = request.to_date.unwrap_or_else(|| clock.today());
    // Upper bound is midnight at the start of the day after `to`.
    let until = to.checked_add_days(Days::new(1)).unwrap_or(to);
    Ok(streamed(
        BAD_DEBT_WRITE_OFF_HEADERS,
        BAD_DEBT_WRITE_OFF_SQL,
        vec![start_of_day(from).into(), start_of_day(until).into()],
    ))
}
