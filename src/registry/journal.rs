//! Journal reports. Every journal is a single day's ledger lines in the
//! general ledger import layout.

use finance_report_types::JournalType;

use super::{transaction_date, ReportRegistry};
use crate::query::{BindValue, QueryDefinition, ReportQuery};

const RECEIPT_TRANSACTIONS_SQL: &str = include_str!("../../queries/receipt_transactions.sql");
const NON_RECEIPT_TRANSACTIONS_SQL: &str =
    include_str!("../../queries/non_receipt_transactions.sql");
const UNAPPLIED_TRANSACTIONS_SQL: &str = include_str!("../../queries/unapplied_transactions.sql");

const JOURNAL_HEADERS: &[&str] = &[
    "Entity",
    "Cost Centre",
    "Account",
    "Objective",
    "Analysis",
    "Intercompany",
    "Spare",
    "Debit",
    "Credit",
    "Line description",
];

pub(super) fn register(registry: &mut ReportRegistry) {
    registry.register(JournalType::ReceiptTransactions, |request, _| {
        let date = transaction_date(request)?;
        Ok(journal(RECEIPT_TRANSACTIONS_SQL, BindValue::Date(date)))
    });

    // Compared against TO_CHAR(created_at, 'YYYY-MM-DD'), so bound as text.
    registry.register(JournalType::NonReceiptTransactions, |request, _| {
        let date = transaction_date(request)?;
        Ok(journal(
            NON_RECEIPT_TRANSACTIONS_SQL,
            BindValue::Text(date.format("%Y-%m-%d").to_string()),
        ))
    });

    registry.register(JournalType::RefundUnappliedTransactions, |request, _| {
        let date = transaction_date(request)?;
        Ok(journal(UNAPPLIED_TRANSACTIONS_SQL, BindValue::Date(date)))
    });
}

fn journal(sql: &'static str, date: BindValue) -> ReportQuery {
    ReportQuery::Streamed(QueryDefinition::new(
        JOURNAL_HEADERS.iter().copied(),
        sql,
        vec![date],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::{NaiveDate, Utc};
    use finance_report_types::ReportRequest;

    #[test]
    fn test_non_receipt_binds_text_date() {
        let registry = ReportRegistry::new();
        let clock = FixedClock::new(Utc::now(), NaiveDate::MIN);
        let request = ReportRequest::new(JournalType::NonReceiptTransactions, "a@b.c")
            .with_transaction_date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());

        let resolved = registry.resolve(&request, &clock).unwrap();
        assert_eq!(
            resolved.query.definition().unwrap().params(),
            &[BindValue::Text("2024-03-01".to_string())]
        );
        assert_eq!(resolved.filename, "NonReceiptTransactions_01:03:2024.csv");
    }
}
