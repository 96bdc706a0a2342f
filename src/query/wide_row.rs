//! Wide-row flattening.
//!
//! Debt chase reports carry a variable-length list of outstanding invoices per
//! customer as a JSON array in the last column. The CSV has a fixed number of
//! `InvoiceN`/`AmountN` column pairs, so the list is flattened and padded with
//! empty strings until every row has the header's width.

use serde::{Deserialize, Deserializer};

use super::{RawValue, RowTransform};

/// Invoice/amount column pairs on the debt chase reports.
pub const MAX_INVOICE_PAIRS: usize = 23;

/// One outstanding invoice from the JSON column.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InvoicePair {
    pub reference: String,
    #[serde(alias = "debt", deserialize_with = "string_or_number")]
    pub amount: String,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number amount, got {}",
            other
        ))),
    }
}

/// Flatten `pairs` into exactly `max_pairs * 2` columns.
///
/// Missing pairs are padded with empty strings; pairs beyond `max_pairs` are
/// dropped so the row keeps the header's width.
pub fn flatten_pairs(max_pairs: usize, pairs: &[InvoicePair]) -> Vec<String> {
    let mut columns = Vec::with_capacity(max_pairs * 2);
    for pair in pairs.iter().take(max_pairs) {
        columns.push(pair.reference.clone());
        columns.push(pair.amount.clone());
    }
    columns.resize(max_pairs * 2, String::new());
    columns
}

/// `Invoice1, Amount1, ... InvoiceN, AmountN` appended to the fixed headers.
pub fn wide_headers(fixed: &[&str], max_pairs: usize) -> Vec<String> {
    let mut headers: Vec<String> = fixed.iter().map(|h| h.to_string()).collect();
    for n in 1..=max_pairs {
        headers.push(format!("Invoice{}", n));
        headers.push(format!("Amount{}", n));
    }
    headers
}

fn parse_pairs(value: &RawValue) -> Result<Vec<InvoicePair>, String> {
    match value {
        RawValue::Null => Ok(Vec::new()),
        RawValue::Json(serde_json::Value::Null) => Ok(Vec::new()),
        RawValue::Json(json) => {
            Vec::<InvoicePair>::deserialize(json).map_err(|e| format!("invalid invoice list: {}", e))
        }
        RawValue::Text(text) => {
            serde_json::from_str(text).map_err(|e| format!("invalid invoice list: {}", e))
        }
        other => Err(format!("invoice list is not JSON: {:?}", other)),
    }
}

/// Row transform for a query returning `fixed_columns` plain columns followed
/// by one JSON invoice list.
pub fn wide_row_transform(fixed_columns: usize, max_pairs: usize) -> RowTransform {
    RowTransform::new("wide_row", move |row: &[RawValue]| {
        if row.len() != fixed_columns + 1 {
            return Err(format!(
                "expected {} columns, got {}",
                fixed_columns + 1,
                row.len()
            ));
        }

        let pairs = parse_pairs(&row[fixed_columns])?;
        let mut columns: Vec<String> = row[..fixed_columns].iter().map(RawValue::to_display).collect();
        if pairs.len() > max_pairs {
            tracing::warn!(
                case_no = %columns.first().map(String::as_str).unwrap_or_default(),
                invoices = pairs.len(),
                dropped = pairs.len() - max_pairs,
                "Invoice list wider than the report, extra invoices omitted"
            );
        }
        columns.extend(flatten_pairs(max_pairs, &pairs));
        Ok(columns)
    })
}
