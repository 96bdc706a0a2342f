//! Postgres report data store.

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use futures::StreamExt;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Column, PgPool, Postgres, Row, TypeInfo};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::engine::{ReportDataStore, RowStream};
use crate::error::{ReportError, Result};
use crate::query::{format_params, BindValue, RawRow, RawValue};

/// Rows fetched ahead of the engine.
const ROW_BUFFER: usize = 256;

/// Streams report rows from Postgres.
///
/// Each query runs on its own task holding one pooled connection for the
/// lifetime of the cursor. The connection goes back to the pool as soon as
/// the cursor is exhausted, fails, or the consumer drops the row stream.
#[derive(Clone)]
pub struct PgReportDataStore {
    pool: PgPool,
}

impl PgReportDataStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl ReportDataStore for PgReportDataStore {
    fn stream_rows(&self, sql: &'static str, params: Vec<BindValue>) -> RowStream {
        let (tx, rx) = mpsc::channel(ROW_BUFFER);
        let pool = self.pool.clone();

        tokio::spawn(async move {
            tracing::debug!(params = %format_params(&params), "Opening report cursor");

            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_value(query, param);
            }
            let mut rows = query.fetch(&pool);

            loop {
                let next = tokio::select! {
                    _ = tx.closed() => {
                        tracing::debug!("Row consumer dropped, closing cursor");
                        return;
                    }
                    next = rows.next() => next,
                };

                let item = match next {
                    Some(Ok(row)) => decode_row(&row),
                    Some(Err(e)) => Err(ReportError::query(e)),
                    None => return,
                };

                let failed = item.is_err();
                if tx.send(item).await.is_err() || failed {
                    return;
                }
            }
        });

        ReceiverStream::new(rx).boxed()
    }
}

/// Bind a typed parameter to a query
fn bind_value(
    query: Query<'static, Postgres, PgArguments>,
    value: BindValue,
) -> Query<'static, Postgres, PgArguments> {
    match value {
        BindValue::Text(s) => query.bind(s),
        BindValue::Int(i) => query.bind(i),
        BindValue::Bool(b) => query.bind(b),
        BindValue::Date(d) => query.bind(d),
        BindValue::Timestamp(t) => query.bind(t),
        BindValue::TextArray(arr) => query.bind(arr),
    }
}

/// Convert a Postgres row into raw values by column type
fn decode_row(row: &PgRow) -> Result<RawRow> {
    let mut values = Vec::with_capacity(row.len());

    for (index, column) in row.columns().iter().enumerate() {
        let type_name = column.type_info().name();

        let value = match type_name {
            "TEXT" | "VARCHAR" | "BPCHAR" | "CHAR" | "NAME" => row
                .try_get::<Option<String>, _>(index)
                .map(|v| v.map(RawValue::Text)),
            "INT2" => row
                .try_get::<Option<i16>, _>(index)
                .map(|v| v.map(|i| RawValue::Int(i.into()))),
            "INT4" => row
                .try_get::<Option<i32>, _>(index)
                .map(|v| v.map(|i| RawValue::Int(i.into()))),
            "INT8" => row
                .try_get::<Option<i64>, _>(index)
                .map(|v| v.map(RawValue::Int)),
            "FLOAT4" => row
                .try_get::<Option<f32>, _>(index)
                .map(|v| v.map(|f| RawValue::Float(f.into()))),
            "FLOAT8" => row
                .try_get::<Option<f64>, _>(index)
                .map(|v| v.map(RawValue::Float)),
            "NUMERIC" => row
                .try_get::<Option<BigDecimal>, _>(index)
                .map(|v| v.map(|d| RawValue::Numeric(d.to_string()))),
            "BOOL" => row
                .try_get::<Option<bool>, _>(index)
                .map(|v| v.map(RawValue::Bool)),
            "DATE" => row
                .try_get::<Option<NaiveDate>, _>(index)
                .map(|v| v.map(RawValue::Date)),
            "TIMESTAMP" => row
                .try_get::<Option<NaiveDateTime>, _>(index)
                .map(|v| v.map(RawValue::Timestamp)),
            "TIMESTAMPTZ" => row
                .try_get::<Option<DateTime<Utc>>, _>(index)
                .map(|v| v.map(RawValue::TimestampTz)),
            "JSON" | "JSONB" => row
                .try_get::<Option<JsonValue>, _>(index)
                .map(|v| v.map(RawValue::Json)),
            other => {
                return Err(ReportError::query(format!(
                    "unsupported column type {} for column {}",
                    other,
                    column.name()
                )))
            }
        };

        values.push(value.map_err(ReportError::query)?.unwrap_or(RawValue::Null));
    }

    Ok(values)
}
