//! Streaming execution engine
//!
//! Runs a `QueryDefinition` against a `ReportDataStore` and produces the CSV
//! as a stream of byte chunks. The header row is always written first. Rows
//! are encoded as they arrive from the data store cursor and handed on in
//! chunks of roughly `chunk_size` bytes through a bounded channel, so the
//! consumer (the uploader) applies backpressure to the query.
//!
//! Any data store or row decode failure is sent as the final stream item and
//! ends the stream; consumers must treat an `Err` item as fatal for the run.

use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::error::{ReportError, Result};
use crate::query::{BindValue, QueryDefinition, RawRow, RawValue};

/// Rows from a data store cursor.
pub type RowStream = BoxStream<'static, Result<RawRow>>;

/// CSV bytes on their way to storage.
pub type ReportStream = BoxStream<'static, Result<Bytes>>;

/// A relational store that can stream query results through a server-side
/// cursor.
///
/// Dropping the returned stream must release the cursor and its connection.
pub trait ReportDataStore: Send + Sync {
    fn stream_rows(&self, sql: &'static str, params: Vec<BindValue>) -> RowStream;
}

/// Engine tuning.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Chunks buffered ahead of the consumer.
    pub buffer_chunks: usize,
    /// Bytes of CSV accumulated before a chunk is emitted.
    pub chunk_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            buffer_chunks: 8,
            chunk_size: 64 * 1024,
        }
    }
}

/// Streams query results as CSV.
#[derive(Clone)]
pub struct ReportEngine {
    store: Arc<dyn ReportDataStore>,
    config: EngineConfig,
}

impl ReportEngine {
    pub fn new(store: Arc<dyn ReportDataStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// Start executing `def`. Production runs on a spawned task; the returned
    /// stream yields CSV chunks as they are encoded.
    ///
    /// Cancelling `cancel` stops the producer, drops the cursor and ends the
    /// stream with `ReportError::Cancelled`.
    pub fn execute(&self, def: QueryDefinition, cancel: CancellationToken) -> ReportStream {
        let (tx, rx) = mpsc::channel(self.config.buffer_chunks.max(1));
        let rows = self.store.stream_rows(def.sql(), def.params().to_vec());
        let chunk_size = self.config.chunk_size.max(1);

        tokio::spawn(async move {
            match write_csv(&def, rows, &tx, &cancel, chunk_size).await {
                Ok(rows) => {
                    tracing::debug!(rows, "Report query streamed");
                }
                Err(Produce::ConsumerGone) => {
                    tracing::debug!("Report stream consumer dropped, stopping query");
                }
                Err(Produce::Failed(e)) => {
                    tracing::debug!(error = %e, "Report query aborted");
                    let _ = tx.send(Err(e)).await;
                }
            }
        });

        ReceiverStream::new(rx).boxed()
    }
}

enum Produce {
    /// The receiving side hung up; nobody is left to tell.
    ConsumerGone,
    Failed(ReportError),
}

impl From<ReportError> for Produce {
    fn from(e: ReportError) -> Self {
        Produce::Failed(e)
    }
}

impl From<csv::Error> for Produce {
    fn from(e: csv::Error) -> Self {
        Produce::Failed(e.into())
    }
}

fn csv_writer(chunk_size: usize) -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::with_capacity(chunk_size))
}

/// Hand the buffered CSV to the consumer and start a fresh buffer.
async fn emit_chunk(
    writer: csv::Writer<Vec<u8>>,
    tx: &mpsc::Sender<Result<Bytes>>,
    chunk_size: usize,
) -> std::result::Result<csv::Writer<Vec<u8>>, Produce> {
    let buffer = writer.into_inner().map_err(|e| {
        let io = std::io::Error::new(e.error().kind(), e.error().to_string());
        Produce::Failed(csv::Error::from(io).into())
    })?;

    if !buffer.is_empty() && tx.send(Ok(Bytes::from(buffer))).await.is_err() {
        return Err(Produce::ConsumerGone);
    }
    Ok(csv_writer(chunk_size))
}

/// Encode rows until the cursor is exhausted. Returns the data row count.
async fn write_csv(
    def: &QueryDefinition,
    mut rows: RowStream,
    tx: &mpsc::Sender<Result<Bytes>>,
    cancel: &CancellationToken,
    chunk_size: usize,
) -> std::result::Result<u64, Produce> {
    let width = def.headers().len();
    let mut writer = csv_writer(chunk_size);
    writer.write_record(def.headers())?;

    let mut row_number: u64 = 0;
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => return Err(ReportError::Cancelled.into()),
            _ = tx.closed() => return Err(Produce::ConsumerGone),
            next = rows.next() => next,
        };

        let Some(raw) = next else { break };
        let raw = raw?;
        row_number += 1;

        let record = match def.row_transform() {
            Some(transform) => transform
                .apply(&raw)
                .map_err(|reason| ReportError::RowDecode {
                    row: row_number,
                    reason,
                })?,
            None => raw.iter().map(RawValue::to_display).collect(),
        };

        if record.len() != width {
            return Err(ReportError::RowDecode {
                row: row_number,
                reason: format!("expected {} columns, got {}", width, record.len()),
            }
            .into());
        }

        writer.write_record(&record)?;
        writer.flush().map_err(csv::Error::from)?;
        if writer.get_ref().len() >= chunk_size {
            writer = emit_chunk(writer, tx, chunk_size).await?;
        }
    }

    emit_chunk(writer, tx, chunk_size).await?;
    Ok(row_number)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::query::wide_row::wide_row_transform;
    use futures::stream;
    use std::sync::Mutex;

    /// Data store serving canned rows, recording the last query it was asked for.
    pub(crate) struct StaticDataStore {
        rows: Vec<Result<RawRow>>,
        pub(crate) last_params: Mutex<Option<Vec<BindValue>>>,
    }

    impl StaticDataStore {
        pub(crate) fn new(rows: Vec<RawRow>) -> Self {
            Self {
                rows: rows.into_iter().map(Ok).collect(),
                last_params: Mutex::new(None),
            }
        }

        pub(crate) fn failing_after(rows: Vec<RawRow>, message: &str) -> Self {
            let mut items: Vec<Result<RawRow>> = rows.into_iter().map(Ok).collect();
            items.push(Err(ReportError::query(message.to_string())));
            Self {
                rows: items,
                last_params: Mutex::new(None),
            }
        }
    }

    impl ReportDataStore for StaticDataStore {
        fn stream_rows(&self, _sql: &'static str, params: Vec<BindValue>) -> RowStream {
            *self.last_params.lock().unwrap() = Some(params);
            let items: Vec<Result<RawRow>> = self
                .rows
                .iter()
                .map(|r| match r {
                    Ok(row) => Ok(row.clone()),
                    Err(e) => Err(ReportError::query(e.to_string())),
                })
                .collect();
            stream::iter(items).boxed()
        }
    }

    /// Data store that never yields a row.
    struct PendingDataStore;

    impl ReportDataStore for PendingDataStore {
        fn stream_rows(&self, _sql: &'static str, _params: Vec<BindValue>) -> RowStream {
            stream::pending().boxed()
        }
    }

    async fn collect(stream: ReportStream) -> (String, Option<ReportError>) {
        let items: Vec<Result<Bytes>> = stream.collect().await;
        let mut out = Vec::new();
        let mut error = None;
        for item in items {
            match item {
                Ok(bytes) => out.extend_from_slice(&bytes),
                Err(e) => error = Some(e),
            }
        }
        (String::from_utf8(out).unwrap(), error)
    }

    fn engine(store: impl ReportDataStore + 'static, chunk_size: usize) -> ReportEngine {
        ReportEngine::new(
            Arc::new(store),
            EngineConfig {
                buffer_chunks: 2,
                chunk_size,
            },
        )
    }

    fn text_row(values: &[&str]) -> RawRow {
        values.iter().map(|v| RawValue::from(*v)).collect()
    }

    #[tokio::test]
    async fn test_zero_rows_is_header_only() {
        let def = QueryDefinition::new(["Court reference", "Amount"], "SELECT", vec![]);
        let stream = engine(StaticDataStore::new(vec![]), 1024).execute(def, CancellationToken::new());

        let (csv, error) = collect(stream).await;
        assert!(error.is_none());
        assert_eq!(csv, "Court reference,Amount\n");
    }

    #[tokio::test]
    async fn test_row_count_is_header_plus_data() {
        let rows = vec![
            text_row(&["10000001", "£10.00"]),
            text_row(&["10000002", "£20.00"]),
            vec![RawValue::Int(10000003), RawValue::Null],
        ];
        let def = QueryDefinition::new(["Court reference", "Amount"], "SELECT", vec![]);
        let stream = engine(StaticDataStore::new(rows), 1024).execute(def, CancellationToken::new());

        let (csv, error) = collect(stream).await;
        assert!(error.is_none());
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1], "10000001,£10.00");
        assert_eq!(lines[3], "10000003,");
    }

    #[tokio::test]
    async fn test_small_chunk_size_splits_output() {
        let rows: Vec<RawRow> = (0..50)
            .map(|i| text_row(&[&format!("ref-{}", i), "1.00"]))
            .collect();
        let def = QueryDefinition::new(["Ref", "Amount"], "SELECT", vec![]);
        let stream = engine(StaticDataStore::new(rows), 16).execute(def, CancellationToken::new());

        let chunks: Vec<Result<Bytes>> = stream.collect().await;
        assert!(chunks.len() > 1);
        let total: String = chunks
            .into_iter()
            .map(|c| String::from_utf8(c.unwrap().to_vec()).unwrap())
            .collect();
        assert_eq!(total.lines().count(), 51);
    }

    #[tokio::test]
    async fn test_values_needing_quotes() {
        let rows = vec![text_row(&["Smith, John", "He said \"hi\""])];
        let def = QueryDefinition::new(["Name", "Note"], "SELECT", vec![]);
        let stream = engine(StaticDataStore::new(rows), 1024).execute(def, CancellationToken::new());

        let (csv, _) = collect(stream).await;
        assert_eq!(csv, "Name,Note\n\"Smith, John\",\"He said \"\"hi\"\"\"\n");
    }

    #[tokio::test]
    async fn test_wide_row_transform_applied() {
        let rows = vec![vec![
            RawValue::from("12345678"),
            RawValue::Json(serde_json::json!([{"reference": "AD1/24", "debt": "£100.00"}])),
        ]];
        let def = QueryDefinition::new(["Case_no", "Invoice1", "Amount1", "Invoice2", "Amount2"], "SELECT", vec![])
            .with_row_transform(wide_row_transform(1, 2));
        let stream = engine(StaticDataStore::new(rows), 1024).execute(def, CancellationToken::new());

        let (csv, error) = collect(stream).await;
        assert!(error.is_none());
        assert_eq!(csv.lines().nth(1), Some("12345678,AD1/24,£100.00,,"));
    }

    #[tokio::test]
    async fn test_malformed_row_aborts_stream() {
        let rows = vec![
            vec![RawValue::from("1"), RawValue::Null],
            vec![RawValue::from("2"), RawValue::from("not json")],
            vec![RawValue::from("3"), RawValue::Null],
        ];
        let def = QueryDefinition::new(["Case_no", "Invoice1", "Amount1"], "SELECT", vec![])
            .with_row_transform(wide_row_transform(1, 1));
        let stream = engine(StaticDataStore::new(rows), 1024).execute(def, CancellationToken::new());

        let (_, error) = collect(stream).await;
        assert!(matches!(error, Some(ReportError::RowDecode { row: 2, .. })));
    }

    #[tokio::test]
    async fn test_width_mismatch_is_row_decode_error() {
        let rows = vec![text_row(&["only one"])];
        let def = QueryDefinition::new(["A", "B"], "SELECT", vec![]);
        let stream = engine(StaticDataStore::new(rows), 1024).execute(def, CancellationToken::new());

        let (_, error) = collect(stream).await;
        assert!(matches!(error, Some(ReportError::RowDecode { row: 1, .. })));
    }

    #[tokio::test]
    async fn test_query_failure_ends_stream_with_error() {
        let store = StaticDataStore::failing_after(vec![text_row(&["a"])], "connection reset");
        let def = QueryDefinition::new(["A"], "SELECT", vec![]);
        let stream = engine(store, 1024).execute(def, CancellationToken::new());

        let (_, error) = collect(stream).await;
        match error {
            Some(ReportError::QueryExecution(e)) => assert!(e.to_string().contains("connection reset")),
            other => panic!("expected query error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancel_stops_pending_query() {
        let cancel = CancellationToken::new();
        let def = QueryDefinition::new(["A"], "SELECT", vec![]);
        let stream = engine(PendingDataStore, 1024).execute(def, cancel.clone());

        cancel.cancel();
        let (_, error) = collect(stream).await;
        assert!(matches!(error, Some(ReportError::Cancelled)));
    }

    #[tokio::test]
    async fn test_params_passed_to_store() {
        let store = Arc::new(StaticDataStore::new(vec![]));
        let engine = ReportEngine::new(store.clone(), EngineConfig::default());
        let def = QueryDefinition::new(["A"], "SELECT", vec![BindValue::Int(7)]);

        let _ = collect(engine.execute(def, CancellationToken::new())).await;
        assert_eq!(
            store.last_params.lock().unwrap().clone(),
            Some(vec![BindValue::Int(7)])
        );
    }
}
