//! Worker pool integration tests: concurrency bound, run timeout, shutdown.

mod helpers;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use finance_reports::notify::TemplateId;
use finance_reports::pipeline::{ReportWorkerPool, RunJoinError, RunStage, TerminalState};
use finance_reports::types::{AccountsReceivableType, ReportRequest};
use finance_reports::{Clock, FixedClock};

use helpers::*;

fn clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock::new(requested_at(), go_live()))
}

fn request() -> ReportRequest {
    ReportRequest::new(AccountsReceivableType::AgedDebtByCustomer, "finance@example.com")
}

#[tokio::test]
async fn test_concurrency_is_bounded_by_workers() {
    let storage = Arc::new(TrackingStorage::default());
    let notify = Arc::new(RecordingNotify::default());
    let pipeline = Arc::new(pipeline(
        Arc::new(VecDataStore::new(vec![])),
        storage.clone(),
        notify.clone(),
    ));
    let pool = ReportWorkerPool::new(pipeline, clock(), 2, Duration::from_secs(30));

    let handles: Vec<_> = (0..6).map(|_| pool.submit(request())).collect();
    for handle in handles {
        let outcome = handle.join().await.unwrap();
        assert_eq!(outcome.terminal, TerminalState::NotifiedSuccess);
    }

    assert_eq!(storage.completed.load(Ordering::SeqCst), 6);
    assert!(storage.max_active.load(Ordering::SeqCst) <= 2);
    assert_eq!(notify.payloads().len(), 6);
    assert_eq!(pool.active(), 0);
}

#[tokio::test]
async fn test_run_timeout_cancels_and_notifies_failure() {
    let notify = Arc::new(RecordingNotify::default());
    let pipeline = Arc::new(pipeline(
        Arc::new(VecDataStore::new(vec![])),
        Arc::new(HangingStorage),
        notify.clone(),
    ));
    let pool = ReportWorkerPool::new(pipeline, clock(), 1, Duration::from_millis(50));

    let outcome = pool.submit(request()).join().await.unwrap();

    assert_eq!(outcome.terminal, TerminalState::NotifiedFailure);
    assert_eq!(outcome.failed_stage, Some(RunStage::Uploading));
    let sent = notify.payloads();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].template, TemplateId::ReportFailed);
}

#[tokio::test]
async fn test_handle_cancel_stops_run() {
    let notify = Arc::new(RecordingNotify::default());
    let pipeline = Arc::new(pipeline(
        Arc::new(VecDataStore::new(vec![])),
        Arc::new(HangingStorage),
        notify.clone(),
    ));
    let pool = ReportWorkerPool::new(pipeline, clock(), 1, Duration::from_secs(30));

    let handle = pool.submit(request());
    tokio::time::sleep(Duration::from_millis(20)).await;
    handle.cancel();

    let outcome = handle.join().await.unwrap();
    assert_eq!(outcome.terminal, TerminalState::NotifiedFailure);
    assert_eq!(notify.payloads().len(), 1);
}

#[tokio::test]
async fn test_shutdown_fails_queued_and_running_runs() {
    let notify = Arc::new(RecordingNotify::default());
    let pipeline = Arc::new(pipeline(
        Arc::new(VecDataStore::new(vec![])),
        Arc::new(HangingStorage),
        notify.clone(),
    ));
    let pool = ReportWorkerPool::new(pipeline, clock(), 1, Duration::from_secs(30));

    let running = pool.submit(request());
    let queued = pool.submit(request());
    tokio::time::sleep(Duration::from_millis(20)).await;
    pool.shutdown();

    for handle in [running, queued] {
        let outcome = handle.join().await.unwrap();
        assert_eq!(outcome.terminal, TerminalState::NotifiedFailure);
    }
    assert_eq!(notify.payloads().len(), 2);
}

#[tokio::test]
async fn test_interrupt_waits_for_failure_email() {
    let notify = Arc::new(RecordingNotify::slow(Duration::from_millis(50)));
    let pipeline = Arc::new(pipeline(
        Arc::new(VecDataStore::new(vec![])),
        Arc::new(HangingStorage),
        notify.clone(),
    ));
    let pool = ReportWorkerPool::new(pipeline, clock(), 1, Duration::from_secs(30));

    let handle = pool.submit(request());
    let interrupt = tokio::time::sleep(Duration::from_millis(20));
    let outcome = pool
        .join_or_shutdown(handle, interrupt, Duration::from_secs(5))
        .await
        .unwrap();

    // The email went out before join_or_shutdown returned.
    assert_eq!(outcome.terminal, TerminalState::NotifiedFailure);
    let sent = notify.payloads();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].template, TemplateId::ReportFailed);
}

#[tokio::test]
async fn test_join_without_interrupt_returns_outcome() {
    let notify = Arc::new(RecordingNotify::default());
    let pipeline = Arc::new(pipeline(
        Arc::new(VecDataStore::new(vec![])),
        Arc::new(finance_reports::storage::InMemoryReportStorage::new()),
        notify.clone(),
    ));
    let pool = ReportWorkerPool::new(pipeline, clock(), 1, Duration::from_secs(30));

    let outcome = pool
        .join_or_shutdown(
            pool.submit(request()),
            std::future::pending::<()>(),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
    assert_eq!(outcome.terminal, TerminalState::NotifiedSuccess);
}

#[tokio::test]
async fn test_interrupt_grace_is_bounded() {
    let notify = Arc::new(RecordingNotify::slow(Duration::from_secs(10)));
    let pipeline = Arc::new(pipeline(
        Arc::new(VecDataStore::new(vec![])),
        Arc::new(HangingStorage),
        notify,
    ));
    let pool = ReportWorkerPool::new(pipeline, clock(), 1, Duration::from_secs(30));

    let result = pool
        .join_or_shutdown(
            pool.submit(request()),
            tokio::time::sleep(Duration::from_millis(10)),
            Duration::from_millis(50),
        )
        .await;
    assert!(matches!(result, Err(RunJoinError::ShutdownTimeout(_))));
}
