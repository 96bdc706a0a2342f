//! ReportWorkerPool — bounded concurrent execution of report runs.
//!
//! Every submitted request runs as its own task. A semaphore caps how many
//! runs are past resolution at once, which in turn caps data store
//! connections and in-flight uploads.
//!
//! ## Cancellation
//!
//! Each run gets a child of the pool's shutdown token. The run timeout and
//! `ReportRunHandle::cancel` cancel that child; `shutdown` cancels them all.
//! A cancelled run still sends its failure email.

use finance_report_types::ReportRequest;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::{ReportPipeline, ReportRun, RunOutcome};
use crate::clock::Clock;

/// Waiting on a run did not produce an outcome.
#[derive(Debug, thiserror::Error)]
pub enum RunJoinError {
    #[error("report run task failed: {0}")]
    Task(#[from] JoinError),

    #[error("report run did not finish within {0:?} of shutdown")]
    ShutdownTimeout(Duration),
}

/// A submitted run.
pub struct ReportRunHandle {
    run_id: Uuid,
    cancel: CancellationToken,
    handle: JoinHandle<RunOutcome>,
}

impl ReportRunHandle {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Ask the run to stop. It still notifies the requester.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the run's terminal state.
    pub async fn join(self) -> Result<RunOutcome, JoinError> {
        self.handle.await
    }
}

/// Runs report requests on spawned tasks, at most `workers` at a time.
pub struct ReportWorkerPool {
    pipeline: Arc<ReportPipeline>,
    clock: Arc<dyn Clock>,
    permits: Arc<Semaphore>,
    workers: usize,
    run_timeout: Duration,
    shutdown: CancellationToken,
}

impl ReportWorkerPool {
    pub fn new(
        pipeline: Arc<ReportPipeline>,
        clock: Arc<dyn Clock>,
        workers: usize,
        run_timeout: Duration,
    ) -> Self {
        let workers = workers.max(1);
        Self {
            pipeline,
            clock,
            permits: Arc::new(Semaphore::new(workers)),
            workers,
            run_timeout,
            shutdown: CancellationToken::new(),
        }
    }

    /// Runs currently holding a worker slot.
    pub fn active(&self) -> usize {
        self.workers - self.permits.available_permits()
    }

    /// Accept a request. It is stamped with the current time now, not when
    /// a worker slot frees up.
    pub fn submit(&self, request: ReportRequest) -> ReportRunHandle {
        let run = ReportRun::new(request, self.clock.now());
        let run_id = run.run_id;
        let cancel = self.shutdown.child_token();

        let pipeline = self.pipeline.clone();
        let permits = self.permits.clone();
        let run_timeout = self.run_timeout;
        let task_cancel = cancel.clone();

        tracing::debug!(run_id = %run_id, report = %run.request.subtype.key(), "Report run queued");

        let handle = tokio::spawn(async move {
            // Cancelled while queued: skip the wait, the run fails fast.
            let _permit = tokio::select! {
                permit = permits.acquire_owned() => permit.ok(),
                _ = task_cancel.cancelled() => None,
            };

            let run_future = pipeline.run(&run, task_cancel.clone());
            tokio::pin!(run_future);

            tokio::select! {
                outcome = &mut run_future => outcome,
                _ = tokio::time::sleep(run_timeout) => {
                    tracing::warn!(
                        run_id = %run.run_id,
                        timeout_secs = run_timeout.as_secs(),
                        "Report run timed out, cancelling"
                    );
                    task_cancel.cancel();
                    run_future.await
                }
            }
        });

        ReportRunHandle {
            run_id,
            cancel,
            handle,
        }
    }

    /// Wait for `handle`, shutting the pool down if `interrupt` resolves first.
    ///
    /// After an interrupt the run is still awaited for up to `grace`, so its
    /// failure email is sent before the caller exits.
    pub async fn join_or_shutdown<F>(
        &self,
        handle: ReportRunHandle,
        interrupt: F,
        grace: Duration,
    ) -> Result<RunOutcome, RunJoinError>
    where
        F: Future<Output = ()>,
    {
        let run_id = handle.run_id;
        let mut join = handle.handle;

        tokio::select! {
            joined = &mut join => return Ok(joined?),
            _ = interrupt => {
                tracing::warn!(run_id = %run_id, "Interrupted, cancelling report run");
                self.shutdown();
            }
        }

        match tokio::time::timeout(grace, join).await {
            Ok(joined) => Ok(joined?),
            Err(_) => {
                tracing::error!(
                    run_id = %run_id,
                    grace_secs = grace.as_secs(),
                    "Report run did not stop after shutdown"
                );
                Err(RunJoinError::ShutdownTimeout(grace))
            }
        }
    }

    /// Cancel every queued and in-flight run.
    pub fn shutdown(&self) {
        tracing::info!("ReportWorkerPool shutting down");
        self.shutdown.cancel();
    }
}
