//! Per-chunk worker pool.
//!
//! A feeder task pushes the chunk's URLs into a bounded queue; `worker_count`
//! workers pull from it one URL at a time and send one [`TaskOutcome`] per URL
//! to the collector. Resolver errors and panics become [`DroppedReason`]s and
//! never take a worker down.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tracing::{Instrument, Span, debug, warn};

use super::DroppedReason;
use crate::resolver::{Resolve, ResolutionResult};

/// Result of one work item.
#[derive(Debug)]
pub(crate) struct TaskOutcome {
    pub(crate) url: String,
    pub(crate) result: Result<ResolutionResult, DroppedReason>,
}

/// Workers running over one chunk.
pub(crate) struct WorkerPool {
    outcomes: mpsc::Receiver<TaskOutcome>,
    tasks: JoinSet<()>,
}

impl WorkerPool {
    /// Starts the feeder and `worker_count` workers (never more than there are URLs).
    pub(crate) fn spawn(
        chunk: Vec<String>,
        worker_count: usize,
        resolver: Arc<dyn Resolve>,
        span: &Span,
    ) -> Self {
        let worker_count = worker_count.clamp(1, chunk.len().max(1));
        let (work_tx, work_rx) = mpsc::channel::<String>(worker_count);
        let (outcome_tx, outcomes) = mpsc::channel::<TaskOutcome>(worker_count);
        let queue = Arc::new(Mutex::new(work_rx));
        let mut tasks = JoinSet::new();

        tasks.spawn(
            async move {
                for url in chunk {
                    if work_tx.send(url).await.is_err() {
                        warn!("work queue closed before the chunk was fully queued");
                        break;
                    }
                }
            }
            .instrument(span.clone()),
        );

        for worker_id in 0..worker_count {
            let queue = Arc::clone(&queue);
            let outcome_tx = outcome_tx.clone();
            let resolver = Arc::clone(&resolver);
            tasks.spawn(
                worker_loop(worker_id, queue, outcome_tx, resolver).instrument(span.clone()),
            );
        }

        Self { outcomes, tasks }
    }

    /// Next finished item, or `None` once every worker has exited.
    pub(crate) async fn next_outcome(&mut self) -> Option<TaskOutcome> {
        self.outcomes.recv().await
    }

    /// Waits for all tasks; task failures are logged, not propagated.
    pub(crate) async fn join(mut self) {
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(error) = joined {
                warn!(error = %error, "worker task ended abnormally");
            }
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    queue: Arc<Mutex<mpsc::Receiver<String>>>,
    outcomes: mpsc::Sender<TaskOutcome>,
    resolver: Arc<dyn Resolve>,
) {
    loop {
        let next = queue.lock().await.recv().await;
        let Some(url) = next else {
            break;
        };

        let result = match AssertUnwindSafe(resolver.resolve(&url)).catch_unwind().await {
            Ok(Ok(record)) => Ok(record),
            Ok(Err(error)) => Err(DroppedReason::Failed(error)),
            Err(panic) => Err(DroppedReason::Panicked(panic_message(panic.as_ref()))),
        };

        if outcomes.send(TaskOutcome { url, result }).await.is_err() {
            warn!(worker_id, "collector gone; worker stopping");
            break;
        }
    }
    debug!(worker_id, "worker finished");
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
