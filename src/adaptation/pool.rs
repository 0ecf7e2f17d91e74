use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Fixed-size worker pool fed from a bounded FIFO.
///
/// Each worker runs one item to completion before pulling the next, so an
/// item's internal retries are never interleaved with another item's.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    concurrency: usize,
    cancel: CancellationToken,
}

impl WorkerPool {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Cancelling stops workers from pulling new items. Items already in
    /// flight finish.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Results come back in input order, one outcome per item.
    pub async fn run<T, R, F, Fut>(&self, items: Vec<T>, work: F) -> Vec<PoolOutcome<R>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let total = items.len();
        let mut results: Vec<PoolOutcome<R>> =
            (0..total).map(|_| PoolOutcome::NotStarted).collect();
        if total == 0 {
            return results;
        }

        let workers = self.concurrency.min(total);
        let (tx, rx) = mpsc::channel::<(usize, T)>(workers);
        let rx = Arc::new(Mutex::new(rx));
        let (done_tx, mut done_rx) = mpsc::channel::<(usize, PoolOutcome<R>)>(total);
        let work = Arc::new(work);

        let feeder_cancel = self.cancel.clone();
        let feeder = tokio::spawn(async move {
            for (index, item) in items.into_iter().enumerate() {
                tokio::select! {
                    _ = feeder_cancel.cancelled() => break,
                    sent = tx.send((index, item)) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        let mut set = JoinSet::new();
        for worker_id in 0..workers {
            let rx = Arc::clone(&rx);
            let work = Arc::clone(&work);
            let cancel = self.cancel.clone();
            let done_tx = done_tx.clone();
            set.spawn(async move {
                loop {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let next = rx.lock().await.recv().await;
                    let Some((index, item)) = next else {
                        break;
                    };
                    debug!("Worker {} took item {}", worker_id, index);
                    // A panicking item must not take the worker down with it.
                    let outcome = match tokio::spawn(work(item)).await {
                        Ok(result) => PoolOutcome::Completed(result),
                        Err(e) => {
                            error!("Item {} panicked on worker {}: {}", index, worker_id, e);
                            PoolOutcome::Panicked
                        }
                    };
                    if done_tx.send((index, outcome)).await.is_err() {
                        break;
                    }
                }
            });
        }
        drop(done_tx);

        while let Some((index, outcome)) = done_rx.recv().await {
            if let Some(slot) = results.get_mut(index) {
                *slot = outcome;
            }
        }
        while let Some(joined) = set.join_next().await {
            if let Err(e) = joined {
                error!("Adaptation worker failed: {}", e);
            }
        }

        // Feeder may still be blocked on a queue no worker drains.
        feeder.abort();
        results
    }
}

/// What happened to one pool item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolOutcome<R> {
    Completed(R),
    /// Cancelled before a worker picked it up.
    NotStarted,
    Panicked,
}

impl<R> PoolOutcome<R> {
    pub fn completed(self) -> Option<R> {
        match self {
            PoolOutcome::Completed(result) => Some(result),
            _ => None,
        }
    }

    /// Why no result exists, for fallback records.
    pub fn failure_reason(&self) -> Option<&'static str> {
        match self {
            PoolOutcome::Completed(_) => None,
            PoolOutcome::NotStarted => Some("not processed: adaptation was cancelled"),
            PoolOutcome::Panicked => Some("not processed: adaptation worker panicked"),
        }
    }
}
