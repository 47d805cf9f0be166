//! Cancellation scope for one subscription epoch.
//!
//! A `CancelScope` is created per epoch and cloned into every task
//! spawned under it: connection pumps, the event applier, the
//! notification and active-set loops, and detached fetches. Cancelling
//! the scope is the single teardown signal. Work racing against the
//! scope is dropped wherever it was suspended, so nothing completed
//! after cancellation can mutate engine state.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

/// Cloneable cancellation flag shared by all work of one epoch.
///
/// Cancellation is one-way: once cancelled, a scope stays cancelled.
#[derive(Debug, Clone)]
pub struct CancelScope {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelScope {
    /// Create a scope that has not been cancelled.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Cancel the scope, waking every waiter. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Whether the scope has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once the scope is cancelled; immediately if it already is.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Run `fut` to completion unless the scope is cancelled first.
    ///
    /// Returns `None` on cancellation; `fut` is dropped wherever it was
    /// suspended. Cancellation wins when both are ready, so work that
    /// becomes ready in the same instant as the cancel signal is still
    /// discarded.
    pub async fn run_until_cancelled<F>(&self, fut: F) -> Option<F::Output>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            _ = self.cancelled() => None,
            output = fut => Some(output),
        }
    }
}

impl Default for CancelScope {
    fn default() -> Self {
        Self::new()
    }
}
