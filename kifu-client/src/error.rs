//! Error types and the background error sink.

use std::sync::{Arc, Mutex};

use thiserror::Error;

use kifu_types::GameId;

use crate::remote::RemoteError;
use crate::store::StoreError;

/// Umbrella error for engine operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The remote game service failed.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// The local store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A one-shot read ended without producing the requested game.
    #[error("game {id} not available from the local store")]
    GameNotFound {
        /// The game that was requested.
        id: GameId,
    },
}

impl SyncError {
    /// Whether this failure is worth retrying after a delay.
    ///
    /// Only the transient remote class qualifies; store failures and
    /// remote rejections are final.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Remote(error) if error.is_transient())
    }
}

/// Destination for failures of detached background work.
///
/// Fetches and event applications run on tasks with no caller to hand
/// an error back to; each failure lands here exactly once, tagged with
/// the operation that raised it.
pub trait ErrorSink: Send + Sync {
    /// Record one failure.
    fn report(&self, tag: &'static str, error: &SyncError);
}

/// Default sink: forwards every report to the `tracing` error stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ErrorSink for TracingSink {
    fn report(&self, tag: &'static str, error: &SyncError) {
        tracing::error!(tag, %error, "background operation failed");
    }
}

/// Sink that records reports for later inspection. Intended for tests.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    reports: Arc<Mutex<Vec<(&'static str, String)>>>,
}

impl RecordingSink {
    /// Create an empty recording sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// All reports so far, as (tag, rendered error) pairs.
    pub fn reports(&self) -> Vec<(&'static str, String)> {
        self.reports.lock().unwrap().clone()
    }

    /// Tags of all reports so far.
    pub fn tags(&self) -> Vec<&'static str> {
        self.reports.lock().unwrap().iter().map(|(tag, _)| *tag).collect()
    }
}

impl ErrorSink for RecordingSink {
    fn report(&self, tag: &'static str, error: &SyncError) {
        self.reports.lock().unwrap().push((tag, error.to_string()));
    }
}
