//! Remote game service abstraction.
//!
//! The engine talks to the authoritative service through
//! [`RemoteGameService`]: bulk listings and full fetches on the request
//! side, plus long-lived per-game connections delivering six
//! independent event streams on the push side. The wire protocol
//! behind the trait is not this crate's concern; [`MockGameService`]
//! stands in for it in tests and the demo CLI.

mod mock;

pub use mock::MockGameService;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use thiserror::Error;
use tokio::sync::mpsc;

use kifu_types::{
    Clock, GameId, GameNotice, GameSnapshot, GameSummary, MoveEvent, Phase, PlayerId,
    RemovedStonesEvent, UndoRequestEvent,
};

/// Remote service errors.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Network-level failure: unreachable, reset, interrupted.
    #[error("i/o failure: {0}")]
    Io(String),

    /// The request did not complete in time.
    #[error("request timed out")]
    Timeout,

    /// The service refused the request.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The service answered with something unintelligible.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl RemoteError {
    /// Whether this failure is transient: worth retrying unchanged
    /// after a delay. Network failures and timeouts are; rejections
    /// and protocol violations are final.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Timeout)
    }
}

/// The six live event streams of one open game connection.
///
/// Streams are independent: ordering holds within each stream, never
/// across streams. Dropping the receivers is how a connection is
/// released; the service observes the closed channels.
#[derive(Debug)]
pub struct GameConnection {
    /// Full-state snapshots. The service pushes one as the connection
    /// opens and again whenever it deems a resync necessary.
    pub snapshots: mpsc::UnboundedReceiver<GameSnapshot>,
    /// Incremental moves.
    pub moves: mpsc::UnboundedReceiver<MoveEvent>,
    /// Clock updates.
    pub clocks: mpsc::UnboundedReceiver<Clock>,
    /// Phase transitions.
    pub phases: mpsc::UnboundedReceiver<Phase>,
    /// Stone-removal marking updates.
    pub removed_stones: mpsc::UnboundedReceiver<RemovedStonesEvent>,
    /// Undo requests.
    pub undo_requests: mpsc::UnboundedReceiver<UndoRequestEvent>,
}

/// Interface to the authoritative game service.
#[async_trait]
pub trait RemoteGameService: Send + Sync {
    /// The signed-in player this service handle acts for.
    fn user_id(&self) -> PlayerId;

    /// Long-lived stream of lightweight change notices for the
    /// player's games.
    fn connect_to_notifications(&self) -> BoxStream<'static, GameNotice>;

    /// Fetch the complete current state of one game.
    async fn fetch_game(&self, id: GameId) -> Result<GameSnapshot, RemoteError>;

    /// List the player's ongoing games.
    async fn fetch_active_games(&self) -> Result<Vec<GameSummary>, RemoteError>;

    /// List the player's finished games.
    async fn fetch_historic_games(&self) -> Result<Vec<GameSummary>, RemoteError>;

    /// Open a live connection for one game.
    async fn connect_to_game(&self, id: GameId) -> Result<GameConnection, RemoteError>;
}
