//! Store abstraction the engine writes into.
//!
//! The engine persists nothing itself; it drives an external store
//! through [`GameStore`]. The store is expected to behave like a
//! reactive database layer: writes are row-oriented, and a
//! [`LiveQuery`] emits the current projection on subscription and
//! re-emits after every store change that could affect it.

mod memory;

pub use memory::MemoryGameStore;

use std::collections::HashSet;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use thiserror::Error;

use kifu_types::{Clock, Game, GameDataUpdate, GameId, Phase, PlayerId, Point};

/// A live query stream: the current value first, then one emission per
/// relevant store change. Never completes while the store is alive.
pub type LiveQuery<T> = BoxStream<'static, T>;

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A write could not be persisted.
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// A query could not be served.
    #[error("query failed: {0}")]
    QueryFailed(String),
}

/// Persistence interface the engine drives.
///
/// The `update_*` operations have row-update semantics: updating an id
/// with no stored record changes nothing and is not an error.
#[async_trait]
pub trait GameStore: Send + Sync {
    /// Insert or replace a batch of records wholesale.
    async fn insert_all(&self, games: Vec<Game>) -> Result<(), StoreError>;

    /// Overwrite the snapshot-covered fields of a record. The player
    /// ids are left untouched.
    async fn update_game_data(&self, id: GameId, update: GameDataUpdate)
        -> Result<(), StoreError>;

    /// Replace the move list of a record.
    async fn update_moves(&self, id: GameId, moves: Vec<Point>) -> Result<(), StoreError>;

    /// Update the clock and whose turn it is.
    async fn update_clock(
        &self,
        id: GameId,
        player_to_move: PlayerId,
        clock: Clock,
    ) -> Result<(), StoreError>;

    /// Record a phase transition.
    async fn update_phase(&self, id: GameId, phase: Phase) -> Result<(), StoreError>;

    /// Replace the stone-removal marking set.
    async fn update_removed_stones(&self, id: GameId, stones: String) -> Result<(), StoreError>;

    /// Record an undo request at the given move number.
    async fn update_undo_requested(&self, id: GameId, move_number: u32)
        -> Result<(), StoreError>;

    /// Live query of the games `player` participates in that are still
    /// in progress.
    fn monitor_active_games(&self, player: PlayerId) -> LiveQuery<Vec<Game>>;

    /// Live query of the games `player` participates in that have
    /// finished.
    fn monitor_historic_games(&self, player: PlayerId) -> LiveQuery<Vec<Game>>;

    /// Live query of a single game. Emits only while the record exists;
    /// the first emission waits for it to appear.
    fn monitor_game(&self, id: GameId) -> LiveQuery<Game>;

    /// Of `ids`, the games whose stored record is already a complete
    /// finished game, so a re-fetch would change nothing.
    async fn historic_games_not_needing_update(
        &self,
        ids: &[GameId],
    ) -> Result<HashSet<GameId>, StoreError>;
}
