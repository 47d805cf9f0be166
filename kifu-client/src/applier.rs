//! Serialized application of inbound events to the store.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use kifu_core::{translate_event, StoreWrite};
use kifu_types::{Game, GameEvent, GameId};

use crate::store::{GameStore, StoreError};

/// The connected-game mirror: the engine's private copy of every game
/// it holds a live connection for, keyed by id.
///
/// Seeded on the connect path, refreshed by snapshots, extended by
/// moves. Shared between the connection manager (seeding) and the
/// applier (translation), hence the mutex.
pub type GameMirror = Arc<Mutex<HashMap<GameId, Game>>>;

/// Applies inbound connection events to the store.
///
/// One applier exists per subscription epoch and is driven from a
/// single task, so applications are serialized: each event is
/// translated against the mirror and its store write completes before
/// the next event is looked at.
pub struct EventApplier {
    store: Arc<dyn GameStore>,
    mirror: GameMirror,
}

impl EventApplier {
    /// Create an applier over the given store and mirror.
    pub fn new(store: Arc<dyn GameStore>, mirror: GameMirror) -> Self {
        Self { store, mirror }
    }

    /// Apply one inbound event for `id`.
    ///
    /// Translation may drop the event (a move for a game with no
    /// mirror entry); that is not an error. A store failure fails this
    /// event only, leaving the applier usable for the next one.
    pub async fn apply(&self, id: GameId, event: GameEvent) -> Result<(), StoreError> {
        let write = {
            let mut mirror = self.mirror.lock().await;
            translate_event(&mut mirror, id, event)
        };
        let Some(write) = write else {
            tracing::debug!(game = %id, "dropped move event for game with no mirror entry");
            return Ok(());
        };
        self.execute(write).await
    }

    async fn execute(&self, write: StoreWrite) -> Result<(), StoreError> {
        match write {
            StoreWrite::GameData { id, update } => self.store.update_game_data(id, update).await,
            StoreWrite::Moves { id, moves } => self.store.update_moves(id, moves).await,
            StoreWrite::Clock { id, player_to_move, clock } => {
                self.store.update_clock(id, player_to_move, clock).await
            }
            StoreWrite::Phase { id, phase } => self.store.update_phase(id, phase).await,
            StoreWrite::RemovedStones { id, stones } => {
                self.store.update_removed_stones(id, stones).await
            }
            StoreWrite::UndoRequested { id, move_number } => {
                self.store.update_undo_requested(id, move_number).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryGameStore;
    use kifu_types::{Clock, MoveEvent, Phase, PlayerId, Point};

    fn gid(id: u64) -> GameId {
        GameId::new(id)
    }

    fn pid(id: u64) -> PlayerId {
        PlayerId::new(id)
    }

    async fn applier_with_game(id: u64) -> (MemoryGameStore, GameMirror, EventApplier) {
        let store = MemoryGameStore::new();
        let game = Game::new(gid(id), pid(10), pid(20));
        store.insert_all(vec![game.clone()]).await.unwrap();

        let mirror: GameMirror = Arc::new(Mutex::new(HashMap::new()));
        mirror.lock().await.insert(gid(id), game);

        let applier = EventApplier::new(Arc::new(store.clone()), Arc::clone(&mirror));
        (store, mirror, applier)
    }

    #[tokio::test]
    async fn move_event_lands_in_the_store() {
        let (store, _mirror, applier) = applier_with_game(1).await;
        applier
            .apply(gid(1), GameEvent::Move(MoveEvent { point: Point::new(3, 4) }))
            .await
            .unwrap();
        assert_eq!(store.get(gid(1)).unwrap().moves, vec![Point::new(3, 4)]);
    }

    #[tokio::test]
    async fn unmirrored_move_is_dropped_without_error() {
        let (store, _mirror, applier) = applier_with_game(1).await;
        applier
            .apply(gid(99), GameEvent::Move(MoveEvent { point: Point::new(0, 0) }))
            .await
            .unwrap();
        assert!(store.get(gid(99)).is_none());
        assert!(store.get(gid(1)).unwrap().moves.is_empty());
    }

    #[tokio::test]
    async fn clock_event_updates_turn_and_clock() {
        let (store, _mirror, applier) = applier_with_game(1).await;
        let clock = Clock {
            current_player: pid(20),
            white_time_ms: 250_000,
            black_time_ms: 240_000,
        };
        applier.apply(gid(1), GameEvent::Clock(clock)).await.unwrap();

        let stored = store.get(gid(1)).unwrap();
        assert_eq!(stored.player_to_move, Some(pid(20)));
        assert_eq!(stored.clock, Some(clock));
    }

    #[tokio::test]
    async fn store_failure_fails_only_that_event() {
        let (store, _mirror, applier) = applier_with_game(1).await;

        store.fail_next_write("simulated failure");
        let error = applier
            .apply(gid(1), GameEvent::Phase(Phase::Finished))
            .await
            .unwrap_err();
        assert!(matches!(error, StoreError::WriteFailed(_)));

        applier
            .apply(gid(1), GameEvent::Phase(Phase::Finished))
            .await
            .unwrap();
        assert_eq!(store.get(gid(1)).unwrap().phase, Phase::Finished);
    }
}
