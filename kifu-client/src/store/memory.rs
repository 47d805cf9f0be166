//! In-memory store with live queries.
//!
//! Reference implementation of [`GameStore`]: a record map behind a
//! mutex plus a revision counter on a watch channel. Every write bumps
//! the revision; each live query re-reads its projection per bump and
//! yields it. Shipped in the crate (not behind `cfg(test)`) so
//! downstream crates and the demo CLI can run the engine without a
//! database.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::watch;

use kifu_types::{Clock, Game, GameDataUpdate, GameId, Phase, PlayerId, Point};

use super::{GameStore, LiveQuery, StoreError};

/// In-memory [`GameStore`].
///
/// Clones share state, so a test can keep one handle for assertions
/// while the engine owns another.
#[derive(Debug, Clone)]
pub struct MemoryGameStore {
    inner: Arc<Mutex<Inner>>,
    revision: Arc<watch::Sender<u64>>,
}

#[derive(Debug, Default)]
struct Inner {
    games: HashMap<GameId, Game>,
    fail_next_write: Option<String>,
}

impl MemoryGameStore {
    /// Create an empty store.
    pub fn new() -> Self {
        let (revision, _rx) = watch::channel(0);
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            revision: Arc::new(revision),
        }
    }

    /// Current copy of a record, if stored.
    pub fn get(&self, id: GameId) -> Option<Game> {
        self.inner.lock().unwrap().games.get(&id).cloned()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().games.len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make the next write operation fail with the given message.
    pub fn fail_next_write(&self, message: &str) {
        self.inner.lock().unwrap().fail_next_write = Some(message.to_string());
    }

    fn write<T>(
        &self,
        mutate: impl FnOnce(&mut HashMap<GameId, Game>) -> T,
    ) -> Result<T, StoreError> {
        let result = {
            let mut inner = self.inner.lock().unwrap();
            if let Some(message) = inner.fail_next_write.take() {
                return Err(StoreError::WriteFailed(message));
            }
            mutate(&mut inner.games)
        };
        self.revision.send_modify(|revision| *revision += 1);
        Ok(result)
    }

    fn live<T, F>(&self, project: F) -> LiveQuery<T>
    where
        T: Send + 'static,
        F: Fn(&HashMap<GameId, Game>) -> Option<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let mut revision = self.revision.subscribe();
        Box::pin(async_stream::stream! {
            loop {
                // Mark the current revision seen before reading, so a
                // write racing the read still triggers a re-emission.
                revision.borrow_and_update();
                let value = project(&inner.lock().unwrap().games);
                if let Some(value) = value {
                    yield value;
                }
                if revision.changed().await.is_err() {
                    break;
                }
            }
        })
    }

    fn games_of(games: &HashMap<GameId, Game>, player: PlayerId, finished: bool) -> Vec<Game> {
        let mut games: Vec<Game> = games
            .values()
            .filter(|game| game.is_participant(player) && game.phase.is_finished() == finished)
            .cloned()
            .collect();
        games.sort_by_key(|game| game.id);
        games
    }
}

impl Default for MemoryGameStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GameStore for MemoryGameStore {
    async fn insert_all(&self, games: Vec<Game>) -> Result<(), StoreError> {
        self.write(|stored| {
            for game in games {
                stored.insert(game.id, game);
            }
        })
    }

    async fn update_game_data(
        &self,
        id: GameId,
        update: GameDataUpdate,
    ) -> Result<(), StoreError> {
        self.write(|stored| {
            if let Some(game) = stored.get_mut(&id) {
                game.outcome = update.outcome;
                game.phase = update.phase;
                game.player_to_move = Some(update.player_to_move);
                game.initial_state = update.initial_state;
                game.white_goes_first = update.white_goes_first;
                game.moves = update.moves;
                game.removed_stones = update.removed_stones;
                game.white_score = update.white_score;
                game.black_score = update.black_score;
                game.clock = Some(update.clock);
                game.undo_requested = update.undo_requested;
            }
        })
    }

    async fn update_moves(&self, id: GameId, moves: Vec<Point>) -> Result<(), StoreError> {
        self.write(|stored| {
            if let Some(game) = stored.get_mut(&id) {
                game.moves = moves;
            }
        })
    }

    async fn update_clock(
        &self,
        id: GameId,
        player_to_move: PlayerId,
        clock: Clock,
    ) -> Result<(), StoreError> {
        self.write(|stored| {
            if let Some(game) = stored.get_mut(&id) {
                game.player_to_move = Some(player_to_move);
                game.clock = Some(clock);
            }
        })
    }

    async fn update_phase(&self, id: GameId, phase: Phase) -> Result<(), StoreError> {
        self.write(|stored| {
            if let Some(game) = stored.get_mut(&id) {
                game.phase = phase;
            }
        })
    }

    async fn update_removed_stones(&self, id: GameId, stones: String) -> Result<(), StoreError> {
        self.write(|stored| {
            if let Some(game) = stored.get_mut(&id) {
                game.removed_stones = Some(stones);
            }
        })
    }

    async fn update_undo_requested(
        &self,
        id: GameId,
        move_number: u32,
    ) -> Result<(), StoreError> {
        self.write(|stored| {
            if let Some(game) = stored.get_mut(&id) {
                game.undo_requested = Some(move_number);
            }
        })
    }

    fn monitor_active_games(&self, player: PlayerId) -> LiveQuery<Vec<Game>> {
        self.live(move |games| Some(Self::games_of(games, player, false)))
    }

    fn monitor_historic_games(&self, player: PlayerId) -> LiveQuery<Vec<Game>> {
        self.live(move |games| Some(Self::games_of(games, player, true)))
    }

    fn monitor_game(&self, id: GameId) -> LiveQuery<Game> {
        self.live(move |games| games.get(&id).cloned())
    }

    async fn historic_games_not_needing_update(
        &self,
        ids: &[GameId],
    ) -> Result<HashSet<GameId>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(ids
            .iter()
            .copied()
            .filter(|id| {
                inner
                    .games
                    .get(id)
                    .is_some_and(|game| game.phase.is_finished() && game.outcome.is_some())
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{FutureExt, StreamExt};

    fn gid(id: u64) -> GameId {
        GameId::new(id)
    }

    fn pid(id: u64) -> PlayerId {
        PlayerId::new(id)
    }

    fn game(id: u64, black: u64, white: u64) -> Game {
        Game::new(gid(id), pid(black), pid(white))
    }

    fn finished(id: u64, black: u64, white: u64, outcome: Option<&str>) -> Game {
        let mut game = game(id, black, white);
        game.phase = Phase::Finished;
        game.outcome = outcome.map(str::to_string);
        game
    }

    #[tokio::test]
    async fn insert_then_get_roundtrips() {
        let store = MemoryGameStore::new();
        store.insert_all(vec![game(1, 10, 20)]).await.unwrap();
        let stored = store.get(gid(1)).unwrap();
        assert_eq!(stored.black_player, pid(10));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn clones_share_records() {
        let store = MemoryGameStore::new();
        let clone = store.clone();
        store.insert_all(vec![game(1, 10, 20)]).await.unwrap();
        assert!(clone.get(gid(1)).is_some());
    }

    #[tokio::test]
    async fn updates_on_missing_records_are_silent_noops() {
        let store = MemoryGameStore::new();
        store
            .update_moves(gid(9), vec![Point::new(3, 3)])
            .await
            .unwrap();
        store.update_phase(gid(9), Phase::Finished).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn update_game_data_keeps_the_player_ids() {
        let store = MemoryGameStore::new();
        store.insert_all(vec![game(1, 10, 20)]).await.unwrap();

        let snapshot = kifu_types::GameSnapshot::new(
            pid(99),
            pid(98),
            Clock {
                current_player: pid(99),
                white_time_ms: 1,
                black_time_ms: 1,
            },
        );
        store
            .update_game_data(gid(1), GameDataUpdate::from_snapshot(&snapshot))
            .await
            .unwrap();

        let stored = store.get(gid(1)).unwrap();
        assert_eq!(stored.black_player, pid(10));
        assert_eq!(stored.white_player, pid(20));
        assert_eq!(stored.player_to_move, Some(pid(99)));
    }

    #[tokio::test]
    async fn active_query_emits_current_set_then_updates() {
        let store = MemoryGameStore::new();
        store.insert_all(vec![game(1, 10, 20)]).await.unwrap();

        let mut active = store.monitor_active_games(pid(10));
        let first = active.next().await.unwrap();
        assert_eq!(first.len(), 1);

        store.insert_all(vec![game(2, 30, 10)]).await.unwrap();
        let second = active.next().await.unwrap();
        let ids: Vec<u64> = second.iter().map(|g| g.id.value()).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn active_query_excludes_finished_and_foreign_games() {
        let store = MemoryGameStore::new();
        store
            .insert_all(vec![
                game(1, 10, 20),
                finished(2, 10, 30, Some("B+1.5")),
                game(3, 40, 50),
            ])
            .await
            .unwrap();

        let mut active = store.monitor_active_games(pid(10));
        let games = active.next().await.unwrap();
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].id, gid(1));
    }

    #[tokio::test]
    async fn historic_query_sees_only_finished_games() {
        let store = MemoryGameStore::new();
        store
            .insert_all(vec![game(1, 10, 20), finished(2, 10, 30, Some("W+R"))])
            .await
            .unwrap();

        let mut historic = store.monitor_historic_games(pid(10));
        let games = historic.next().await.unwrap();
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].id, gid(2));
    }

    #[tokio::test]
    async fn single_game_query_waits_for_the_record() {
        let store = MemoryGameStore::new();
        let mut stream = store.monitor_game(gid(7));
        assert!(stream.next().now_or_never().is_none());

        store.insert_all(vec![game(7, 10, 20)]).await.unwrap();
        let emitted = stream.next().await.unwrap();
        assert_eq!(emitted.id, gid(7));
    }

    #[tokio::test]
    async fn single_game_query_reemits_after_writes() {
        let store = MemoryGameStore::new();
        store.insert_all(vec![game(7, 10, 20)]).await.unwrap();

        let mut stream = store.monitor_game(gid(7));
        assert!(stream.next().await.unwrap().moves.is_empty());

        store
            .update_moves(gid(7), vec![Point::new(3, 4)])
            .await
            .unwrap();
        let emitted = stream.next().await.unwrap();
        assert_eq!(emitted.moves, vec![Point::new(3, 4)]);
    }

    #[tokio::test]
    async fn forced_failure_hits_once_then_clears() {
        let store = MemoryGameStore::new();
        store.fail_next_write("simulated disk full");

        let error = store.insert_all(vec![game(1, 10, 20)]).await.unwrap_err();
        assert!(matches!(error, StoreError::WriteFailed(_)));
        assert!(store.is_empty());

        store.insert_all(vec![game(1, 10, 20)]).await.unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn fresh_historic_records_are_reported_as_not_needing_update() {
        let store = MemoryGameStore::new();
        store
            .insert_all(vec![
                finished(1, 10, 20, Some("B+0.5")),
                finished(2, 10, 20, None),
                game(3, 10, 20),
            ])
            .await
            .unwrap();

        let ids = [gid(1), gid(2), gid(3), gid(4)];
        let fresh = store.historic_games_not_needing_update(&ids).await.unwrap();
        assert!(fresh.contains(&gid(1)));
        assert!(!fresh.contains(&gid(2)));
        assert!(!fresh.contains(&gid(3)));
        assert!(!fresh.contains(&gid(4)));
    }

    #[tokio::test]
    async fn clock_update_moves_the_turn() {
        let store = MemoryGameStore::new();
        store.insert_all(vec![game(1, 10, 20)]).await.unwrap();

        let clock = Clock {
            current_player: pid(20),
            white_time_ms: 100_000,
            black_time_ms: 90_000,
        };
        store.update_clock(gid(1), pid(20), clock).await.unwrap();

        let stored = store.get(gid(1)).unwrap();
        assert_eq!(stored.player_to_move, Some(pid(20)));
        assert_eq!(stored.clock, Some(clock));
    }
}
