//! Active-set tracking and the my-turn count signal.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use kifu_core::{is_players_turn, my_move_count};
use kifu_types::{Game, GameId, PlayerId};

use crate::error::ErrorSink;
use crate::manager::ConnectionManager;

/// Broadcast cell for the number of games waiting on the local player.
///
/// Replays the latest value to every new subscriber and suppresses
/// consecutive duplicates at publish time, so subscribers wake only for
/// real changes. Holds 0 until the first active-set emission.
#[derive(Debug, Clone)]
pub struct MoveCountSignal {
    tx: Arc<watch::Sender<usize>>,
}

impl MoveCountSignal {
    /// Create a signal holding 0.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    /// Publish a count. A value equal to the current one is dropped
    /// without waking anybody.
    pub fn publish(&self, count: usize) {
        self.tx.send_if_modified(|current| {
            if *current == count {
                false
            } else {
                *current = count;
                true
            }
        });
    }

    /// Subscribe to the count. The receiver immediately holds the
    /// latest value.
    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.tx.subscribe()
    }

    /// The latest published value.
    pub fn current(&self) -> usize {
        *self.tx.borrow()
    }
}

impl Default for MoveCountSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks the latest active-game set and feeds the my-turn signal.
///
/// Owned by the repository and longer-lived than any one subscription
/// epoch: the tracked set and the signal survive unsubscribe, so
/// subscribers keep the last known count until fresh data arrives.
pub struct ActiveSetTracker {
    user: PlayerId,
    active: Mutex<HashMap<GameId, Game>>,
    signal: MoveCountSignal,
    sink: Arc<dyn ErrorSink>,
}

impl ActiveSetTracker {
    /// Create a tracker for the given player.
    pub fn new(user: PlayerId, sink: Arc<dyn ErrorSink>) -> Self {
        Self {
            user,
            active: Mutex::new(HashMap::new()),
            signal: MoveCountSignal::new(),
            sink,
        }
    }

    /// The signal fed by this tracker.
    pub fn signal(&self) -> &MoveCountSignal {
        &self.signal
    }

    /// Handle one emission of the active-games live query.
    ///
    /// Replaces the tracked set wholesale, ensures a live connection
    /// for every listed game through `manager`, then publishes the
    /// recomputed my-turn count. A connect failure is reported and
    /// skipped; one unreachable game must not keep the rest of the set
    /// from connecting, and the count is published regardless.
    pub async fn on_active_games(&self, manager: &ConnectionManager, games: Vec<Game>) {
        tracing::debug!(games = games.len(), "active game set emitted");
        let count = {
            let mut active = self.active.lock().await;
            active.clear();
            for game in &games {
                active.insert(game.id, game.clone());
            }
            my_move_count(active.values(), self.user)
        };

        for game in &games {
            if let Err(error) = manager.connect(game).await {
                self.sink.report("connect", &error);
            }
        }

        self.signal.publish(count);
    }

    /// The tracked games in which it is currently the player's turn,
    /// ordered by id.
    pub async fn my_turn_games(&self) -> Vec<Game> {
        let active = self.active.lock().await;
        let mut games: Vec<Game> = active
            .values()
            .filter(|game| is_players_turn(game, self.user))
            .cloned()
            .collect();
        games.sort_by_key(|game| game.id);
        games
    }
}
