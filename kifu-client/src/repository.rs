//! The repository facade over the synchronization engine.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::{watch, Mutex};

use kifu_core::game_from_snapshot;
use kifu_types::{Game, GameId, PlayerId};

use crate::applier::{EventApplier, GameMirror};
use crate::config::SyncConfig;
use crate::error::{ErrorSink, SyncError, TracingSink};
use crate::manager::ConnectionManager;
use crate::remote::RemoteGameService;
use crate::retry::retry_transient;
use crate::scope::CancelScope;
use crate::store::{GameStore, LiveQuery};
use crate::tracker::ActiveSetTracker;

/// One subscription epoch: a cancellation scope and the connection
/// manager bound to it.
struct Epoch {
    scope: CancelScope,
    manager: Arc<ConnectionManager>,
}

/// The engine's public surface.
///
/// One repository exists per signed-in player, with the store and the
/// remote service injected. [`subscribe`](Self::subscribe) starts
/// mirroring, [`unsubscribe`](Self::unsubscribe) tears everything down;
/// the fetch and monitor operations work before, during, and after a
/// subscription. Every method returns promptly; long-running work runs
/// on background tasks bound to the current epoch and reports failures
/// to the error sink.
pub struct GameRepository {
    config: SyncConfig,
    store: Arc<dyn GameStore>,
    remote: Arc<dyn RemoteGameService>,
    sink: Arc<dyn ErrorSink>,
    user: PlayerId,
    tracker: Arc<ActiveSetTracker>,
    epoch: Mutex<Option<Epoch>>,
}

impl GameRepository {
    /// Create a repository with the default (tracing) error sink.
    pub fn new(
        config: SyncConfig,
        store: Arc<dyn GameStore>,
        remote: Arc<dyn RemoteGameService>,
    ) -> Self {
        Self::with_error_sink(config, store, remote, Arc::new(TracingSink))
    }

    /// Create a repository reporting background failures to `sink`.
    pub fn with_error_sink(
        config: SyncConfig,
        store: Arc<dyn GameStore>,
        remote: Arc<dyn RemoteGameService>,
        sink: Arc<dyn ErrorSink>,
    ) -> Self {
        let user = remote.user_id();
        let tracker = Arc::new(ActiveSetTracker::new(user, Arc::clone(&sink)));
        Self {
            config,
            store,
            remote,
            sink,
            user,
            tracker,
            epoch: Mutex::new(None),
        }
    }

    /// The player this repository mirrors games for.
    pub fn user_id(&self) -> PlayerId {
        self.user
    }

    /// Start mirroring: watch the notification channel and keep a live
    /// connection to every game in the active set.
    ///
    /// Safe to call repeatedly; each call supersedes the previous
    /// epoch instead of stacking a second one on top of it.
    pub async fn subscribe(&self) {
        let (scope, manager) = self.begin_epoch().await;
        tracing::info!(user = %self.user, "subscribing to live game updates");

        // Notification channel: each notice triggers a detached
        // fetch-and-merge of the named game.
        {
            let scope = scope.clone();
            let remote = Arc::clone(&self.remote);
            let store = Arc::clone(&self.store);
            let sink = Arc::clone(&self.sink);
            let delay = self.config.retry_delay();
            let mut notices = self.remote.connect_to_notifications();
            tokio::spawn(async move {
                while let Some(Some(notice)) = scope.run_until_cancelled(notices.next()).await {
                    tracing::debug!(game = %notice.game_id, "change notice received");
                    spawn_fetch_and_merge(
                        scope.clone(),
                        Arc::clone(&remote),
                        Arc::clone(&store),
                        Arc::clone(&sink),
                        delay,
                        notice.game_id,
                        "notification",
                    );
                }
                tracing::debug!("notification loop stopped");
            });
        }

        // Active set: feed every live-query emission to the tracker,
        // which connects the games and republishes the my-turn count.
        {
            let tracker = Arc::clone(&self.tracker);
            let mut active = self.store.monitor_active_games(self.user);
            tokio::spawn(async move {
                while let Some(Some(games)) = scope.run_until_cancelled(active.next()).await {
                    tracker.on_active_games(&manager, games).await;
                }
                tracing::debug!("active set loop stopped");
            });
        }
    }

    /// Tear down the current epoch: the notification subscription, the
    /// active-set subscription, every open game connection, and any
    /// in-flight background fetch.
    ///
    /// The my-turn signal itself survives; subscribers keep the last
    /// value until a later `subscribe` produces a fresh one.
    pub async fn unsubscribe(&self) {
        let mut epoch = self.epoch.lock().await;
        if let Some(epoch) = epoch.take() {
            epoch.manager.disconnect_all();
        }
        tracing::info!(user = %self.user, "unsubscribed from live game updates");
    }

    /// Live query of one game, refreshed and connected as a side
    /// effect.
    ///
    /// Triggers a detached fetch-and-merge for `id`, arranges a live
    /// connection once the stored record exists, and returns the
    /// store's single-game live query immediately. The side effects are
    /// bound to the current epoch.
    pub async fn monitor_game(&self, id: GameId) -> LiveQuery<Game> {
        let (scope, manager) = self.current_epoch().await;
        spawn_fetch_and_merge(
            scope.clone(),
            Arc::clone(&self.remote),
            Arc::clone(&self.store),
            Arc::clone(&self.sink),
            self.config.retry_delay(),
            id,
            "monitor_game",
        );
        {
            let sink = Arc::clone(&self.sink);
            let mut stored = self.store.monitor_game(id);
            tokio::spawn(async move {
                if let Some(Some(game)) = scope.run_until_cancelled(stored.next()).await {
                    if let Err(error) = manager.connect(&game).await {
                        sink.report("monitor_game", &error);
                    }
                }
            });
        }
        self.store.monitor_game(id)
    }

    /// One-shot read of a game from the store: resolves with the first
    /// value its live query produces, without fetching or connecting.
    pub async fn get_game_single(&self, id: GameId) -> Result<Game, SyncError> {
        self.store
            .monitor_game(id)
            .next()
            .await
            .ok_or(SyncError::GameNotFound { id })
    }

    /// Live query of the player's ongoing games, refreshed from the
    /// service as a side effect.
    ///
    /// A detached task lists the active games, resolves every summary
    /// into a full snapshot, and inserts the batch in one write.
    /// Transient fetch failures retry at the configured delay; a final
    /// failure is reported to the sink. The returned query emits the
    /// current store contents immediately and again once the refresh
    /// lands.
    pub async fn fetch_active_games(&self) -> LiveQuery<Vec<Game>> {
        let (scope, _manager) = self.current_epoch().await;
        let remote = Arc::clone(&self.remote);
        let store = Arc::clone(&self.store);
        let sink = Arc::clone(&self.sink);
        let delay = self.config.retry_delay();
        tokio::spawn(async move {
            let refresh = async {
                let summaries = retry_transient(delay, || remote.fetch_active_games()).await?;
                tracing::debug!(games = summaries.len(), "active games listed");
                let mut games = Vec::with_capacity(summaries.len());
                for summary in summaries {
                    let snapshot =
                        retry_transient(delay, || remote.fetch_game(summary.id)).await?;
                    games.push(game_from_snapshot(summary.id, &snapshot));
                }
                store.insert_all(games).await?;
                Ok::<(), SyncError>(())
            };
            if let Some(Err(error)) = scope.run_until_cancelled(refresh).await {
                sink.report("fetch_active_games", &error);
            }
        });
        self.store.monitor_active_games(self.user)
    }

    /// Live query of the player's finished games, refreshed from the
    /// service as a side effect.
    ///
    /// Like [`fetch_active_games`](Self::fetch_active_games), except
    /// listed games whose stored record is already a complete finished
    /// game are not fetched again.
    pub async fn fetch_historic_games(&self) -> LiveQuery<Vec<Game>> {
        let (scope, _manager) = self.current_epoch().await;
        let remote = Arc::clone(&self.remote);
        let store = Arc::clone(&self.store);
        let sink = Arc::clone(&self.sink);
        let delay = self.config.retry_delay();
        tokio::spawn(async move {
            let refresh = async {
                let summaries = retry_transient(delay, || remote.fetch_historic_games()).await?;
                let ids: Vec<GameId> = summaries.iter().map(|summary| summary.id).collect();
                let fresh = store.historic_games_not_needing_update(&ids).await?;
                tracing::debug!(
                    games = summaries.len(),
                    fresh = fresh.len(),
                    "historic games listed"
                );
                let mut games = Vec::new();
                for summary in summaries {
                    if fresh.contains(&summary.id) {
                        continue;
                    }
                    let snapshot =
                        retry_transient(delay, || remote.fetch_game(summary.id)).await?;
                    games.push(game_from_snapshot(summary.id, &snapshot));
                }
                if !games.is_empty() {
                    store.insert_all(games).await?;
                }
                Ok::<(), SyncError>(())
            };
            if let Some(Err(error)) = scope.run_until_cancelled(refresh).await {
                sink.report("fetch_historic_games", &error);
            }
        });
        self.store.monitor_historic_games(self.user)
    }

    /// Subscribe to the my-turn count: how many games are waiting on
    /// the player to act.
    ///
    /// The receiver immediately holds the latest value (0 before the
    /// first active-set emission) and wakes only when the count
    /// actually changes.
    pub fn my_move_count(&self) -> watch::Receiver<usize> {
        self.tracker.signal().subscribe()
    }

    /// The latest my-turn count, without subscribing.
    pub fn current_move_count(&self) -> usize {
        self.tracker.signal().current()
    }

    /// The tracked active games in which it is the player's turn.
    pub async fn my_turn_games(&self) -> Vec<Game> {
        self.tracker.my_turn_games().await
    }

    /// Replace the current epoch with a fresh one, cancelling whatever
    /// was running under the old one.
    async fn begin_epoch(&self) -> (CancelScope, Arc<ConnectionManager>) {
        let mut epoch = self.epoch.lock().await;
        if let Some(old) = epoch.take() {
            old.manager.disconnect_all();
        }
        let fresh = self.make_epoch();
        let handles = (fresh.scope.clone(), Arc::clone(&fresh.manager));
        *epoch = Some(fresh);
        handles
    }

    /// The current epoch, created on first use so one-shot operations
    /// work before any subscribe.
    async fn current_epoch(&self) -> (CancelScope, Arc<ConnectionManager>) {
        let mut epoch = self.epoch.lock().await;
        let epoch = epoch.get_or_insert_with(|| self.make_epoch());
        (epoch.scope.clone(), Arc::clone(&epoch.manager))
    }

    fn make_epoch(&self) -> Epoch {
        let scope = CancelScope::new();
        let mirror: GameMirror = Arc::new(Mutex::new(HashMap::new()));
        let applier = EventApplier::new(Arc::clone(&self.store), Arc::clone(&mirror));
        let manager = Arc::new(ConnectionManager::new(
            Arc::clone(&self.remote),
            applier,
            mirror,
            scope.clone(),
            Arc::clone(&self.sink),
        ));
        Epoch { scope, manager }
    }
}

/// Fetch the full snapshot of `id` and merge it into the store on a
/// detached task.
///
/// Transient fetch failures retry at the fixed delay for as long as the
/// scope lives; the store write is not retried. A final failure is
/// reported to the sink under `tag`.
fn spawn_fetch_and_merge(
    scope: CancelScope,
    remote: Arc<dyn RemoteGameService>,
    store: Arc<dyn GameStore>,
    sink: Arc<dyn ErrorSink>,
    delay: Duration,
    id: GameId,
    tag: &'static str,
) {
    tokio::spawn(async move {
        let merge = async {
            let snapshot = retry_transient(delay, || remote.fetch_game(id)).await?;
            let game = game_from_snapshot(id, &snapshot);
            store.insert_all(vec![game]).await?;
            Ok::<(), SyncError>(())
        };
        match scope.run_until_cancelled(merge).await {
            Some(Ok(())) => tracing::debug!(game = %id, tag, "fetched and merged"),
            Some(Err(error)) => sink.report(tag, &error),
            None => {}
        }
    });
}
