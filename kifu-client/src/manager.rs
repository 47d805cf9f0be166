//! Per-epoch connection management.
//!
//! The manager owns the set of games with an open live connection.
//! One pump task per connection multiplexes its six streams into a
//! single event channel; one applier task per epoch drains the channel,
//! so every store mutation caused by push events happens in one place,
//! in arrival order.

use std::sync::Arc;

use dashmap::DashSet;
use tokio::sync::mpsc;

use kifu_types::{Game, GameEvent, GameId};

use crate::applier::{EventApplier, GameMirror};
use crate::error::{ErrorSink, SyncError};
use crate::remote::{GameConnection, RemoteGameService};
use crate::scope::CancelScope;

/// Opens, tracks, and tears down live game connections for one epoch.
pub struct ConnectionManager {
    remote: Arc<dyn RemoteGameService>,
    mirror: GameMirror,
    connected: DashSet<GameId>,
    scope: CancelScope,
    events: mpsc::UnboundedSender<(GameId, GameEvent)>,
}

impl ConnectionManager {
    /// Create a manager bound to `scope` and spawn its applier task.
    ///
    /// Application failures are reported to `sink`. Must be called from
    /// within a Tokio runtime.
    pub fn new(
        remote: Arc<dyn RemoteGameService>,
        applier: EventApplier,
        mirror: GameMirror,
        scope: CancelScope,
        sink: Arc<dyn ErrorSink>,
    ) -> Self {
        let (events, rx) = mpsc::unbounded_channel();
        tokio::spawn(apply_loop(scope.clone(), applier, rx, sink));
        Self {
            remote,
            mirror,
            connected: DashSet::new(),
            scope,
            events,
        }
    }

    /// Ensure a live connection exists for `game`.
    ///
    /// Registration is atomic per id: exactly one caller wins and
    /// opens the connection, every other concurrent or later call
    /// returns immediately without touching the service. The winner
    /// seeds the mirror with a copy of `game` before opening, so the
    /// first incremental move always has a list to append to.
    pub async fn connect(&self, game: &Game) -> Result<(), SyncError> {
        if !self.connected.insert(game.id) {
            tracing::debug!(game = %game.id, "connection already open");
            return Ok(());
        }

        self.mirror.lock().await.insert(game.id, game.clone());

        let connection = match self.remote.connect_to_game(game.id).await {
            Ok(connection) => connection,
            Err(error) => {
                // Roll back the registration so a later call can retry.
                self.connected.remove(&game.id);
                self.mirror.lock().await.remove(&game.id);
                return Err(error.into());
            }
        };

        tracing::info!(game = %game.id, "opened live game connection");
        tokio::spawn(pump(
            self.scope.clone(),
            game.id,
            connection,
            self.events.clone(),
        ));
        Ok(())
    }

    /// Close every open connection and clear the registration set.
    ///
    /// Cancels the epoch scope, which stops the pumps and the applier
    /// task. Safe to call when nothing is open. Mirror entries are left
    /// behind; they die with the epoch.
    pub fn disconnect_all(&self) {
        self.scope.cancel();
        self.connected.clear();
        tracing::info!("closed all live game connections");
    }

    /// Number of games currently registered as connected.
    pub fn connection_count(&self) -> usize {
        self.connected.len()
    }

    /// Whether a connection is registered for `id`.
    pub fn is_connected(&self, id: GameId) -> bool {
        self.connected.contains(&id)
    }
}

/// Drains the epoch's event channel into the applier.
///
/// A failed application is reported once and the loop moves on; one
/// poisoned event must not stall the stream behind it.
async fn apply_loop(
    scope: CancelScope,
    applier: EventApplier,
    mut events: mpsc::UnboundedReceiver<(GameId, GameEvent)>,
    sink: Arc<dyn ErrorSink>,
) {
    loop {
        let (id, event) = tokio::select! {
            biased;
            _ = scope.cancelled() => break,
            received = events.recv() => match received {
                Some(pair) => pair,
                None => break,
            },
        };
        let kind = event.kind();
        if let Err(error) = applier.apply(id, event).await {
            sink.report(kind, &SyncError::Store(error));
        }
    }
    tracing::debug!("event applier stopped");
}

/// Forwards one connection's six streams into the epoch event channel.
async fn pump(
    scope: CancelScope,
    id: GameId,
    connection: GameConnection,
    events: mpsc::UnboundedSender<(GameId, GameEvent)>,
) {
    let GameConnection {
        mut snapshots,
        mut moves,
        mut clocks,
        mut phases,
        mut removed_stones,
        mut undo_requests,
    } = connection;

    loop {
        let event = tokio::select! {
            biased;
            _ = scope.cancelled() => break,
            Some(snapshot) = snapshots.recv() => GameEvent::Snapshot(snapshot),
            Some(event) = moves.recv() => GameEvent::Move(event),
            Some(clock) = clocks.recv() => GameEvent::Clock(clock),
            Some(phase) = phases.recv() => GameEvent::Phase(phase),
            Some(event) = removed_stones.recv() => GameEvent::RemovedStones(event),
            Some(event) = undo_requests.recv() => GameEvent::UndoRequested(event),
        };
        if events.send((id, event)).is_err() {
            break;
        }
    }
    tracing::debug!(game = %id, "event pump stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RecordingSink;
    use crate::remote::{MockGameService, RemoteError};
    use crate::store::{GameStore, MemoryGameStore};
    use kifu_types::{Clock, GameSnapshot, MoveEvent, Phase, PlayerId, Point};
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio::sync::Mutex;

    fn gid(id: u64) -> GameId {
        GameId::new(id)
    }

    fn pid(id: u64) -> PlayerId {
        PlayerId::new(id)
    }

    fn game(id: u64) -> Game {
        Game::new(gid(id), pid(10), pid(20))
    }

    struct Rig {
        store: MemoryGameStore,
        remote: MockGameService,
        sink: RecordingSink,
        manager: ConnectionManager,
    }

    fn rig() -> Rig {
        let store = MemoryGameStore::new();
        let remote = MockGameService::new(pid(10));
        let sink = RecordingSink::new();
        let mirror: GameMirror = Arc::new(Mutex::new(HashMap::new()));
        let applier = EventApplier::new(Arc::new(store.clone()), Arc::clone(&mirror));
        let manager = ConnectionManager::new(
            Arc::new(remote.clone()),
            applier,
            mirror,
            CancelScope::new(),
            Arc::new(sink.clone()),
        );
        Rig { store, remote, sink, manager }
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..500 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test(start_paused = true)]
    async fn connect_registers_and_opens_exactly_once() {
        let rig = rig();
        rig.manager.connect(&game(1)).await.unwrap();
        rig.manager.connect(&game(1)).await.unwrap();

        assert_eq!(rig.remote.connect_count(gid(1)), 1);
        assert_eq!(rig.manager.connection_count(), 1);
        assert!(rig.manager.is_connected(gid(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_connects_open_one_connection() {
        let rig = rig();
        let manager = Arc::new(rig.manager);
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let manager = Arc::clone(&manager);
            tasks.push(tokio::spawn(async move {
                manager.connect(&game(1)).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(rig.remote.connect_count(gid(1)), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_connect_rolls_back_the_registration() {
        let rig = rig();
        rig.remote.fail_next_connect(RemoteError::Io("down".into()));

        let error = rig.manager.connect(&game(1)).await.unwrap_err();
        assert!(error.is_transient());
        assert!(!rig.manager.is_connected(gid(1)));

        rig.manager.connect(&game(1)).await.unwrap();
        assert_eq!(rig.remote.connect_count(gid(1)), 2);
        assert!(rig.manager.is_connected(gid(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn pumped_events_land_in_the_store() {
        let rig = rig();
        rig.store.insert_all(vec![game(1)]).await.unwrap();
        rig.manager.connect(&game(1)).await.unwrap();

        rig.remote.emit_move(gid(1), MoveEvent { point: Point::new(3, 4) });
        let store = rig.store.clone();
        wait_until(move || {
            store
                .get(gid(1))
                .is_some_and(|g| g.moves == vec![Point::new(3, 4)])
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn events_from_all_streams_are_applied() {
        let rig = rig();
        rig.store.insert_all(vec![game(1)]).await.unwrap();
        rig.manager.connect(&game(1)).await.unwrap();

        let mut snapshot = GameSnapshot::new(
            pid(10),
            pid(20),
            Clock { current_player: pid(20), white_time_ms: 1000, black_time_ms: 1000 },
        );
        snapshot.moves = vec![Point::new(5, 5)];
        rig.remote.emit_snapshot(gid(1), snapshot);
        rig.remote.emit_phase(gid(1), Phase::StoneRemoval);
        rig.remote.emit_removed_stones(
            gid(1),
            kifu_types::RemovedStonesEvent { stones: "aabb".to_string() },
        );
        rig.remote
            .emit_undo_requested(gid(1), kifu_types::UndoRequestEvent { move_number: 1 });

        let store = rig.store.clone();
        wait_until(move || {
            store.get(gid(1)).is_some_and(|g| {
                g.moves == vec![Point::new(5, 5)]
                    && g.phase == Phase::StoneRemoval
                    && g.removed_stones.as_deref() == Some("aabb")
                    && g.undo_requested == Some(1)
            })
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_all_stops_the_event_flow() {
        let rig = rig();
        rig.store.insert_all(vec![game(1)]).await.unwrap();
        rig.manager.connect(&game(1)).await.unwrap();
        rig.manager.disconnect_all();
        assert_eq!(rig.manager.connection_count(), 0);

        rig.remote.emit_move(gid(1), MoveEvent { point: Point::new(3, 4) });
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(rig.store.get(gid(1)).unwrap().moves.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_application_is_reported_and_the_loop_continues() {
        let rig = rig();
        rig.store.insert_all(vec![game(1)]).await.unwrap();
        rig.manager.connect(&game(1)).await.unwrap();

        rig.store.fail_next_write("simulated failure");
        rig.remote.emit_phase(gid(1), Phase::StoneRemoval);
        let sink = rig.sink.clone();
        wait_until(move || sink.tags() == vec!["phase"]).await;
        assert_eq!(rig.store.get(gid(1)).unwrap().phase, Phase::Play);

        rig.remote.emit_phase(gid(1), Phase::Finished);
        let store = rig.store.clone();
        wait_until(move || store.get(gid(1)).is_some_and(|g| g.phase == Phase::Finished)).await;
        assert_eq!(rig.sink.reports().len(), 1);
    }
}
