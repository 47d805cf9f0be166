//! Mock remote service for testing.
//!
//! Lets tests seed snapshots and listings, queue failures, count
//! calls, and inject events into any stream of an open connection.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use kifu_types::{
    Clock, GameId, GameNotice, GameSnapshot, GameSummary, MoveEvent, Phase, PlayerId,
    RemovedStonesEvent, UndoRequestEvent,
};

use super::{GameConnection, RemoteError, RemoteGameService};

/// Mock implementation of [`RemoteGameService`].
///
/// Clones share state, mirroring how a real service handle is shared
/// between the engine and a test asserting on it.
#[derive(Debug)]
pub struct MockGameService {
    user: PlayerId,
    inner: Arc<Mutex<MockInner>>,
}

#[derive(Debug, Default)]
struct MockInner {
    snapshots: HashMap<GameId, GameSnapshot>,
    active: Vec<GameSummary>,
    historic: Vec<GameSummary>,
    fetch_failures: VecDeque<RemoteError>,
    connect_failures: VecDeque<RemoteError>,
    fetch_counts: HashMap<GameId, u32>,
    active_list_fetches: u32,
    historic_list_fetches: u32,
    connect_counts: HashMap<GameId, u32>,
    feeds: HashMap<GameId, GameFeed>,
    notice_txs: Vec<mpsc::UnboundedSender<GameNotice>>,
}

/// Senders feeding one open mock connection.
#[derive(Debug)]
struct GameFeed {
    snapshots: mpsc::UnboundedSender<GameSnapshot>,
    moves: mpsc::UnboundedSender<MoveEvent>,
    clocks: mpsc::UnboundedSender<Clock>,
    phases: mpsc::UnboundedSender<Phase>,
    removed_stones: mpsc::UnboundedSender<RemovedStonesEvent>,
    undo_requests: mpsc::UnboundedSender<UndoRequestEvent>,
}

impl MockGameService {
    /// Create a mock service signed in as `user`.
    pub fn new(user: PlayerId) -> Self {
        Self {
            user,
            inner: Arc::new(Mutex::new(MockInner::default())),
        }
    }

    /// Seed the snapshot `fetch_game` returns for `id`.
    pub fn put_snapshot(&self, id: GameId, snapshot: GameSnapshot) {
        self.inner.lock().unwrap().snapshots.insert(id, snapshot);
    }

    /// Set the active-games listing.
    pub fn set_active_games(&self, games: Vec<GameSummary>) {
        self.inner.lock().unwrap().active = games;
    }

    /// Set the historic-games listing.
    pub fn set_historic_games(&self, games: Vec<GameSummary>) {
        self.inner.lock().unwrap().historic = games;
    }

    /// Queue a failure for the next fetch call (single game or
    /// listing). Queued failures are consumed in order, before any
    /// seeded answer.
    pub fn fail_next_fetch(&self, error: RemoteError) {
        self.inner.lock().unwrap().fetch_failures.push_back(error);
    }

    /// Queue a failure for the next `connect_to_game` call.
    pub fn fail_next_connect(&self, error: RemoteError) {
        self.inner.lock().unwrap().connect_failures.push_back(error);
    }

    /// How many times `fetch_game` was called for `id`.
    pub fn fetch_count(&self, id: GameId) -> u32 {
        self.inner
            .lock()
            .unwrap()
            .fetch_counts
            .get(&id)
            .copied()
            .unwrap_or(0)
    }

    /// How many times the active listing was fetched.
    pub fn active_list_fetches(&self) -> u32 {
        self.inner.lock().unwrap().active_list_fetches
    }

    /// How many times the historic listing was fetched.
    pub fn historic_list_fetches(&self) -> u32 {
        self.inner.lock().unwrap().historic_list_fetches
    }

    /// How many times `connect_to_game` was called for `id`.
    pub fn connect_count(&self, id: GameId) -> u32 {
        self.inner
            .lock()
            .unwrap()
            .connect_counts
            .get(&id)
            .copied()
            .unwrap_or(0)
    }

    /// Whether the most recent connection for `id` still has a live
    /// consumer on the other end.
    pub fn is_connected(&self, id: GameId) -> bool {
        self.inner
            .lock()
            .unwrap()
            .feeds
            .get(&id)
            .is_some_and(|feed| !feed.moves.is_closed())
    }

    /// Push a notice to every open notification stream.
    pub fn notify(&self, notice: GameNotice) {
        let mut inner = self.inner.lock().unwrap();
        inner.notice_txs.retain(|tx| tx.send(notice).is_ok());
    }

    /// Emit a full snapshot on the open connection for `id`.
    ///
    /// Panics if no connection was ever opened for the game. Sending
    /// into a connection whose consumer is gone is a silent no-op, the
    /// same as a real service pushing into a dead socket.
    pub fn emit_snapshot(&self, id: GameId, snapshot: GameSnapshot) {
        self.with_feed(id, |feed| {
            let _ = feed.snapshots.send(snapshot);
        });
    }

    /// Emit an incremental move on the open connection for `id`.
    pub fn emit_move(&self, id: GameId, event: MoveEvent) {
        self.with_feed(id, |feed| {
            let _ = feed.moves.send(event);
        });
    }

    /// Emit a clock update on the open connection for `id`.
    pub fn emit_clock(&self, id: GameId, clock: Clock) {
        self.with_feed(id, |feed| {
            let _ = feed.clocks.send(clock);
        });
    }

    /// Emit a phase transition on the open connection for `id`.
    pub fn emit_phase(&self, id: GameId, phase: Phase) {
        self.with_feed(id, |feed| {
            let _ = feed.phases.send(phase);
        });
    }

    /// Emit a stone-removal update on the open connection for `id`.
    pub fn emit_removed_stones(&self, id: GameId, event: RemovedStonesEvent) {
        self.with_feed(id, |feed| {
            let _ = feed.removed_stones.send(event);
        });
    }

    /// Emit an undo request on the open connection for `id`.
    pub fn emit_undo_requested(&self, id: GameId, event: UndoRequestEvent) {
        self.with_feed(id, |feed| {
            let _ = feed.undo_requests.send(event);
        });
    }

    fn with_feed(&self, id: GameId, send: impl FnOnce(&GameFeed)) {
        let inner = self.inner.lock().unwrap();
        let feed = inner
            .feeds
            .get(&id)
            .unwrap_or_else(|| panic!("no connection was opened for game {id}"));
        send(feed);
    }
}

impl Clone for MockGameService {
    fn clone(&self) -> Self {
        Self {
            user: self.user,
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl RemoteGameService for MockGameService {
    fn user_id(&self) -> PlayerId {
        self.user
    }

    fn connect_to_notifications(&self) -> BoxStream<'static, GameNotice> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.lock().unwrap().notice_txs.push(tx);
        Box::pin(UnboundedReceiverStream::new(rx))
    }

    async fn fetch_game(&self, id: GameId) -> Result<GameSnapshot, RemoteError> {
        let mut inner = self.inner.lock().unwrap();
        *inner.fetch_counts.entry(id).or_insert(0) += 1;
        if let Some(error) = inner.fetch_failures.pop_front() {
            return Err(error);
        }
        inner
            .snapshots
            .get(&id)
            .cloned()
            .ok_or_else(|| RemoteError::Rejected(format!("unknown game {id}")))
    }

    async fn fetch_active_games(&self) -> Result<Vec<GameSummary>, RemoteError> {
        let mut inner = self.inner.lock().unwrap();
        inner.active_list_fetches += 1;
        if let Some(error) = inner.fetch_failures.pop_front() {
            return Err(error);
        }
        Ok(inner.active.clone())
    }

    async fn fetch_historic_games(&self) -> Result<Vec<GameSummary>, RemoteError> {
        let mut inner = self.inner.lock().unwrap();
        inner.historic_list_fetches += 1;
        if let Some(error) = inner.fetch_failures.pop_front() {
            return Err(error);
        }
        Ok(inner.historic.clone())
    }

    async fn connect_to_game(&self, id: GameId) -> Result<GameConnection, RemoteError> {
        let mut inner = self.inner.lock().unwrap();
        *inner.connect_counts.entry(id).or_insert(0) += 1;
        if let Some(error) = inner.connect_failures.pop_front() {
            return Err(error);
        }

        let (snapshots_tx, snapshots) = mpsc::unbounded_channel();
        let (moves_tx, moves) = mpsc::unbounded_channel();
        let (clocks_tx, clocks) = mpsc::unbounded_channel();
        let (phases_tx, phases) = mpsc::unbounded_channel();
        let (removed_tx, removed_stones) = mpsc::unbounded_channel();
        let (undo_tx, undo_requests) = mpsc::unbounded_channel();

        inner.feeds.insert(
            id,
            GameFeed {
                snapshots: snapshots_tx,
                moves: moves_tx,
                clocks: clocks_tx,
                phases: phases_tx,
                removed_stones: removed_tx,
                undo_requests: undo_tx,
            },
        );

        Ok(GameConnection {
            snapshots,
            moves,
            clocks,
            phases,
            removed_stones,
            undo_requests,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    fn gid(id: u64) -> GameId {
        GameId::new(id)
    }

    fn snapshot(to_move: u64) -> GameSnapshot {
        GameSnapshot::new(
            PlayerId::new(1),
            PlayerId::new(2),
            Clock {
                current_player: PlayerId::new(to_move),
                white_time_ms: 300_000,
                black_time_ms: 300_000,
            },
        )
    }

    #[tokio::test]
    async fn seeded_snapshot_is_fetchable_and_counted() {
        let remote = MockGameService::new(PlayerId::new(1));
        remote.put_snapshot(gid(5), snapshot(1));

        let fetched = remote.fetch_game(gid(5)).await.unwrap();
        assert_eq!(fetched, snapshot(1));
        assert_eq!(remote.fetch_count(gid(5)), 1);
        assert_eq!(remote.fetch_count(gid(6)), 0);
    }

    #[tokio::test]
    async fn unknown_game_is_rejected() {
        let remote = MockGameService::new(PlayerId::new(1));
        let error = remote.fetch_game(gid(5)).await.unwrap_err();
        assert!(matches!(error, RemoteError::Rejected(_)));
    }

    #[tokio::test]
    async fn queued_failures_are_consumed_in_order() {
        let remote = MockGameService::new(PlayerId::new(1));
        remote.put_snapshot(gid(5), snapshot(1));
        remote.fail_next_fetch(RemoteError::Io("reset".into()));
        remote.fail_next_fetch(RemoteError::Timeout);

        assert!(matches!(
            remote.fetch_game(gid(5)).await,
            Err(RemoteError::Io(_))
        ));
        assert!(matches!(
            remote.fetch_game(gid(5)).await,
            Err(RemoteError::Timeout)
        ));
        assert!(remote.fetch_game(gid(5)).await.is_ok());
        assert_eq!(remote.fetch_count(gid(5)), 3);
    }

    #[tokio::test]
    async fn connection_delivers_emitted_events() {
        let remote = MockGameService::new(PlayerId::new(1));
        let mut connection = remote.connect_to_game(gid(3)).await.unwrap();
        assert_eq!(remote.connect_count(gid(3)), 1);

        remote.emit_move(gid(3), MoveEvent { point: kifu_types::Point::new(4, 4) });
        remote.emit_phase(gid(3), Phase::StoneRemoval);

        let mv = connection.moves.recv().await.unwrap();
        assert_eq!(mv.point, kifu_types::Point::new(4, 4));
        let phase = connection.phases.recv().await.unwrap();
        assert_eq!(phase, Phase::StoneRemoval);
    }

    #[tokio::test]
    async fn dropping_the_connection_marks_it_disconnected() {
        let remote = MockGameService::new(PlayerId::new(1));
        let connection = remote.connect_to_game(gid(3)).await.unwrap();
        assert!(remote.is_connected(gid(3)));

        drop(connection);
        assert!(!remote.is_connected(gid(3)));
        // Emitting into the dead connection must not panic.
        remote.emit_phase(gid(3), Phase::Finished);
    }

    #[tokio::test]
    async fn notices_reach_every_open_subscription() {
        let remote = MockGameService::new(PlayerId::new(1));
        let mut first = remote.connect_to_notifications();
        let mut second = remote.connect_to_notifications();

        remote.notify(GameNotice { game_id: gid(12) });
        assert_eq!(first.next().await.unwrap().game_id, gid(12));
        assert_eq!(second.next().await.unwrap().game_id, gid(12));
    }

    #[tokio::test]
    async fn clones_share_seeded_state() {
        let remote = MockGameService::new(PlayerId::new(1));
        let clone = remote.clone();
        clone.put_snapshot(gid(5), snapshot(2));
        assert!(remote.fetch_game(gid(5)).await.is_ok());
        assert_eq!(clone.fetch_count(gid(5)), 1);
    }
}
