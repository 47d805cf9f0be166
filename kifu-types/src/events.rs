//! Payloads delivered by the remote game service.
//!
//! A live game connection carries six independent event streams;
//! [`GameEvent`] unifies them into one currency once they are pumped
//! into the engine. Ordering is guaranteed within a stream, never
//! across streams.

use serde::{Deserialize, Serialize};

use crate::{Clock, GameId, InitialState, Phase, PlayerId, Point};

/// Complete game state, delivered when a connection opens or a game is
/// fetched in full.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    /// Display name, when the service provides one.
    pub name: Option<String>,
    /// Black's player id.
    pub black_player: PlayerId,
    /// White's player id.
    pub white_player: PlayerId,
    /// Result string once decided.
    pub outcome: Option<String>,
    /// Current phase.
    pub phase: Phase,
    /// Stones placed before the first move.
    pub initial_state: Option<InitialState>,
    /// Whether white plays the first move.
    pub white_goes_first: bool,
    /// Full ordered move list.
    pub moves: Vec<Point>,
    /// Stones currently marked for removal, letter-pair encoded.
    pub removed_stones: Option<String>,
    /// White's score once counted.
    pub white_score: Option<f64>,
    /// Black's score once counted.
    pub black_score: Option<f64>,
    /// Clock state at snapshot time.
    pub clock: Clock,
    /// Move number at which an undo was requested, if any.
    pub undo_requested: Option<u32>,
    /// When the game ended, in unix milliseconds.
    pub ended_at: Option<i64>,
}

impl GameSnapshot {
    /// Snapshot with the given players and clock, everything else empty
    /// and the phase set to [`Phase::Play`].
    pub fn new(black_player: PlayerId, white_player: PlayerId, clock: Clock) -> Self {
        Self {
            name: None,
            black_player,
            white_player,
            outcome: None,
            phase: Phase::Play,
            initial_state: None,
            white_goes_first: false,
            moves: Vec::new(),
            removed_stones: None,
            white_score: None,
            black_score: None,
            clock,
            undo_requested: None,
            ended_at: None,
        }
    }
}

/// The writable projection of a snapshot.
///
/// Carries every field a full-state write may touch. The player ids are
/// deliberately absent: they are fixed when the record is inserted and
/// a later snapshot must not rewrite them.
#[derive(Debug, Clone, PartialEq)]
pub struct GameDataUpdate {
    /// Result string once decided.
    pub outcome: Option<String>,
    /// Current phase.
    pub phase: Phase,
    /// The player expected to move.
    pub player_to_move: PlayerId,
    /// Stones placed before the first move.
    pub initial_state: Option<InitialState>,
    /// Whether white plays the first move.
    pub white_goes_first: bool,
    /// Full ordered move list.
    pub moves: Vec<Point>,
    /// Stones currently marked for removal.
    pub removed_stones: Option<String>,
    /// White's score once counted.
    pub white_score: Option<f64>,
    /// Black's score once counted.
    pub black_score: Option<f64>,
    /// Clock state.
    pub clock: Clock,
    /// Move number at which an undo was requested, if any.
    pub undo_requested: Option<u32>,
}

impl GameDataUpdate {
    /// Build the update a full snapshot implies.
    ///
    /// The player to move is read off the snapshot's clock.
    pub fn from_snapshot(snapshot: &GameSnapshot) -> Self {
        Self {
            outcome: snapshot.outcome.clone(),
            phase: snapshot.phase,
            player_to_move: snapshot.clock.current_player,
            initial_state: snapshot.initial_state.clone(),
            white_goes_first: snapshot.white_goes_first,
            moves: snapshot.moves.clone(),
            removed_stones: snapshot.removed_stones.clone(),
            white_score: snapshot.white_score,
            black_score: snapshot.black_score,
            clock: snapshot.clock,
            undo_requested: snapshot.undo_requested,
        }
    }
}

/// One incremental move from a game's move stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveEvent {
    /// The coordinate played, or the pass marker.
    pub point: Point,
}

/// A change to the set of stones marked for removal.
///
/// Always carries the complete current set; it replaces whatever was
/// marked before, never merges with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovedStonesEvent {
    /// The complete marking set, letter-pair encoded.
    pub stones: String,
}

/// A request to undo, made by either player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoRequestEvent {
    /// The move number the requester wants to roll back to.
    pub move_number: u32,
}

/// Notice on the notification channel that a game changed.
///
/// Carries no payload beyond the id; the engine answers it with a full
/// fetch of the named game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameNotice {
    /// The game that changed.
    pub game_id: GameId,
}

/// Lightweight descriptor returned by the bulk listing endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSummary {
    /// Server-assigned id.
    pub id: GameId,
    /// Display name, when the service provides one.
    pub name: Option<String>,
    /// Black's player id.
    pub black_player: PlayerId,
    /// White's player id.
    pub white_player: PlayerId,
}

/// Any event a live game connection can deliver.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    /// Full state superseding everything previously known.
    Snapshot(GameSnapshot),
    /// One new move to append.
    Move(MoveEvent),
    /// Clock update, including whose turn it is.
    Clock(Clock),
    /// Phase transition.
    Phase(Phase),
    /// Replacement of the stone-removal marking set.
    RemovedStones(RemovedStonesEvent),
    /// An undo was requested.
    UndoRequested(UndoRequestEvent),
}

impl GameEvent {
    /// Short name of the event kind, used to tag logs and error reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Snapshot(_) => "game_data",
            Self::Move(_) => "moves",
            Self::Clock(_) => "clock",
            Self::Phase(_) => "phase",
            Self::RemovedStones(_) => "removed_stones",
            Self::UndoRequested(_) => "undo_requested",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PlayerId;

    fn clock(to_move: u64) -> Clock {
        Clock {
            current_player: PlayerId::new(to_move),
            white_time_ms: 300_000,
            black_time_ms: 300_000,
        }
    }

    #[test]
    fn update_from_snapshot_reads_turn_off_the_clock() {
        let mut snapshot = GameSnapshot::new(PlayerId::new(1), PlayerId::new(2), clock(2));
        snapshot.moves = vec![Point::new(3, 3), Point::new(15, 15)];
        snapshot.outcome = Some("B+R".to_string());
        snapshot.white_score = Some(12.5);

        let update = GameDataUpdate::from_snapshot(&snapshot);
        assert_eq!(update.player_to_move, PlayerId::new(2));
        assert_eq!(update.moves, snapshot.moves);
        assert_eq!(update.outcome, snapshot.outcome);
        assert_eq!(update.white_score, Some(12.5));
        assert_eq!(update.clock, snapshot.clock);
    }

    #[test]
    fn event_kinds_name_their_stream() {
        let snapshot = GameSnapshot::new(PlayerId::new(1), PlayerId::new(2), clock(1));
        assert_eq!(GameEvent::Snapshot(snapshot).kind(), "game_data");
        assert_eq!(
            GameEvent::Move(MoveEvent { point: Point::new(0, 0) }).kind(),
            "moves"
        );
        assert_eq!(GameEvent::Clock(clock(1)).kind(), "clock");
        assert_eq!(GameEvent::Phase(Phase::Finished).kind(), "phase");
        assert_eq!(
            GameEvent::RemovedStones(RemovedStonesEvent { stones: "aabb".to_string() }).kind(),
            "removed_stones"
        );
        assert_eq!(
            GameEvent::UndoRequested(UndoRequestEvent { move_number: 12 }).kind(),
            "undo_requested"
        );
    }

    #[test]
    fn snapshot_roundtrips_through_json() {
        let mut snapshot = GameSnapshot::new(PlayerId::new(5), PlayerId::new(6), clock(5));
        snapshot.name = Some("ladder challenge".to_string());
        snapshot.phase = Phase::StoneRemoval;
        snapshot.removed_stones = Some("ccdd".to_string());

        let json = serde_json::to_string(&snapshot).unwrap();
        let back: GameSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn notice_is_copyable_and_comparable() {
        let notice = GameNotice { game_id: GameId::new(31415) };
        let copy = notice;
        assert_eq!(notice, copy);
    }
}
