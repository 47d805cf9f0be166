//! The local game record and its component types.

use serde::{Deserialize, Serialize};

use crate::{GameId, PlayerId};

/// A single board coordinate, zero-based from the top-left corner.
///
/// The remote service encodes a pass as a negative coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    /// Zero-based column.
    pub x: i32,
    /// Zero-based row.
    pub y: i32,
}

impl Point {
    /// Create a point at the given column and row.
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The pass marker (no stone placed).
    pub fn pass() -> Self {
        Self { x: -1, y: -1 }
    }

    /// Whether this move is a pass.
    pub fn is_pass(&self) -> bool {
        self.x < 0 || self.y < 0
    }
}

/// Play phase of a game on the remote service.
///
/// The serialized names match the wire spelling used by the service,
/// including the space in "stone removal".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Moves are being played.
    #[serde(rename = "play")]
    Play,
    /// Both players are marking dead stones before scoring.
    #[serde(rename = "stone removal")]
    StoneRemoval,
    /// The game is over.
    #[serde(rename = "finished")]
    Finished,
}

impl Phase {
    /// Whether the game has ended.
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished)
    }
}

/// Remaining-time state for a game, as delivered by the clock stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clock {
    /// The player expected to move.
    pub current_player: PlayerId,
    /// White's remaining main time in milliseconds.
    pub white_time_ms: u64,
    /// Black's remaining main time in milliseconds.
    pub black_time_ms: u64,
}

/// Stones placed on the board before the first move, per color.
///
/// Positions use the service's letter-pair encoding ("aa" is the
/// top-left point), concatenated without separators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialState {
    /// Black's pre-placed stones.
    pub black: String,
    /// White's pre-placed stones.
    pub white: String,
}

/// The locally stored record of one game.
///
/// Mirrors what the remote service knows about the game, kept current
/// by the synchronization engine. Identity is the [`GameId`]; the two
/// player ids are fixed when the record is first inserted and never
/// change afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    /// Server-assigned id.
    pub id: GameId,
    /// Display name, when the service provides one.
    pub name: Option<String>,
    /// Black's player id.
    pub black_player: PlayerId,
    /// White's player id.
    pub white_player: PlayerId,
    /// Ordered list of moves played so far.
    pub moves: Vec<Point>,
    /// Last known clock state.
    pub clock: Option<Clock>,
    /// The player expected to move, when known.
    pub player_to_move: Option<PlayerId>,
    /// Current phase.
    pub phase: Phase,
    /// Result string once the game is decided (e.g. "B+3.5").
    pub outcome: Option<String>,
    /// Stones placed before the first move.
    pub initial_state: Option<InitialState>,
    /// Whether white plays the first move (handicap games).
    pub white_goes_first: bool,
    /// Stones currently marked for removal, letter-pair encoded.
    pub removed_stones: Option<String>,
    /// White's score once counted.
    pub white_score: Option<f64>,
    /// Black's score once counted.
    pub black_score: Option<f64>,
    /// Move number at which an undo was requested, if any.
    pub undo_requested: Option<u32>,
    /// When the game ended, in unix milliseconds; absent while ongoing.
    pub ended_at: Option<i64>,
}

impl Game {
    /// Minimal record for `id` between the given players: phase
    /// [`Phase::Play`], nothing else known yet.
    pub fn new(id: GameId, black_player: PlayerId, white_player: PlayerId) -> Self {
        Self {
            id,
            name: None,
            black_player,
            white_player,
            moves: Vec::new(),
            clock: None,
            player_to_move: None,
            phase: Phase::Play,
            outcome: None,
            initial_state: None,
            white_goes_first: false,
            removed_stones: None,
            white_score: None,
            black_score: None,
            undo_requested: None,
            ended_at: None,
        }
    }

    /// Whether the given player is one of the two participants.
    pub fn is_participant(&self, player: PlayerId) -> bool {
        self.black_player == player || self.white_player == player
    }
}
