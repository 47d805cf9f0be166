//! Translation of inbound connection events into store writes.
//!
//! This is the merge heart of the engine: one inbound [`GameEvent`]
//! becomes at most one [`StoreWrite`]. The caller owns a mirror of
//! every connected game, seeded at connect time; snapshots refresh the
//! mirror and moves extend it, so an incremental move always appends
//! onto the freshest known move list. Clock, phase, removal, and undo
//! events pass straight through without touching the mirror.

use std::collections::HashMap;

use kifu_types::{Clock, Game, GameDataUpdate, GameEvent, GameId, Phase, Point, PlayerId};

use crate::merge::apply_snapshot;

/// A single store mutation implied by one inbound event.
///
/// These are instructions, not side effects; `kifu-client` interprets
/// them against the actual store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreWrite {
    /// Overwrite the snapshot-covered fields of the record.
    GameData {
        /// Target game.
        id: GameId,
        /// The new field values.
        update: GameDataUpdate,
    },
    /// Replace the move list.
    Moves {
        /// Target game.
        id: GameId,
        /// The full list, including the newly appended move.
        moves: Vec<Point>,
    },
    /// Update the clock and whose turn it is.
    Clock {
        /// Target game.
        id: GameId,
        /// The player expected to move.
        player_to_move: PlayerId,
        /// The new clock state.
        clock: Clock,
    },
    /// Record a phase transition.
    Phase {
        /// Target game.
        id: GameId,
        /// The new phase.
        phase: Phase,
    },
    /// Replace the stone-removal marking set.
    RemovedStones {
        /// Target game.
        id: GameId,
        /// The complete marking set, letter-pair encoded.
        stones: String,
    },
    /// Record an undo request.
    UndoRequested {
        /// Target game.
        id: GameId,
        /// The move number to roll back to.
        move_number: u32,
    },
}

/// Translate one inbound event for `id` into the store write it implies.
///
/// Returns `None` when the event must be dropped: a move for a game
/// with no mirror entry has no list to append to and is discarded.
/// Every other event translates unconditionally.
pub fn translate_event(
    mirror: &mut HashMap<GameId, Game>,
    id: GameId,
    event: GameEvent,
) -> Option<StoreWrite> {
    match event {
        GameEvent::Snapshot(snapshot) => {
            if let Some(game) = mirror.get_mut(&id) {
                apply_snapshot(game, &snapshot);
            }
            Some(StoreWrite::GameData {
                id,
                update: GameDataUpdate::from_snapshot(&snapshot),
            })
        }
        GameEvent::Move(event) => {
            let game = mirror.get_mut(&id)?;
            game.moves.push(event.point);
            Some(StoreWrite::Moves {
                id,
                moves: game.moves.clone(),
            })
        }
        GameEvent::Clock(clock) => Some(StoreWrite::Clock {
            id,
            player_to_move: clock.current_player,
            clock,
        }),
        GameEvent::Phase(phase) => Some(StoreWrite::Phase { id, phase }),
        GameEvent::RemovedStones(event) => Some(StoreWrite::RemovedStones {
            id,
            stones: event.stones,
        }),
        GameEvent::UndoRequested(event) => Some(StoreWrite::UndoRequested {
            id,
            move_number: event.move_number,
        }),
    }
}
