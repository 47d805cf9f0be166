//! Building and refreshing game records from full snapshots.

use kifu_types::{Game, GameId, GameSnapshot};

/// Overwrite the snapshot-covered fields of `game`.
///
/// A full snapshot is authoritative: everything it carries replaces the
/// local value, including clearing fields the snapshot reports as
/// absent. The player-to-move is derived from the snapshot's clock.
pub fn apply_snapshot(game: &mut Game, snapshot: &GameSnapshot) {
    game.name = snapshot.name.clone();
    game.black_player = snapshot.black_player;
    game.white_player = snapshot.white_player;
    game.moves = snapshot.moves.clone();
    game.clock = Some(snapshot.clock);
    game.player_to_move = Some(snapshot.clock.current_player);
    game.phase = snapshot.phase;
    game.outcome = snapshot.outcome.clone();
    game.initial_state = snapshot.initial_state.clone();
    game.white_goes_first = snapshot.white_goes_first;
    game.removed_stones = snapshot.removed_stones.clone();
    game.white_score = snapshot.white_score;
    game.black_score = snapshot.black_score;
    game.undo_requested = snapshot.undo_requested;
    game.ended_at = snapshot.ended_at;
}

/// Build a fresh record for `id` from a full snapshot.
pub fn game_from_snapshot(id: GameId, snapshot: &GameSnapshot) -> Game {
    let mut game = Game::new(id, snapshot.black_player, snapshot.white_player);
    apply_snapshot(&mut game, snapshot);
    game
}
