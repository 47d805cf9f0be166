//! Whose turn is it, and in how many games.

use kifu_types::{Game, PlayerId};

/// Whether it is `player`'s turn to act in `game`.
///
/// A finished game is nobody's turn, even when the last known
/// player-to-move id still points at someone.
pub fn is_players_turn(game: &Game, player: PlayerId) -> bool {
    !game.phase.is_finished() && game.player_to_move == Some(player)
}

/// Count the games in which it is `player`'s turn.
pub fn my_move_count<'a, I>(games: I, player: PlayerId) -> usize
where
    I: IntoIterator<Item = &'a Game>,
{
    games
        .into_iter()
        .filter(|game| is_players_turn(game, player))
        .count()
}

/// The subset of `games` in which it is `player`'s turn, in input order.
pub fn my_turn_games<'a, I>(games: I, player: PlayerId) -> Vec<&'a Game>
where
    I: IntoIterator<Item = &'a Game>,
{
    games
        .into_iter()
        .filter(|game| is_players_turn(game, player))
        .collect()
}
