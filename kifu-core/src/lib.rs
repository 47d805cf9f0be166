//! # kifu-core
//!
//! Pure merge and turn logic for kifu-sync (no I/O, instant tests).
//!
//! This crate implements the decision-making of the synchronization
//! engine without touching the network or the store, so every rule can
//! be unit tested in microseconds.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about merge decisions
//!
//! The actual I/O (remote connections, store writes) is performed by
//! `kifu-client`, which interprets the [`StoreWrite`]s produced here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod apply;
pub mod merge;
pub mod turn;

pub use apply::{translate_event, StoreWrite};
pub use merge::{apply_snapshot, game_from_snapshot};
pub use turn::{is_players_turn, my_move_count, my_turn_games};
