//! # kifu-types
//!
//! Shared data model for the kifu-sync live game synchronization engine.
//!
//! This crate provides the foundational types used across all kifu-sync crates:
//! - [`GameId`], [`PlayerId`] - Identity types
//! - [`Game`], [`Phase`], [`Clock`], [`Point`] - The local game record and its parts
//! - [`GameSnapshot`], [`GameEvent`] and friends - Payloads delivered by the remote service
//! - [`GameSummary`], [`GameNotice`] - Lightweight descriptors from listings and notifications

#![warn(missing_docs)]
#![warn(clippy::all)]

mod events;
mod game;
mod ids;

pub use events::{
    GameDataUpdate, GameEvent, GameNotice, GameSnapshot, GameSummary, MoveEvent,
    RemovedStonesEvent, UndoRequestEvent,
};
pub use game::{Clock, Game, InitialState, Phase, Point};
pub use ids::{GameId, PlayerId};
