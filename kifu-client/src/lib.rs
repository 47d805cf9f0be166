//! # kifu-client
//!
//! Live-state synchronization engine for online Go games.
//!
//! Mirrors a signed-in player's games from the authoritative remote
//! service into a local store: tracks the set of active games, keeps
//! one live connection per active game, merges push events (snapshots,
//! moves, clocks, phases, stone removals, undo requests) into the
//! store, and derives the count of games waiting on the player.
//!
//! ## Architecture
//!
//! ```text
//! RemoteGameService ──connections──▶ pump tasks ──▶ EventApplier ──▶ GameStore
//!         ▲                                                             │
//!         │ fetch-and-merge (fixed-delay retry)              live queries│
//!         │                                                             ▼
//!  GameRepository ──subscribe/unsubscribe──▶ ActiveSetTracker ──▶ my-turn count
//! ```
//!
//! The store and the remote service are injected as trait objects;
//! [`MemoryGameStore`] and [`MockGameService`] are the in-crate
//! implementations used by the tests and the demo CLI.
//!
//! ## Example
//!
//! ```no_run
//! # extern crate kifu_sync_client as kifu_client;
//! use std::sync::Arc;
//! use kifu_client::{GameRepository, MemoryGameStore, MockGameService, SyncConfig};
//! use kifu_types::PlayerId;
//!
//! # async fn run() {
//! let store = Arc::new(MemoryGameStore::new());
//! let remote = Arc::new(MockGameService::new(PlayerId::new(1)));
//! let repo = GameRepository::new(SyncConfig::default(), store, remote);
//!
//! repo.subscribe().await;
//! let mut my_turn = repo.my_move_count();
//! println!("games waiting on me: {}", *my_turn.borrow_and_update());
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod applier;
pub mod config;
pub mod error;
pub mod manager;
pub mod remote;
pub mod repository;
pub mod retry;
pub mod scope;
pub mod store;
pub mod tracker;

pub use applier::{EventApplier, GameMirror};
pub use config::{ConfigError, SyncConfig};
pub use error::{ErrorSink, RecordingSink, SyncError, TracingSink};
pub use manager::ConnectionManager;
pub use remote::{GameConnection, MockGameService, RemoteError, RemoteGameService};
pub use repository::GameRepository;
pub use retry::{retry_transient, RETRY_DELAY};
pub use scope::CancelScope;
pub use store::{GameStore, LiveQuery, MemoryGameStore, StoreError};
pub use tracker::{ActiveSetTracker, MoveCountSignal};
