//! # kifu-cli
//!
//! Demo and testing harness for the kifu-sync engine.
//!
//! Runs a scripted live session against the in-memory store and the
//! mock game service: seeds a set of games, subscribes, injects remote
//! events, and prints the my-turn count as it changes.
//!
//! ## Example
//!
//! ```bash
//! # Two games, three scripted exchanges each
//! kifu-cli demo --games 2 --rounds 3
//!
//! # With a config file
//! kifu-cli demo --config kifu-sync.toml
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use kifu_client::{GameRepository, MemoryGameStore, MockGameService, SyncConfig};
use kifu_types::{Clock, GameId, GameSnapshot, GameSummary, MoveEvent, PlayerId, Point};

/// Demo and testing harness for the kifu-sync engine.
#[derive(Parser, Debug)]
#[command(name = "kifu-cli")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a scripted live session against the mock game service
    Demo {
        /// Number of concurrent games to simulate
        #[arg(long, default_value = "2")]
        games: u64,

        /// Scripted move exchanges per game
        #[arg(long, default_value = "3")]
        rounds: u32,

        /// Engine configuration file (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Demo { games, rounds, config } => {
            let config = match config {
                Some(path) => SyncConfig::from_file(&path)
                    .with_context(|| format!("loading config from {}", path.display()))?,
                None => SyncConfig::default(),
            };
            demo(config, games, rounds).await
        }
    }
}

async fn demo(config: SyncConfig, games: u64, rounds: u32) -> Result<()> {
    let me = PlayerId::new(1);
    tracing::info!(player = %me, games, rounds, "starting demo session");

    let store = MemoryGameStore::new();
    let remote = MockGameService::new(me);
    let repo = GameRepository::new(config, Arc::new(store.clone()), Arc::new(remote.clone()));

    // Seed the remote service: every game has us as black, an opponent
    // to move, and an empty board.
    let mut summaries = Vec::new();
    for n in 0..games {
        let id = GameId::new(100 + n);
        let opponent = PlayerId::new(50 + n);
        remote.put_snapshot(id, seed_snapshot(me, opponent));
        summaries.push(GameSummary {
            id,
            name: Some(format!("demo game {n}")),
            black_player: me,
            white_player: opponent,
        });
    }
    remote.set_active_games(summaries);

    // Pull the listing into the store, then go live.
    let _active = repo.fetch_active_games().await;
    wait_for(|| store.len() as u64 == games).await?;
    repo.subscribe().await;
    wait_for(|| (0..games).all(|n| remote.connect_count(GameId::new(100 + n)) == 1)).await?;

    let mut counts = repo.my_move_count();
    println!(
        "subscribed as player {me} to {games} game(s); my-turn count starts at {}",
        *counts.borrow_and_update()
    );

    for round in 0..rounds {
        println!("round {round}:");

        // Opponents play, handing each turn to us one game at a time.
        for n in 0..games {
            let id = GameId::new(100 + n);
            remote.emit_move(id, MoveEvent { point: Point::new(3 + round as i32, 3 + n as i32) });
            remote.emit_clock(id, clock_for(me));
            counts.changed().await.context("count signal closed")?;
            println!(
                "  game {id}: opponent played, my-turn count is {}",
                *counts.borrow_and_update()
            );
        }

        // We answer everywhere, handing the turns back.
        for n in 0..games {
            let id = GameId::new(100 + n);
            let opponent = PlayerId::new(50 + n);
            remote.emit_move(
                id,
                MoveEvent { point: Point::new(15 - round as i32, 15 - n as i32) },
            );
            remote.emit_clock(id, clock_for(opponent));
            counts.changed().await.context("count signal closed")?;
            println!(
                "  game {id}: we answered, my-turn count is {}",
                *counts.borrow_and_update()
            );
        }
    }

    repo.unsubscribe().await;
    println!("unsubscribed; final records:");
    for n in 0..games {
        let id = GameId::new(100 + n);
        if let Some(game) = store.get(id) {
            println!(
                "  game {id}: {} move(s), to move: {}",
                game.moves.len(),
                game.player_to_move
                    .map_or_else(|| "unknown".to_string(), |p| p.to_string()),
            );
        }
    }
    Ok(())
}

fn seed_snapshot(me: PlayerId, opponent: PlayerId) -> GameSnapshot {
    GameSnapshot::new(me, opponent, clock_for(opponent))
}

fn clock_for(to_move: PlayerId) -> Clock {
    Clock {
        current_player: to_move,
        white_time_ms: 600_000,
        black_time_ms: 600_000,
    }
}

async fn wait_for(condition: impl Fn() -> bool) -> Result<()> {
    for _ in 0..250 {
        if condition() {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    bail!("timed out waiting for the engine to settle");
}
