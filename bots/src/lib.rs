//! # Yardstick Bots
//!
//! This library drives a population of simulated players against a live game
//! server to measure how the server behaves under concurrent, spatially spread
//! load. Each bot joins over UDP, keeps its own view of the world, and walks to
//! targets picked by a movement model.
//!
//! ## Architecture Overview
//!
//! Everything is driven by one experiment clock. Every tick the experiment
//! reconciles its population, then ticks each bot's task executor, which ticks
//! the bot's current task. Nothing on this path awaits: slow work is spawned
//! and polled on later ticks.
//!
//! ### Task Engine
//! A task reports a [`task::TaskStatus`] every tick. The walk task searches a
//! path on a blocking worker, then moves the bot one clamped step per axis per
//! tick toward each waypoint and sends the new position to the server.
//!
//! ### Population Orchestration
//! The multi-walk experiment connects bots in timed batches, drops bots the
//! server has disconnected, waits until every bot has world data under it, and
//! hands out new walk targets whenever a bot's task has ended.
//!
//! ## Module Organization
//!
//! ### World (`world`, `pathfinding`)
//! - Chunk storage fed by the network receiver
//! - Block lookups that fail while a chunk is not loaded
//! - The path search contract and a greedy default search
//!
//! ### Bots (`bot`, `network`, `connector`, `game`)
//! - Player state shared with the network receiver
//! - UDP join handshake and fire-and-forget movement commands
//! - Server address resolution, fixed or through a naming service
//!
//! ### Behaviour (`task`, `walk`, `movement`, `heartbeat`)
//! - Task status, task variants and the executor
//! - Path following with timeouts, stray detection and per-step tick budget
//! - Seeded random walk targets
//! - Periodic chat traffic
//!
//! ### Experiments (`experiment`, `config`)
//! - Lifecycle runner enforcing `before`, `tick`, `after`
//! - The multi-walk orchestrator
//! - Command line options and experiment parameters
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use bots::config::ExperimentParams;
//! use bots::connector::NetworkConnector;
//! use bots::experiment::{self, ExperimentContext, ExperimentRunner};
//! use bots::game::StaticGame;
//! use bots::network::NetworkSettings;
//! use bots::walk::{SearchLimiter, WalkSettings};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let game = Arc::new(StaticGame::new("127.0.0.1:25565".parse()?));
//! let context = ExperimentContext {
//!     connector: Arc::new(NetworkConnector::new(game, NetworkSettings::default())),
//!     walk_settings: WalkSettings::default(),
//!     limiter: SearchLimiter::new(64),
//! };
//! let params = ExperimentParams::new().with("bots", 10).with("duration", 60);
//!
//! let mut runner = ExperimentRunner::new(experiment::build(4, params, context)?);
//! runner.run(Duration::from_millis(50)).await?;
//! # Ok(())
//! # }
//! ```

pub mod bot;
pub mod config;
pub mod connector;
pub mod error;
pub mod experiment;
pub mod game;
pub mod heartbeat;
pub mod movement;
pub mod network;
pub mod pathfinding;
pub mod task;
pub mod walk;
pub mod world;

#[cfg(test)]
mod test_support;
