//! # Room Server Library
//!
//! This library provides the authoritative server for a tile-based
//! multiplayer RPG. It owns every actor, resolves every action against the
//! tile grid, and broadcasts the resulting state changes to connected
//! clients.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Players and NPCs live on a square grid of tiles. The server decides who
//! stands where, who hits whom, and how much mana a spell costs. Clients only
//! send requests and render the events they get back.
//!
//! ### Timed Effects
//! Freezes, invisibility, meditation, stamina recovery, revival and NPC
//! respawns are scheduled records in one per-room timer queue, drained on
//! each server tick.
//!
//! ### Client Management
//! Handles the lifecycle of client connections:
//! - Connection establishment and binding to a player actor
//! - Duplicate and stale action filtering by sequence number
//! - Disconnection and timeout cleanup
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Room Loop
//! All game state is owned by a `Room` and mutated from one task. Inbound
//! packets, timer firings and AI steps are handled one at a time, so every
//! handler observes and leaves a consistent grid.
//!
//! ### Events Out
//! Game code never touches sockets. Each handler pushes typed `GameEvent`s
//! into the room, and the network layer drains and broadcasts them once per
//! tick.
//!
//! ## Module Organization
//!
//! - `grid`, `map`: tile occupancy, collision and item stacks; collision import
//! - `actor`, `stats`, `inventory`: per-actor state and its mutations
//! - `combat`, `spells`, `ai`: melee, spell effects and NPC behaviour
//! - `timers`, `room`: scheduling and the room that ties it all together
//! - `catalog`, `config`, `error`: reference data, tunables and load errors
//! - `client_manager`, `network`: UDP transport and connection bookkeeping
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::catalog::Catalog;
//! use server::config::GameConfig;
//! use server::network::Server;
//! use server::room::Room;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let room = Room::new(GameConfig::default(), Arc::new(Catalog::builtin()?), 42);
//!
//!     // 30Hz: timers, NPC steps and event broadcasts run on this tick
//!     let mut server = Server::new("127.0.0.1:8080", Duration::from_millis(33), room).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod actor;
pub mod ai;
pub mod catalog;
pub mod client_manager;
pub mod combat;
pub mod config;
pub mod error;
pub mod grid;
pub mod inventory;
pub mod map;
pub mod network;
pub mod room;
pub mod spells;
pub mod stats;
pub mod timers;
