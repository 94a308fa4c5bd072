//! # Game Arena Server Library
//!
//! This library implements a real-time multiplayer game arena: clients
//! connect over a persistent websocket channel, create or join short-lived
//! game sessions (Snake, Pong, Tetris), exchange per-move updates, and
//! receive broadcast state snapshots. Its core concern is session and
//! connection management, not game physics.
//!
//! ## Core Responsibilities
//!
//! ### Connection Tracking
//! Every live connection is registered with an opaque client id and an
//! exclusive send-handle. Disconnects of every flavor (clean closes,
//! transport errors, send failures) converge on one idempotent teardown
//! path that removes the client from its session.
//!
//! ### Session Multiplexing
//! Many independent sessions run concurrently while each individual
//! session's mutation is serialized behind its own lock. Joining a session
//! that reaches its player minimum starts the game; a running session that
//! drops below minimum ends as abandoned; ended sessions linger briefly
//! for their final broadcast, then get reaped.
//!
//! ### State Broadcasting
//! Every accepted mutation produces a snapshot that fans out to all
//! participants. Delivery to each recipient is independent, and a single
//! session's snapshots arrive everywhere in the order they were produced.
//!
//! ### Graceful Degradation
//! Session outcomes are recorded through a narrow save/load trait with an
//! explicit reachability signal. When the backing store is down the gaming
//! path is untouched: the session simply stays unpersisted and the failure
//! is logged.
//!
//! ## Module Organization
//!
//! - [`connection`]: registry of live connections and their send-handles
//! - [`session`]: the session table, lifecycle state machine and reaper
//! - [`games`]: Snake/Pong/Tetris rule sets behind one tagged union
//! - [`broadcast`]: snapshot fan-out with per-session ordering
//! - [`persist`]: the persistence trait and in-memory store
//! - [`dispatch`]: inbound message decoding and routing
//! - [`arena`]: the coordinating struct, which doubles as the command
//!   interface for external front-ends
//! - [`network`]: websocket transport and background loops
//! - [`error`]: the failure taxonomy; nothing in it kills the process
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::arena::{Arena, ArenaConfig};
//! use server::network::{self, NetworkConfig};
//! use server::persist::MemoryStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let arena = Arena::new(ArenaConfig::default(), Arc::new(MemoryStore::new()));
//!     let listener = network::bind("127.0.0.1:8765").await?;
//!     network::run(arena, listener, NetworkConfig::default()).await;
//!     Ok(())
//! }
//! ```

pub mod arena;
pub mod broadcast;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod games;
pub mod network;
pub mod persist;
pub mod session;
