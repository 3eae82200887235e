//! # Draw-and-Guess Server Library
//!
//! This library provides the authoritative server for a real-time
//! draw-and-guess party game. One player per round draws while everyone else
//! types guesses at a hidden word; the server owns the roster, the scores, the
//! ready votes and the current round, and relays strokes and chat.
//!
//! ## Core Responsibilities
//!
//! ### Shared Room State
//! A single room is shared by every connection. All state transitions run
//! inside one critical section, so concurrent ready votes, guesses and
//! disconnects resolve to one well-defined order.
//!
//! ### Round Coordination
//! When every connected player (at least two) has voted ready, a drawer and a
//! secret word are picked at random. The round ends when someone other than
//! the drawer guesses the word exactly, or when the drawer leaves.
//!
//! ### Authorization
//! - Only the current drawer's strokes are relayed
//! - The drawer's own guesses are treated as chat
//! - The secret word is only ever sent to the drawer
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! Roster, scores, ready votes and round fields with atomic transitions.
//!
//! ### Round Module (`round`)
//! The Idle/Active state machine: drawer and word selection, guess judging.
//!
//! ### Lobby Module (`lobby`)
//! The locked room instance shared by all connections and the fan-out of
//! resulting messages.
//!
//! ### Client Manager Module (`client_manager`)
//! Registry of connected players and their outbound queues.
//!
//! ### Network Module (`network`)
//! TCP accept loop and the per-connection handshake/dispatch/teardown loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::{config::ServerConfig, network::Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default();
//!     let server = Server::bind(&config).await?;
//!
//!     // Accepts players until `server.stop()` is called from another task.
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod config;
mod error;
pub mod game;
pub mod lobby;
pub mod network;
pub mod round;
pub mod words;

pub use error::ServerError;
