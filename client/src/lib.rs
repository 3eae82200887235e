//! # Draw-and-Guess Terminal Client
//!
//! A line-oriented client for the draw-and-guess server. It performs the
//! name handshake, turns typed lines into protocol messages and prints the
//! server's broadcasts. It does not render strokes; `draw` messages are
//! received and skipped.
//!
//! ## Module Organization
//!
//! ### Input Module (`input`)
//! Parses typed lines into `ready`, `guess` and `chat` messages.
//!
//! ### Display Module (`display`)
//! Formats roster updates, round announcements, results and chat for the
//! terminal.
//!
//! ### Network Module (`network`)
//! Owns the TCP connection and the newline-delimited JSON framing.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::Client;
//! use shared::Message;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::connect("127.0.0.1:9000", "Alice").await?;
//!     client.send(&Message::Ready).await?;
//!
//!     while let Some(message) = client.recv().await? {
//!         println!("{:?}", message);
//!     }
//!     Ok(())
//! }
//! ```

pub mod display;
pub mod input;
pub mod network;
