//! # Chat Client Library
//!
//! This library provides a terminal client for the line chat server. It
//! connects over TCP, reads the identity the server assigns, then relays
//! lines in both directions: every line typed locally is sent to the server
//! and every line the server sends is shown.
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! Owns the connection and the relay loop:
//! - Connection establishment and identity handshake
//! - Outgoing line normalisation (one submission, one line)
//! - Disconnect detection from stream closure or read failure
//!
//! ### Display Module (`display`)
//! Turns protocol lines into the text shown to the user, labelling the
//! identity assignment, other clients' messages and the user's own
//! submissions differently.
//!
//! ### Error Module (`error`)
//! Failures that stop the client from connecting or relaying.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::ChatClient;
//! use tokio::io::{stdin, stdout, BufReader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ChatClient::connect("127.0.0.1:8080").await?;
//!     println!("Assigned user ID {}", client.user_id());
//!
//!     // Relays stdin to the server and server lines to stdout until either side closes
//!     client.run(BufReader::new(stdin()), stdout()).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Disconnection
//!
//! The server never announces a disconnect. Any end of stream or read error
//! on the connection is reported once as a disconnect and the client stops
//! reading.

pub mod display;
pub mod error;
pub mod network;

pub use error::ClientError;
pub use network::ChatClient;
