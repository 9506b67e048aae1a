//! # Chat Server Library
//!
//! This library provides a line-oriented chat server. Every client that
//! connects over TCP is assigned a numeric identity, and every line a client
//! sends is rebroadcast to all other connected clients, attributed to its
//! sender.
//!
//! ## Wire Protocol
//!
//! One UTF-8 line per message, newline terminated:
//! - server → new client: `Your user ID is: <N>`, exactly once, first
//! - client → server: any line, sent verbatim
//! - server → every other client: `Client <N>: <line>`
//!
//! There is no disconnect message; closing the connection is the signal.
//!
//! ## Architecture Design
//!
//! ### Task Per Connection
//! The accept loop registers each connection and spawns one task running its
//! read loop. Each session additionally owns a writer task fed by an outbox
//! channel, so delivering a broadcast never waits on the recipient's socket.
//!
//! ### Session Registry
//! All membership lives in a [`registry::SessionRegistry`]. Identities come
//! from a single atomic counter and are never reused. Broadcasts iterate a
//! snapshot of the membership, so no lock is held while lines are delivered
//! and a recipient that fails mid-broadcast is simply removed afterwards.
//!
//! ### Failure Containment
//! Only binding the listening socket can fail the server. Accept errors are
//! logged and retried with a growing pause, and the accept loop ends only
//! once the listener itself is unusable. Read or write errors end the
//! affected session without touching any other.
//!
//! ### Slow Clients
//! Each outbox is bounded. A recipient whose outbox fills up, or whose
//! transport accepts no data for several seconds, is dropped from the
//! registry instead of buffering without limit.
//!
//! ## Module Organization
//!
//! - `registry`: active session set, identity counter, broadcast fan-out
//! - `session`: per-connection lifecycle, read loop and writer task
//! - `network`: listening socket, accept loop, shutdown
//! - `error`: startup error type
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind("127.0.0.1:8080").await?;
//!
//!     // Accepts clients until Ctrl+C, then closes every session
//!     server
//!         .run_until(async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await;
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod network;
pub mod registry;
pub mod session;

pub use error::ServerError;
pub use network::Server;
pub use registry::SessionRegistry;
pub use session::{ClientSession, SessionHandle, SessionState};
