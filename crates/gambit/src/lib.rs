//! # Gambit
//!
//! A WebSocket server for two-player chess sessions: session registry,
//! invite codes, server-authoritative clocks, and reconnect handling.
//!
//! The server is authoritative about everything *around* the game —
//! seats, turn order, clocks, lifecycle — while treating the position
//! itself as opaque text supplied by the clients. Rules live in the
//! client; bookkeeping lives here.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gambit::GambitServer;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), gambit::GambitError> {
//!     let server = GambitServer::<gambit::protocol::JsonCodec>::builder()
//!         .bind("0.0.0.0:8080")
//!         .build()
//!         .await?;
//!     server.run().await
//! }
//! ```
//!
//! ## Layers
//!
//! ```text
//! gambit            server loop + per-connection handler (this crate)
//! gambit-session    coordinator, registry, clocks, reconnect sweeper
//! gambit-protocol   wire types and JSON codec
//! gambit-transport  WebSocket transport
//! ```

mod error;
mod handler;
mod server;

pub use error::GambitError;
pub use server::{GambitServer, GambitServerBuilder};

// Re-exports so server binaries need only this crate.
pub use gambit_protocol as protocol;
pub use gambit_session::{Decline, SessionConfig, SessionCoordinator};
pub use gambit_transport as transport;
