//! Session management for Gambit: the server-side state layer.
//!
//! This crate owns everything between the wire protocol and the clock
//! on the wall:
//!
//! - [`SessionStore`] — the registry of live sessions; doubles as the
//!   per-session lock arena.
//! - [`ConnectionIndex`] — connection → (session, identity) lookup.
//! - [`Session`] / [`GameClock`] — one game's state and its lazy,
//!   server-authoritative clock.
//! - [`ReconnectSweeper`] — grace-period cleanup of abandoned seats.
//! - [`SessionCoordinator`] — the façade the connection handler calls;
//!   every operation, the locking discipline, and event fan-out.
//!
//! # Architecture
//!
//! ```text
//! handler ──→ SessionCoordinator ──→ SessionStore ──→ Mutex<Session>
//!                    │                    ▲
//!                    ├──→ ConnectionIndex │
//!                    └──→ ReconnectSweeper┘
//! ```
//!
//! Concurrency model in one line: sharded concurrent maps for the
//! registries, one async mutex per session for its state, and no
//! global lock anywhere.

mod clock;
mod config;
mod coordinator;
mod error;
mod ids;
mod index;
mod session;
mod store;
mod sweeper;

pub use clock::GameClock;
pub use config::SessionConfig;
pub use coordinator::{CreatedSession, EventSender, MoveOutcome, SessionCoordinator};
pub use error::Decline;
pub use ids::{IdentityIssuer, INVITE_CODE_ALPHABET, INVITE_CODE_LEN};
pub use index::{Binding, ConnectionIndex};
pub use session::{MoveRecord, PlayerHandle, Session, INITIAL_POSITION};
pub use store::{SessionHandle, SessionStore};
pub use sweeper::ReconnectSweeper;
