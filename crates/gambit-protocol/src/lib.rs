//! Wire protocol for Gambit.
//!
//! This crate defines the "language" that clients and the server speak:
//!
//! - **Types** ([`Request`], [`Op`], [`Frame`], [`Reply`], [`SessionEvent`],
//!   identifiers, snapshots) — the structures that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those structures are
//!   converted to/from text frames.
//! - **Errors** ([`ProtocolError`]) — what can go wrong while doing so.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (text frames) and the session
//! layer (game state). It doesn't know about connections or sessions as
//! live objects — only about their serialized shapes.
//!
//! ```text
//! Transport (frames) → Protocol (Request/Frame) → Session (state)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ClockSnapshot, Color, DeclineReason, Frame, InviteCode, LogicalId, Op,
    Reply, Request, SessionEvent, SessionId, SessionSnapshot, SessionStatus,
    SessionSummary, Visibility,
};
