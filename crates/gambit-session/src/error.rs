//! Expected operation failures for the session layer.
//!
//! A [`Decline`] is a normal outcome, not a bug: the session was full,
//! it wasn't the caller's turn, the invite code matched nothing. The
//! handler turns declines into `Reply::Declined` frames and keeps the
//! connection open. Internal errors (codec, transport) travel on
//! different types entirely.

use gambit_protocol::{Color, DeclineReason, InviteCode, SessionId};

/// Why a session operation was declined.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Decline {
    /// No session exists under this id.
    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    /// The invite code resolves to nothing (expired or mistyped).
    #[error("no session matches invite code {0}")]
    InviteCodeNotFound(InviteCode),

    /// Both seats are occupied.
    #[error("session {0} is full")]
    SessionFull(SessionId),

    /// The seat a joiner would take is already held by someone else.
    #[error("the open seat in session {0} is already taken")]
    SeatTaken(SessionId),

    /// The game is over; no further joins or moves.
    #[error("session {0} is already finished")]
    SessionOver(SessionId),

    /// The caller holds no seat in this session.
    #[error("caller is not seated in session {0}")]
    NotSeated(SessionId),

    /// A move was submitted by the player whose turn it is not.
    #[error("not your turn")]
    NotYourTurn,

    /// The operation requires a running game and the session isn't in one.
    #[error("session {0} has no game in progress")]
    NotInProgress(SessionId),

    /// A clock reached zero — the game ends by time-forfeit.
    #[error("time forfeit: {0}'s clock is exhausted")]
    ClockExhausted(Color),

    /// Empty or malformed input where the operation disallows it.
    #[error("{0}")]
    InvalidArgument(String),
}

impl Decline {
    /// Maps the decline onto the closed wire-level reason set.
    pub fn reason(&self) -> DeclineReason {
        match self {
            Self::SessionNotFound(_) | Self::InviteCodeNotFound(_) => DeclineReason::NotFound,
            Self::SessionFull(_)
            | Self::SeatTaken(_)
            | Self::SessionOver(_)
            | Self::NotInProgress(_) => DeclineReason::Conflict,
            Self::NotSeated(_) | Self::NotYourTurn => DeclineReason::Forbidden,
            Self::ClockExhausted(_) => DeclineReason::Exhausted,
            Self::InvalidArgument(_) => DeclineReason::InvalidArgument,
        }
    }
}
