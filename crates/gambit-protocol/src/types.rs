//! Core protocol types for Gambit's wire format.
//!
//! Everything here gets serialized to JSON text frames, sent over the
//! transport, and parsed on the other side. Three groups of types:
//!
//! - **Identifiers** — newtype wrappers so a session id can't be passed
//!   where a logical player id is expected.
//! - **Client → server** — [`Request`] wrapping one [`Op`] per call, with
//!   an `id` the server echoes back so the client can correlate replies.
//! - **Server → client** — [`Frame`]: either a [`Reply`] to a specific
//!   request, or a pushed [`SessionEvent`] fan-out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for one hosted game session.
///
/// Opaque string, allocated by the server, immutable after creation.
/// `#[serde(transparent)]` makes it serialize as a plain JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wraps a raw string as a `SessionId`.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A caller-stable player identity that survives reconnects.
///
/// The transport connection id changes on every reconnect; the logical id
/// does not. Turn authorization always compares logical ids — never
/// client-supplied display names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogicalId(String);

impl LogicalId {
    /// Wraps a raw string as a `LogicalId`.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A short human-shareable token resolving to a private session.
///
/// Normalized to uppercase on construction and deserialization, so
/// comparisons are effectively case-insensitive everywhere.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String")]
#[serde(into = "String")]
pub struct InviteCode(String);

impl InviteCode {
    /// Normalizes and wraps a raw code (trimmed, uppercased).
    pub fn new(code: impl AsRef<str>) -> Self {
        Self(code.as_ref().trim().to_ascii_uppercase())
    }

    /// Returns the normalized code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for InviteCode {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<InviteCode> for String {
    fn from(code: InviteCode) -> Self {
        code.0
    }
}

impl fmt::Display for InviteCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Board-color and lifecycle enums
// ---------------------------------------------------------------------------

/// One of the two player colors. The first joiner is white.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

impl Color {
    /// The other color.
    pub fn opposite(self) -> Self {
        match self {
            Self::White => Self::Black,
            Self::Black => Self::White,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::White => f.write_str("white"),
            Self::Black => f.write_str("black"),
        }
    }
}

/// The lifecycle state of a session.
///
/// ```text
/// WaitingForSecondPlayer ──(second slot fills)──→ InProgress ──→ Finished
/// ```
///
/// `Finished` is terminal: resignation, time-forfeit, or an explicit
/// finish all land here and nothing leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    WaitingForSecondPlayer,
    InProgress,
    Finished,
}

impl SessionStatus {
    /// Returns `true` if a second player may still join.
    pub fn is_joinable(self) -> bool {
        matches!(self, Self::WaitingForSecondPlayer)
    }

    /// Returns `true` if moves are currently accepted.
    pub fn is_active(self) -> bool {
        matches!(self, Self::InProgress)
    }

    /// Returns `true` if the game is over for good.
    pub fn is_over(self) -> bool {
        matches!(self, Self::Finished)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WaitingForSecondPlayer => f.write_str("WaitingForSecondPlayer"),
            Self::InProgress => f.write_str("InProgress"),
            Self::Finished => f.write_str("Finished"),
        }
    }
}

/// Whether a session shows up in the public lobby or is invite-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Private,
    Public,
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// Point-in-time view of both clocks, taken under the session lock.
///
/// Remaining times are whole seconds, already floored at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockSnapshot {
    pub white_remaining_secs: u64,
    pub black_remaining_secs: u64,
    /// Whose turn it is — the authoritative turn indicator.
    pub active_color: Color,
}

/// Full state snapshot returned by `EnsureJoined` and `GetStatus`.
///
/// Everything a client needs to render (or re-render, after a reconnect)
/// the game: seat, opponent, position, move count, clocks, and the server
/// time the snapshot was taken at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub status: SessionStatus,
    /// The caller's seat, if they hold one.
    pub your_color: Option<Color>,
    /// `true` when the caller resumed an existing seat rather than joining.
    pub is_reconnecting: bool,
    pub opponent_name: Option<String>,
    /// Opaque position text, exactly as the last mover supplied it.
    pub position_state: String,
    pub move_count: usize,
    pub clock: ClockSnapshot,
    pub server_time_utc: DateTime<Utc>,
}

/// One row of the public lobby listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub name: String,
    pub white_name: Option<String>,
    pub black_name: Option<String>,
    pub status: SessionStatus,
    pub player_count: usize,
}

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// One remote operation a client can invoke.
///
/// `#[serde(tag = "type")]` produces internally tagged JSON:
/// `{ "type": "SubmitMove", "session_id": "…", "from": "e2", "to": "e4" }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Op {
    /// Create a session; the caller is seated as white immediately.
    CreateSession {
        name: Option<String>,
        private: bool,
        display_name: Option<String>,
        logical_id: Option<LogicalId>,
    },

    /// Join a session, or resume an existing seat in it (reconnect).
    EnsureJoined {
        session_id: SessionId,
        display_name: Option<String>,
        logical_id: Option<LogicalId>,
    },

    /// Resolve an invite code, then behave exactly like `EnsureJoined`.
    JoinByInviteCode {
        code: InviteCode,
        display_name: Option<String>,
        logical_id: Option<LogicalId>,
    },

    /// Submit a move. `position_after`, when present, wholesale-replaces
    /// the session's position text (trusted, never validated).
    SubmitMove {
        session_id: SessionId,
        from: String,
        to: String,
        promotion: Option<String>,
        position_after: Option<String>,
    },

    /// Send a chat message to everyone in the session.
    SendMessage { session_id: SessionId, text: String },

    /// Fetch a fresh snapshot (also advances the lazy clock).
    GetStatus { session_id: SessionId },

    /// Offer the opponent a draw. Advisory only: the server relays the
    /// offer, it does not track or enforce an answer.
    OfferDraw { session_id: SessionId },

    /// Resign the game.
    Resign { session_id: SessionId },

    /// List joinable public sessions.
    ListSessions,
}

/// Envelope for a client call: a correlation id plus the operation.
///
/// The server echoes `id` in the matching [`Frame::Reply`] so a client
/// with several calls in flight can tell the answers apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: u64,
    pub op: Op,
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Why an operation was declined. A closed set so clients can match
/// exhaustively instead of parsing message strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeclineReason {
    /// Unknown session id or invite code.
    NotFound,
    /// Session full, slot already taken, or duplicate join.
    Conflict,
    /// Move out of turn, or caller not recognized in this session.
    Forbidden,
    /// A clock reached zero — time-forfeit.
    Exhausted,
    /// Empty or malformed input where disallowed.
    InvalidArgument,
}

/// The direct result of one operation.
///
/// Exactly one `Ok`-shaped variant per operation, plus `Declined` for
/// every expected failure and `Fault` for unexpected internal errors.
/// Declines are normal outcomes — they never close the connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Reply {
    SessionCreated {
        session_id: SessionId,
        invite_code: Option<InviteCode>,
        snapshot: SessionSnapshot,
    },
    Joined {
        snapshot: SessionSnapshot,
    },
    MoveAccepted {
        move_number: usize,
        next_turn: Color,
        position_state: String,
        clock: ClockSnapshot,
    },
    MessageSent,
    Status {
        snapshot: SessionSnapshot,
    },
    DrawOfferSent,
    Resigned {
        winner: Color,
    },
    SessionList {
        sessions: Vec<SessionSummary>,
    },
    Declined {
        reason: DeclineReason,
        message: String,
    },
    Fault {
        message: String,
    },
}

/// A pushed notification fanned out to every connection in a session.
///
/// Per-session event order always matches mutation order: payloads are
/// computed inside the session lock and queued before it is released.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SessionEvent {
    SessionCreated {
        session_id: SessionId,
        name: String,
        invite_code: Option<InviteCode>,
    },
    PlayerJoined {
        session_id: SessionId,
        player_name: String,
        color: Color,
    },
    GameStarted {
        session_id: SessionId,
        white_name: String,
        black_name: String,
        position_state: String,
        clock: ClockSnapshot,
    },
    MoveApplied {
        session_id: SessionId,
        from: String,
        to: String,
        promotion: Option<String>,
        by: Color,
        move_number: usize,
        position_state: String,
        next_turn: Color,
        clock: ClockSnapshot,
    },
    ChatMessage {
        session_id: SessionId,
        sender_name: String,
        sender_color: Color,
        text: String,
        timestamp_utc: DateTime<Utc>,
    },
    DrawOffered {
        session_id: SessionId,
        by: Color,
        player_name: String,
    },
    PlayerResigned {
        session_id: SessionId,
        by: Color,
        player_name: String,
        winner: Color,
    },
}

/// The top-level server → client frame: a correlated reply or a push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Frame {
    /// Direct answer to the request with the same `id`.
    Reply { id: u64, reply: Reply },
    /// Fire-and-forget session broadcast.
    Event { event: SessionEvent },
}

// =========================================================================
// Tests
// =========================================================================
