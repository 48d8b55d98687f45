//! One hosted game: seats, moves, position text, clock, lifecycle.
//!
//! A [`Session`] is plain mutable state. It never locks anything and
//! never talks to the network; the coordinator serializes access by
//! holding the session's mutex while calling in here.

use chrono::{DateTime, Utc};
use gambit_protocol::{
    Color, InviteCode, LogicalId, SessionId, SessionSnapshot, SessionStatus, SessionSummary,
    Visibility,
};
use gambit_transport::ConnectionId;

use crate::clock::GameClock;

/// Position text of a game that hasn't had a move applied yet. The
/// server treats position text as opaque; this is the one value it
/// produces itself.
pub const INITIAL_POSITION: &str = "startpos";

/// One seated player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerHandle {
    /// Stable identity; what reconnects and turn checks compare.
    pub logical_id: LogicalId,
    /// Current transport connection. Replaced on reconnect.
    pub connection_id: ConnectionId,
    pub display_name: String,
    /// `false` while the player's connection is down and their seat is
    /// being held through the grace period.
    pub connected: bool,
    /// Last instant the player was known to be attached.
    pub last_seen_at: DateTime<Utc>,
}

impl PlayerHandle {
    pub fn new(
        logical_id: LogicalId,
        connection_id: ConnectionId,
        display_name: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            logical_id,
            connection_id,
            display_name,
            connected: true,
            last_seen_at: now,
        }
    }

    /// Re-attaches the seat to a new connection after a reconnect.
    pub fn reattach(&mut self, connection_id: ConnectionId, now: DateTime<Utc>) {
        self.connection_id = connection_id;
        self.connected = true;
        self.last_seen_at = now;
    }
}

/// One accepted move, kept for move numbering and history.
/// Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRecord {
    pub from: String,
    pub to: String,
    pub promotion: Option<String>,
    pub by: Color,
    pub mover_logical_id: LogicalId,
    /// Connection the move arrived on, for audit; identity decisions
    /// always use the logical id.
    pub mover_connection_id: ConnectionId,
    /// Position text the mover supplied, if any. Also replaces the
    /// session's `position_state`.
    pub position_after: Option<String>,
    pub timestamp_utc: DateTime<Utc>,
}

/// All state of one hosted game.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub name: String,
    pub visibility: Visibility,
    /// Present for private sessions; the only way to discover them.
    pub invite_code: Option<InviteCode>,
    pub status: SessionStatus,
    pub white: Option<PlayerHandle>,
    pub black: Option<PlayerHandle>,
    /// Opaque position text, wholesale-replaced by each accepted move
    /// that carries a `position_after`.
    pub position_state: String,
    pub moves: Vec<MoveRecord>,
    /// Whose turn it is. Authoritative; not derived from move count.
    pub active_color: Color,
    pub clock: GameClock,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(
        id: SessionId,
        name: String,
        visibility: Visibility,
        invite_code: Option<InviteCode>,
        clock: GameClock,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            visibility,
            invite_code,
            status: SessionStatus::WaitingForSecondPlayer,
            white: None,
            black: None,
            position_state: INITIAL_POSITION.to_string(),
            moves: Vec::new(),
            active_color: Color::White,
            clock,
            created_at: now,
            started_at: None,
        }
    }

    // -----------------------------------------------------------------
    // Seats
    // -----------------------------------------------------------------

    pub fn slot(&self, color: Color) -> Option<&PlayerHandle> {
        match color {
            Color::White => self.white.as_ref(),
            Color::Black => self.black.as_ref(),
        }
    }

    pub fn slot_mut(&mut self, color: Color) -> &mut Option<PlayerHandle> {
        match color {
            Color::White => &mut self.white,
            Color::Black => &mut self.black,
        }
    }

    pub fn is_full(&self) -> bool {
        self.white.is_some() && self.black.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.white.is_none() && self.black.is_none()
    }

    pub fn player_count(&self) -> usize {
        usize::from(self.white.is_some()) + usize::from(self.black.is_some())
    }

    /// The seat held by this logical identity, if any.
    pub fn seat_of(&self, logical: &LogicalId) -> Option<Color> {
        for color in [Color::White, Color::Black] {
            if self.slot(color).is_some_and(|p| &p.logical_id == logical) {
                return Some(color);
            }
        }
        None
    }

    /// The seat currently attached to this connection, if any.
    pub fn seat_of_connection(&self, connection: ConnectionId) -> Option<Color> {
        for color in [Color::White, Color::Black] {
            if self
                .slot(color)
                .is_some_and(|p| p.connection_id == connection)
            {
                return Some(color);
            }
        }
        None
    }

    pub fn opponent_name(&self, color: Color) -> Option<String> {
        self.slot(color.opposite()).map(|p| p.display_name.clone())
    }

    // -----------------------------------------------------------------
    // Game flow
    // -----------------------------------------------------------------

    /// Transitions to a running game: both clocks refilled, white to
    /// move. Caller must have filled both seats first.
    pub fn start(&mut self, now: DateTime<Utc>) {
        debug_assert!(self.is_full());
        self.status = SessionStatus::InProgress;
        self.started_at = Some(now);
        self.active_color = Color::White;
        self.clock.restart(now);
    }

    /// Settles the lazy clock up to `now` while a game is running.
    /// No-op otherwise: clocks don't run while waiting or after the end.
    pub fn settle_clock(&mut self, now: DateTime<Utc>) {
        if self.status.is_active() {
            self.clock.apply_elapsed(self.active_color, now);
        }
    }

    /// Records an accepted move and hands the turn over: increment to
    /// the mover, then the other color becomes active. Returns the
    /// 1-based move number.
    pub fn apply_move(
        &mut self,
        from: String,
        to: String,
        promotion: Option<String>,
        position_after: Option<String>,
        now: DateTime<Utc>,
    ) -> usize {
        let mover = self.active_color;
        let (mover_logical_id, mover_connection_id) = match self.slot(mover) {
            Some(p) => (p.logical_id.clone(), p.connection_id),
            None => (LogicalId::new("unknown"), ConnectionId::new(0)),
        };
        if let Some(position) = &position_after {
            self.position_state = position.clone();
        }
        self.moves.push(MoveRecord {
            from,
            to,
            promotion,
            by: mover,
            mover_logical_id,
            mover_connection_id,
            position_after,
            timestamp_utc: now,
        });
        self.clock.add_increment(mover);
        self.active_color = mover.opposite();
        self.moves.len()
    }

    /// Ends the game. Terminal; nothing un-finishes a session.
    pub fn finish(&mut self) {
        self.status = SessionStatus::Finished;
    }

    // -----------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------

    /// Builds the full client-facing snapshot from the caller's seat.
    /// The clock must already be settled for `now`.
    pub fn snapshot(
        &self,
        your_color: Option<Color>,
        is_reconnecting: bool,
        now: DateTime<Utc>,
    ) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id.clone(),
            status: self.status,
            your_color,
            is_reconnecting,
            opponent_name: your_color.and_then(|c| self.opponent_name(c)),
            position_state: self.position_state.clone(),
            move_count: self.moves.len(),
            clock: self.clock.snapshot(self.active_color),
            server_time_utc: now,
        }
    }

    /// One lobby-listing row.
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.id.clone(),
            name: self.name.clone(),
            white_name: self.white.as_ref().map(|p| p.display_name.clone()),
            black_name: self.black.as_ref().map(|p| p.display_name.clone()),
            status: self.status,
            player_count: self.player_count(),
        }
    }
}
