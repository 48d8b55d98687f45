//! The session coordinator: one façade over the registry, the
//! connection index, the clocks, and the reconnect sweeper.
//!
//! Every client-visible operation enters here. The locking discipline
//! is uniform and worth stating once:
//!
//! 1. Resolve the session handle from the store (no lock held).
//! 2. Acquire that session's mutex.
//! 3. Settle the lazy clock, validate, mutate.
//! 4. Compute event payloads and queue them to subscribers *before*
//!    releasing the lock, so per-session event order equals mutation
//!    order.
//!
//! No operation ever holds two session locks, so there is no lock
//! ordering to get wrong and no cross-session deadlock.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use gambit_protocol::{
    ClockSnapshot, Color, InviteCode, LogicalId, SessionEvent, SessionId, SessionSnapshot,
    SessionSummary, Visibility,
};
use gambit_transport::ConnectionId;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::Decline;
use crate::ids::IdentityIssuer;
use crate::index::ConnectionIndex;
use crate::session::{PlayerHandle, Session};
use crate::store::{SessionHandle, SessionStore};
use crate::sweeper::ReconnectSweeper;

/// Channel end that receives a connection's pushed session events.
/// Unbounded so publishing inside a session lock can never block.
pub type EventSender = mpsc::UnboundedSender<SessionEvent>;

/// Result of a successful `CreateSession`.
#[derive(Debug, Clone)]
pub struct CreatedSession {
    pub session_id: SessionId,
    pub invite_code: Option<InviteCode>,
    pub snapshot: SessionSnapshot,
}

/// Result of an accepted move.
#[derive(Debug, Clone)]
pub struct MoveOutcome {
    pub move_number: usize,
    pub next_turn: Color,
    pub position_state: String,
    pub clock: ClockSnapshot,
}

/// Coordinates all session operations. One instance per server, shared
/// across every connection handler.
#[derive(Debug)]
pub struct SessionCoordinator {
    config: SessionConfig,
    store: Arc<SessionStore>,
    index: Arc<ConnectionIndex>,
    issuer: IdentityIssuer,
    sweeper: ReconnectSweeper,
    subscribers: DashMap<ConnectionId, EventSender>,
}

impl SessionCoordinator {
    pub fn new(config: SessionConfig) -> Self {
        let store = Arc::new(SessionStore::new());
        let index = Arc::new(ConnectionIndex::new());
        let sweeper = ReconnectSweeper::new(store.clone(), index.clone(), config.reconnect_grace_secs);
        Self {
            config,
            store,
            index,
            issuer: IdentityIssuer,
            sweeper,
            subscribers: DashMap::new(),
        }
    }

    /// The underlying registry. Exposed for maintenance tooling and
    /// integration tests; normal traffic goes through the operations.
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// The underlying connection index.
    pub fn index(&self) -> &Arc<ConnectionIndex> {
        &self.index
    }

    // =================================================================
    // Connection lifecycle
    // =================================================================

    /// Registers a connection's event channel. Called once per
    /// connection, before any operation from it is dispatched.
    pub fn on_connected(&self, connection: ConnectionId, events: EventSender) {
        self.subscribers.insert(connection, events);
        debug!(connection = %connection, "connection registered");
    }

    /// Handles a dropped connection: the seat survives, marked
    /// disconnected, and a sweep is scheduled one grace period out.
    pub async fn on_connection_lost(&self, connection: ConnectionId) {
        self.subscribers.remove(&connection);

        let Some(binding) = self.index.resolve(connection) else {
            debug!(connection = %connection, "connection lost, no session binding");
            return;
        };
        let Some(handle) = self.store.get(&binding.session_id) else {
            self.index.unbind(connection);
            return;
        };

        {
            let mut session = handle.lock().await;
            let Some(seat) = session.seat_of(&binding.logical_id) else {
                self.index.unbind(connection);
                return;
            };
            if let Some(player) = session.slot_mut(seat).as_mut() {
                if player.connection_id != connection {
                    // A newer connection already took this seat over;
                    // the old binding is just stale.
                    self.index.unbind(connection);
                    return;
                }
                player.connected = false;
                player.last_seen_at = Utc::now();
            }
            info!(
                session_id = %binding.session_id,
                logical_id = %binding.logical_id,
                grace_secs = self.config.reconnect_grace_secs,
                "player disconnected, holding seat"
            );
        }

        self.sweeper
            .schedule(binding.session_id, binding.logical_id);
    }

    // =================================================================
    // Operations
    // =================================================================

    /// Creates a session and seats the caller as white.
    pub async fn create_session(
        &self,
        connection: ConnectionId,
        name: Option<String>,
        private: bool,
        display_name: Option<String>,
        logical_id: Option<LogicalId>,
    ) -> CreatedSession {
        let now = Utc::now();
        let identity = self.identity(connection, logical_id);
        let display = self.display_name(display_name, &identity);
        let name = non_blank(name).unwrap_or_else(|| self.config.default_session_name.clone());
        let visibility = if private {
            Visibility::Private
        } else {
            Visibility::Public
        };

        // The creator is seated inside `create`, so the session is
        // never reachable with an open white slot.
        let creator = PlayerHandle::new(identity.clone(), connection, display, now);
        let handle = self.store.create(name, visibility, creator, &self.config);
        let session = handle.lock().await;
        self.index
            .bind(connection, session.id.clone(), identity);

        info!(session_id = %session.id, ?visibility, "session created");
        self.publish(
            &session,
            SessionEvent::SessionCreated {
                session_id: session.id.clone(),
                name: session.name.clone(),
                invite_code: session.invite_code.clone(),
            },
        );

        CreatedSession {
            session_id: session.id.clone(),
            invite_code: session.invite_code.clone(),
            snapshot: session.snapshot(Some(Color::White), false, now),
        }
    }

    /// Joins a session or resumes an existing seat in it. Idempotent
    /// for a given logical identity: repeated calls re-attach the same
    /// seat instead of consuming the other one.
    pub async fn ensure_joined(
        &self,
        connection: ConnectionId,
        session_id: SessionId,
        display_name: Option<String>,
        logical_id: Option<LogicalId>,
    ) -> Result<SessionSnapshot, Decline> {
        let handle = self
            .store
            .get(&session_id)
            .ok_or_else(|| Decline::SessionNotFound(session_id.clone()))?;
        self.join_on(handle, connection, display_name, logical_id)
            .await
    }

    /// Resolves an invite code and then behaves exactly like
    /// [`Self::ensure_joined`].
    pub async fn join_by_invite_code(
        &self,
        connection: ConnectionId,
        code: InviteCode,
        display_name: Option<String>,
        logical_id: Option<LogicalId>,
    ) -> Result<SessionSnapshot, Decline> {
        let handle = self
            .store
            .get_by_invite_code(&code)
            .ok_or_else(|| Decline::InviteCodeNotFound(code.clone()))?;
        self.join_on(handle, connection, display_name, logical_id)
            .await
    }

    async fn join_on(
        &self,
        handle: SessionHandle,
        connection: ConnectionId,
        display_name: Option<String>,
        logical_id: Option<LogicalId>,
    ) -> Result<SessionSnapshot, Decline> {
        let now = Utc::now();
        let identity = self.identity(connection, logical_id);
        let mut session = handle.lock().await;
        settle(&mut session, now);

        // Reconnect path: this identity already holds a seat.
        if let Some(seat) = session.seat_of(&identity) {
            let session_id = session.id.clone();
            if let Some(player) = session.slot_mut(seat).as_mut() {
                let old_connection = player.connection_id;
                if old_connection != connection {
                    self.index.unbind(old_connection);
                    self.subscribers.remove(&old_connection);
                }
                player.reattach(connection, now);
                if let Some(name) = non_blank(display_name) {
                    player.display_name = name;
                }
            }
            self.index.bind(connection, session_id.clone(), identity);
            info!(session_id = %session_id, %seat, "player re-attached to seat");
            return Ok(session.snapshot(Some(seat), true, now));
        }

        // Fresh join path.
        if session.status.is_over() {
            return Err(Decline::SessionOver(session.id.clone()));
        }
        if session.is_full() {
            return Err(Decline::SessionFull(session.id.clone()));
        }
        let seat = match (&session.white, &session.black) {
            (Some(_), None) => Color::Black,
            (None, None) => Color::White,
            // The joiner's seat is black; if it is held while white is
            // free, someone else already claimed the second chair.
            (None, Some(_)) => return Err(Decline::SeatTaken(session.id.clone())),
            (Some(_), Some(_)) => return Err(Decline::SessionFull(session.id.clone())),
        };

        let display = self.display_name(display_name, &identity);
        *session.slot_mut(seat) = Some(PlayerHandle::new(
            identity.clone(),
            connection,
            display.clone(),
            now,
        ));
        self.index
            .bind(connection, session.id.clone(), identity);
        info!(session_id = %session.id, %seat, "player joined");

        if session.is_full() && session.status.is_joinable() {
            session.start(now);
            let white_name = session
                .white
                .as_ref()
                .map(|p| p.display_name.clone())
                .unwrap_or_default();
            let black_name = session
                .black
                .as_ref()
                .map(|p| p.display_name.clone())
                .unwrap_or_default();
            info!(session_id = %session.id, "game started");
            self.publish(
                &session,
                SessionEvent::GameStarted {
                    session_id: session.id.clone(),
                    white_name,
                    black_name,
                    position_state: session.position_state.clone(),
                    clock: session.clock.snapshot(session.active_color),
                },
            );
        } else {
            self.publish(
                &session,
                SessionEvent::PlayerJoined {
                    session_id: session.id.clone(),
                    player_name: display,
                    color: seat,
                },
            );
        }

        Ok(session.snapshot(Some(seat), false, now))
    }

    /// Applies a move: turn check against the settled clock, position
    /// update, turn handover, fan-out.
    pub async fn submit_move(
        &self,
        connection: ConnectionId,
        session_id: SessionId,
        from: String,
        to: String,
        promotion: Option<String>,
        position_after: Option<String>,
    ) -> Result<MoveOutcome, Decline> {
        if from.trim().is_empty() || to.trim().is_empty() {
            return Err(Decline::InvalidArgument(
                "move squares must be non-empty".into(),
            ));
        }

        let now = Utc::now();
        let handle = self
            .store
            .get(&session_id)
            .ok_or_else(|| Decline::SessionNotFound(session_id.clone()))?;
        let mut session = handle.lock().await;

        let seat = self.seat_of_caller(&session, connection)?;
        if !session.status.is_active() {
            return Err(Decline::NotInProgress(session.id.clone()));
        }
        if let Some(flagged) = settle(&mut session, now) {
            warn!(session_id = %session.id, %flagged, "move rejected, clock exhausted");
            return Err(Decline::ClockExhausted(flagged));
        }
        if seat != session.active_color {
            return Err(Decline::NotYourTurn);
        }

        let move_number =
            session.apply_move(from.clone(), to.clone(), promotion.clone(), position_after, now);
        let clock = session.clock.snapshot(session.active_color);
        debug!(session_id = %session.id, move_number, %seat, "move accepted");

        self.publish(
            &session,
            SessionEvent::MoveApplied {
                session_id: session.id.clone(),
                from,
                to,
                promotion,
                by: seat,
                move_number,
                position_state: session.position_state.clone(),
                next_turn: session.active_color,
                clock,
            },
        );

        Ok(MoveOutcome {
            move_number,
            next_turn: session.active_color,
            position_state: session.position_state.clone(),
            clock,
        })
    }

    /// Relays a chat line to everyone in the session. Transient: the
    /// message is not stored and does not touch the clock.
    pub async fn send_message(
        &self,
        connection: ConnectionId,
        session_id: SessionId,
        text: String,
    ) -> Result<(), Decline> {
        if text.trim().is_empty() {
            return Err(Decline::InvalidArgument("message text is empty".into()));
        }

        let handle = self
            .store
            .get(&session_id)
            .ok_or_else(|| Decline::SessionNotFound(session_id.clone()))?;
        let session = handle.lock().await;
        let seat = self.seat_of_caller(&session, connection)?;
        let sender_name = session
            .slot(seat)
            .map(|p| p.display_name.clone())
            .unwrap_or_default();

        self.publish(
            &session,
            SessionEvent::ChatMessage {
                session_id: session.id.clone(),
                sender_name,
                sender_color: seat,
                text,
                timestamp_utc: Utc::now(),
            },
        );
        Ok(())
    }

    /// Fresh snapshot for the caller. Settles the lazy clock as a side
    /// effect, so polling clients see time advance.
    pub async fn get_status(
        &self,
        connection: ConnectionId,
        session_id: SessionId,
    ) -> Result<SessionSnapshot, Decline> {
        let now = Utc::now();
        let handle = self
            .store
            .get(&session_id)
            .ok_or_else(|| Decline::SessionNotFound(session_id.clone()))?;
        let mut session = handle.lock().await;
        settle(&mut session, now);

        let your_color = self
            .index
            .resolve(connection)
            .filter(|b| b.session_id == session_id)
            .and_then(|b| session.seat_of(&b.logical_id));
        Ok(session.snapshot(your_color, false, now))
    }

    /// Relays a draw offer to the session. Advisory and transient,
    /// like chat: the server does not track the offer or enforce an
    /// answer — accepting is expressed by the clients out of band or
    /// by resigning/finishing on their side.
    pub async fn offer_draw(
        &self,
        connection: ConnectionId,
        session_id: SessionId,
    ) -> Result<(), Decline> {
        let handle = self
            .store
            .get(&session_id)
            .ok_or_else(|| Decline::SessionNotFound(session_id.clone()))?;
        let session = handle.lock().await;
        let seat = self.seat_of_caller(&session, connection)?;
        if !session.status.is_active() {
            return Err(Decline::NotInProgress(session.id.clone()));
        }
        let player_name = session
            .slot(seat)
            .map(|p| p.display_name.clone())
            .unwrap_or_default();
        debug!(session_id = %session.id, %seat, "draw offered");

        self.publish(
            &session,
            SessionEvent::DrawOffered {
                session_id: session.id.clone(),
                by: seat,
                player_name,
            },
        );
        Ok(())
    }

    /// Resigns the running game; the opponent wins immediately.
    pub async fn resign(
        &self,
        connection: ConnectionId,
        session_id: SessionId,
    ) -> Result<Color, Decline> {
        let now = Utc::now();
        let handle = self
            .store
            .get(&session_id)
            .ok_or_else(|| Decline::SessionNotFound(session_id.clone()))?;
        let mut session = handle.lock().await;

        let seat = self.seat_of_caller(&session, connection)?;
        if !session.status.is_active() {
            return Err(Decline::NotInProgress(session.id.clone()));
        }
        if let Some(flagged) = settle(&mut session, now) {
            return Err(Decline::ClockExhausted(flagged));
        }

        session.finish();
        let winner = seat.opposite();
        let player_name = session
            .slot(seat)
            .map(|p| p.display_name.clone())
            .unwrap_or_default();
        info!(session_id = %session.id, %seat, %winner, "player resigned");

        self.publish(
            &session,
            SessionEvent::PlayerResigned {
                session_id: session.id.clone(),
                by: seat,
                player_name,
                winner,
            },
        );
        Ok(winner)
    }

    /// Public-lobby listing: public sessions still waiting for their
    /// second player. Locks each session briefly and individually;
    /// never the registry as a whole.
    pub async fn list_sessions(&self) -> Vec<SessionSummary> {
        let mut rows = Vec::new();
        for handle in self.store.list() {
            let session = handle.lock().await;
            if session.visibility == Visibility::Public && session.status.is_joinable() {
                rows.push(session.summary());
            }
        }
        rows
    }

    // =================================================================
    // Internals
    // =================================================================

    /// The caller's stable identity: the client-supplied logical id if
    /// it is non-empty, else one derived from the connection. A blank
    /// id must not count as an identity — every client sending `""`
    /// would otherwise resolve to the same seat.
    fn identity(&self, connection: ConnectionId, logical_id: Option<LogicalId>) -> LogicalId {
        logical_id
            .filter(|id| !id.as_str().trim().is_empty())
            .unwrap_or_else(|| self.issuer.logical_id_for(connection))
    }

    fn display_name(&self, provided: Option<String>, identity: &LogicalId) -> String {
        non_blank(provided).unwrap_or_else(|| self.issuer.anonymous_name(identity))
    }

    /// The caller's seat, resolved through the connection index. A
    /// connection with no binding, a binding for another session, or an
    /// identity holding no seat here are all the same answer: not yours.
    fn seat_of_caller(&self, session: &Session, connection: ConnectionId) -> Result<Color, Decline> {
        self.index
            .resolve(connection)
            .filter(|b| b.session_id == session.id)
            .and_then(|b| session.seat_of(&b.logical_id))
            .ok_or_else(|| Decline::NotSeated(session.id.clone()))
    }

    /// Queues `event` to every connection currently attached to the
    /// session. Callers hold the session lock, which is what pins event
    /// order to mutation order; the unbounded send never blocks.
    fn publish(&self, session: &Session, event: SessionEvent) {
        for color in [Color::White, Color::Black] {
            let Some(player) = session.slot(color) else {
                continue;
            };
            if let Some(sender) = self.subscribers.get(&player.connection_id) {
                // A closed receiver just means the connection is mid-
                // teardown; the disconnect path cleans the entry up.
                let _ = sender.send(event.clone());
            }
        }
    }
}

/// Settles the lazy clock and converts exhaustion into a terminal
/// session. Returns the flagged color when that happened.
fn settle(session: &mut Session, now: chrono::DateTime<Utc>) -> Option<Color> {
    session.settle_clock(now);
    if session.status.is_active() {
        if let Some(flagged) = session.clock.exhausted_color() {
            info!(session_id = %session.id, %flagged, "clock exhausted, game over by time-forfeit");
            session.finish();
            return Some(flagged);
        }
    }
    None
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
