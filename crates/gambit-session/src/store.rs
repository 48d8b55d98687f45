//! Session registry and per-session lock arena.
//!
//! One concurrent map holds every live session behind its own
//! `Arc<Mutex<_>>`, so the map doubles as the lock arena: fetching a
//! handle never blocks on other sessions, and all mutation of one
//! session serializes on that session's mutex alone. There is no global
//! lock anywhere in this module.
//!
//! A second map resolves invite codes to session ids. On destruction
//! the invite mapping is removed before the session entry, so a code
//! that resolves always points at a session that (still) exists.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use gambit_protocol::{InviteCode, SessionId, Visibility};
use tokio::sync::Mutex;
use tracing::debug;

use crate::clock::GameClock;
use crate::config::SessionConfig;
use crate::ids::IdentityIssuer;
use crate::session::{PlayerHandle, Session};

/// Shared handle to one session plus its lock.
pub type SessionHandle = Arc<Mutex<Session>>;

/// Registry of all live sessions.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<SessionId, SessionHandle>,
    /// Normalized invite code → session id, for private-session joins.
    invite_codes: DashMap<InviteCode, SessionId>,
    issuer: IdentityIssuer,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates and registers a session with a fresh id, the creator
    /// already seated as white and, for private sessions, a fresh
    /// invite code. Seating happens before the insert: the moment the
    /// session becomes reachable by lookup or listing, the white slot
    /// is taken, so no concurrent join can slip into the creator's
    /// seat.
    ///
    /// Candidate codes are drawn until one inserts into the live index
    /// first try — a collision re-draws rather than overwrites, so two
    /// concurrent creates can never share a code.
    pub fn create(
        &self,
        name: String,
        visibility: Visibility,
        creator: PlayerHandle,
        config: &SessionConfig,
    ) -> SessionHandle {
        let now = Utc::now();
        let id = self.issuer.session_id();

        let invite_code = match visibility {
            Visibility::Public => None,
            Visibility::Private => Some(self.allocate_invite_code(&id)),
        };

        let mut session = Session::new(
            id.clone(),
            name,
            visibility,
            invite_code,
            GameClock::new(config.initial_clock_secs, config.increment_secs, now),
            now,
        );
        session.white = Some(creator);

        debug!(session_id = %id, ?visibility, "session created");
        let handle = Arc::new(Mutex::new(session));
        self.sessions.insert(id, handle.clone());
        handle
    }

    fn allocate_invite_code(&self, id: &SessionId) -> InviteCode {
        loop {
            let candidate = self.issuer.invite_code();
            match self.invite_codes.entry(candidate.clone()) {
                Entry::Occupied(_) => continue,
                Entry::Vacant(slot) => {
                    slot.insert(id.clone());
                    return candidate;
                }
            }
        }
    }

    pub fn get(&self, id: &SessionId) -> Option<SessionHandle> {
        self.sessions.get(id).map(|e| e.value().clone())
    }

    /// Resolves an invite code to its session handle. The code is
    /// already normalized by `InviteCode`, so lookups are effectively
    /// case-insensitive.
    pub fn get_by_invite_code(&self, code: &InviteCode) -> Option<SessionHandle> {
        let id = self.invite_codes.get(code).map(|e| e.value().clone())?;
        self.get(&id)
    }

    /// Destroys a session: invite mapping first, then the session entry,
    /// so a resolvable code never dangles.
    pub fn remove(&self, id: &SessionId) -> Option<SessionHandle> {
        self.invite_codes.retain(|_, v| v != id);
        let removed = self.sessions.remove(id).map(|(_, h)| h);
        if removed.is_some() {
            debug!(session_id = %id, "session removed");
        }
        removed
    }

    /// Clones out the current set of session handles. Takes no session
    /// locks; callers lock each handle individually if they need state.
    pub fn list(&self) -> Vec<SessionHandle> {
        self.sessions.iter().map(|e| e.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
