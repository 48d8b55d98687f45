//! Connection → (session, identity) index.
//!
//! Answers "who is this connection?" without touching any session lock.
//! Bindings are written when a player is seated or re-attached and
//! removed only when the seat itself is retired — a binding outlives
//! the socket it describes, which is what lets a sweep after the grace
//! period still find the right seat to clear.

use dashmap::DashMap;
use gambit_protocol::{LogicalId, SessionId};
use gambit_transport::ConnectionId;

/// What one connection resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub session_id: SessionId,
    pub logical_id: LogicalId,
}

/// Concurrent map from live (or recently live) connections to their
/// session membership.
#[derive(Debug, Default)]
pub struct ConnectionIndex {
    entries: DashMap<ConnectionId, Binding>,
}

impl ConnectionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associates a connection with a seat, replacing any previous
    /// binding for that connection.
    pub fn bind(&self, connection: ConnectionId, session_id: SessionId, logical_id: LogicalId) {
        self.entries.insert(
            connection,
            Binding {
                session_id,
                logical_id,
            },
        );
    }

    pub fn resolve(&self, connection: ConnectionId) -> Option<Binding> {
        self.entries.get(&connection).map(|e| e.value().clone())
    }

    /// Removes a binding; returns what it pointed at, if anything.
    pub fn unbind(&self, connection: ConnectionId) -> Option<Binding> {
        self.entries.remove(&connection).map(|(_, b)| b)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
