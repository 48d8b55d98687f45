//! Deferred cleanup of seats whose player disconnected and stayed away.
//!
//! When a connection drops, the seat is kept and a sweep is scheduled
//! one grace period out. The sweep re-validates everything at fire
//! time under the session lock — the player may have reconnected, the
//! session may be gone — and only then clears the seat. A reconnect
//! doesn't need to cancel anything: it just flips `connected` back on,
//! and the pending sweep sees that and stands down.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use gambit_protocol::{LogicalId, SessionId};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::index::ConnectionIndex;
use crate::store::SessionStore;

/// Schedules and executes grace-period seat sweeps.
#[derive(Debug, Clone)]
pub struct ReconnectSweeper {
    store: Arc<SessionStore>,
    index: Arc<ConnectionIndex>,
    grace_secs: u64,
}

impl ReconnectSweeper {
    pub fn new(store: Arc<SessionStore>, index: Arc<ConnectionIndex>, grace_secs: u64) -> Self {
        Self {
            store,
            index,
            grace_secs,
        }
    }

    /// Spawns a task that sleeps out the grace period and then runs one
    /// sweep for this seat. Fire-and-forget; the handle is returned for
    /// tests that want to await the sweep deterministically.
    pub fn schedule(&self, session_id: SessionId, logical_id: LogicalId) -> JoinHandle<()> {
        let sweeper = self.clone();
        let grace = Duration::from_secs(self.grace_secs);
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            sweeper.sweep_once(&session_id, &logical_id).await;
        })
    }

    /// One sweep attempt. Returns `true` if the seat was cleared.
    ///
    /// Everything is re-checked at fire time: the scheduled state is a
    /// hint, the state under the lock is the truth.
    pub async fn sweep_once(&self, session_id: &SessionId, logical_id: &LogicalId) -> bool {
        let Some(handle) = self.store.get(session_id) else {
            return false;
        };
        let mut session = handle.lock().await;

        let Some(seat) = session.seat_of(logical_id) else {
            return false;
        };
        let Some(player) = session.slot(seat) else {
            return false;
        };

        if player.connected {
            debug!(session_id = %session_id, logical_id = %logical_id, "sweep skipped, player reconnected");
            return false;
        }
        let grace = TimeDelta::seconds(self.grace_secs as i64);
        if Utc::now() - player.last_seen_at < grace {
            // A newer disconnect rescheduled the deadline; that sweep
            // will handle it.
            return false;
        }

        let stale_connection = player.connection_id;
        *session.slot_mut(seat) = None;
        self.index.unbind(stale_connection);
        info!(session_id = %session_id, logical_id = %logical_id, %seat, "seat cleared after grace period");

        if session.is_empty() {
            // Finish before removal so any task still holding this
            // handle sees a terminal session, not a live orphan.
            session.finish();
            self.store.remove(session_id);
            info!(session_id = %session_id, "empty session destroyed");
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::session::PlayerHandle;
    use gambit_protocol::{Color, Visibility};
    use gambit_transport::ConnectionId;

    async fn seeded() -> (Arc<SessionStore>, Arc<ConnectionIndex>, SessionId) {
        let store = Arc::new(SessionStore::new());
        let index = Arc::new(ConnectionIndex::new());
        let creator = PlayerHandle::new(
            LogicalId::new("alice"),
            ConnectionId::new(1),
            "Alice".into(),
            Utc::now(),
        );
        let handle = store.create("Game".into(), Visibility::Public, creator, &SessionConfig::default());
        let id = handle.lock().await.id.clone();
        index.bind(ConnectionId::new(1), id.clone(), LogicalId::new("alice"));
        (store, index, id)
    }

    fn backdate(player: &mut PlayerHandle, secs: i64) {
        player.connected = false;
        player.last_seen_at = Utc::now() - TimeDelta::seconds(secs);
    }

    #[tokio::test]
    async fn test_sweep_skips_connected_player() {
        let (store, index, id) = seeded().await;
        let sweeper = ReconnectSweeper::new(store.clone(), index, 30);

        assert!(!sweeper.sweep_once(&id, &LogicalId::new("alice")).await);
        assert!(store.get(&id).is_some());
    }

    #[tokio::test]
    async fn test_sweep_skips_within_grace_period() {
        let (store, index, id) = seeded().await;
        {
            let handle = store.get(&id).unwrap();
            let mut session = handle.lock().await;
            backdate(session.white.as_mut().unwrap(), 5);
        }
        let sweeper = ReconnectSweeper::new(store.clone(), index, 30);

        assert!(!sweeper.sweep_once(&id, &LogicalId::new("alice")).await);
        let handle = store.get(&id).unwrap();
        assert!(handle.lock().await.white.is_some());
    }

    #[tokio::test]
    async fn test_sweep_clears_seat_and_destroys_empty_session() {
        let (store, index, id) = seeded().await;
        {
            let handle = store.get(&id).unwrap();
            let mut session = handle.lock().await;
            backdate(session.white.as_mut().unwrap(), 31);
        }
        let sweeper = ReconnectSweeper::new(store.clone(), index.clone(), 30);

        assert!(sweeper.sweep_once(&id, &LogicalId::new("alice")).await);
        assert!(store.get(&id).is_none());
        assert!(index.resolve(ConnectionId::new(1)).is_none());
    }

    #[tokio::test]
    async fn test_sweep_keeps_session_while_opponent_remains() {
        let (store, index, id) = seeded().await;
        {
            let handle = store.get(&id).unwrap();
            let mut session = handle.lock().await;
            session.black = Some(PlayerHandle::new(
                LogicalId::new("bob"),
                ConnectionId::new(2),
                "Bob".into(),
                Utc::now(),
            ));
            session.start(Utc::now());
            backdate(session.white.as_mut().unwrap(), 31);
        }
        let sweeper = ReconnectSweeper::new(store.clone(), index, 30);

        assert!(sweeper.sweep_once(&id, &LogicalId::new("alice")).await);
        let handle = store.get(&id).unwrap();
        let session = handle.lock().await;
        assert!(session.white.is_none());
        assert!(session.black.is_some());
        // The game itself stays in progress; the freed seat can be
        // taken by a fresh join.
        assert_eq!(session.active_color, Color::White);
    }

    #[tokio::test]
    async fn test_scheduled_sweep_fires_after_grace() {
        let (store, index, id) = seeded().await;
        {
            let handle = store.get(&id).unwrap();
            let mut session = handle.lock().await;
            backdate(session.white.as_mut().unwrap(), 1);
        }
        let sweeper = ReconnectSweeper::new(store.clone(), index, 0);

        sweeper
            .schedule(id.clone(), LogicalId::new("alice"))
            .await
            .unwrap();
        assert!(store.get(&id).is_none());
    }
}
