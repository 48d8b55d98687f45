//! Allocation of session ids, invite codes, and fallback identities.

use gambit_protocol::{InviteCode, LogicalId, SessionId};
use gambit_transport::ConnectionId;
use rand::Rng;
use uuid::Uuid;

/// Invite codes are this many characters long.
pub const INVITE_CODE_LEN: usize = 8;

/// Alphabet for invite codes: 32 uppercase letters and digits with the
/// easily-confused symbols (0/O, 1/I) removed, since players read these
/// aloud and type them by hand.
pub const INVITE_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Mints the identifiers the session layer hands out.
///
/// Stateless; uniqueness of invite codes is the store's job (it retries
/// against its live index on collision).
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityIssuer;

impl IdentityIssuer {
    /// A fresh globally-unique session id.
    pub fn session_id(&self) -> SessionId {
        SessionId::new(Uuid::new_v4().to_string())
    }

    /// A random candidate invite code. Not guaranteed unique — callers
    /// must check against live codes and re-draw on collision.
    pub fn invite_code(&self) -> InviteCode {
        let mut rng = rand::rng();
        let code: String = (0..INVITE_CODE_LEN)
            .map(|_| {
                let idx = rng.random_range(0..INVITE_CODE_ALPHABET.len());
                INVITE_CODE_ALPHABET[idx] as char
            })
            .collect();
        InviteCode::new(code)
    }

    /// The logical identity used when a client supplies none: derived
    /// from the connection, so it does not survive a reconnect. Clients
    /// that want reconnect support must send their own stable id.
    pub fn logical_id_for(&self, connection: ConnectionId) -> LogicalId {
        LogicalId::new(format!("conn-{}", connection.into_inner()))
    }

    /// Display name used when a client supplies none.
    pub fn anonymous_name(&self, logical: &LogicalId) -> String {
        let tail: String = logical.as_str().chars().rev().take(6).collect();
        let tail: String = tail.chars().rev().collect();
        format!("Player_{tail}")
    }
}
