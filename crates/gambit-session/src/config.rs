//! Session layer configuration.

/// Tunables for session behavior. Applies to every session the
/// coordinator creates; there is no per-session override.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a disconnected player's seat is held before the
    /// reconnect sweeper may clear it.
    pub reconnect_grace_secs: u64,

    /// Starting time on each player's clock when the game begins.
    pub initial_clock_secs: u64,

    /// Seconds credited back to a player's clock after each of their
    /// moves (Fischer increment). Zero disables the increment.
    pub increment_secs: u64,

    /// Session name used when the creator doesn't supply one.
    pub default_session_name: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect_grace_secs: 30,
            initial_clock_secs: 600,
            increment_secs: 0,
            default_session_name: "Chess Game".to_string(),
        }
    }
}
