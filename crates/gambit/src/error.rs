//! Unified error type for the Gambit server.

use gambit_protocol::ProtocolError;
use gambit_transport::TransportError;

/// Top-level error that wraps the layer-specific errors.
///
/// Callers of the `gambit` meta-crate deal with this single type; the
/// `#[from]` impls let `?` convert layer errors automatically. Declined
/// operations are deliberately *not* here — a decline is a normal reply
/// to the client, not an error that ends the connection.
#[derive(Debug, thiserror::Error)]
pub enum GambitError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid frame).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let gambit_err: GambitError = err.into();
        assert!(matches!(gambit_err, GambitError::Transport(_)));
        assert!(gambit_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidFrame("bad".into());
        let gambit_err: GambitError = err.into();
        assert!(matches!(gambit_err, GambitError::Protocol(_)));
        assert!(gambit_err.to_string().contains("bad"));
    }
}
