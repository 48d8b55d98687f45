//! `GambitServer` builder and accept loop.
//!
//! This is the entry point for running a Gambit chess server. It ties
//! the layers together: transport → protocol → session coordinator.

use std::sync::Arc;

use gambit_protocol::{Codec, JsonCodec};
use gambit_session::{SessionConfig, SessionCoordinator};
use gambit_transport::{Transport, WebSocketTransport};

use crate::GambitError;
use crate::handler::handle_connection;

/// Shared server state passed to each connection handler task.
///
/// The coordinator is internally concurrent (sharded maps, per-session
/// mutexes), so no outer lock wraps it.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) coordinator: SessionCoordinator,
    pub(crate) codec: C,
}

/// Builder for configuring and starting a Gambit server.
///
/// # Example
///
/// ```rust,ignore
/// use gambit::GambitServer;
///
/// let server = GambitServer::builder()
///     .bind("0.0.0.0:8080")
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct GambitServerBuilder {
    bind_addr: String,
    session_config: SessionConfig,
}

impl GambitServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            session_config: SessionConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the session configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Binds the listener and builds the server. Uses `JsonCodec` and
    /// `WebSocketTransport`, the stack browser clients speak.
    pub async fn build(self) -> Result<GambitServer<JsonCodec>, GambitError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            coordinator: SessionCoordinator::new(self.session_config),
            codec: JsonCodec,
        });

        Ok(GambitServer { transport, state })
    }
}

impl Default for GambitServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Gambit server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct GambitServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl<C> GambitServer<C>
where
    C: Codec + Clone,
{
    /// Creates a new builder.
    pub fn builder() -> GambitServerBuilder {
        GambitServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the server accept loop.
    ///
    /// Each accepted connection gets its own handler task. Runs until
    /// the process is terminated.
    pub async fn run(mut self) -> Result<(), GambitError> {
        tracing::info!("Gambit server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
