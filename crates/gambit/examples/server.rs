//! Runs a Gambit server on port 8080 with default settings.
//!
//! ```sh
//! RUST_LOG=debug cargo run --example server
//! ```

use gambit::{GambitError, GambitServer, SessionConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), GambitError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let server = GambitServer::<gambit::protocol::JsonCodec>::builder()
        .bind("0.0.0.0:8080")
        .session_config(SessionConfig::default())
        .build()
        .await?;

    tracing::info!(addr = %server.local_addr().expect("bound listener"), "listening");
    server.run().await
}
