//! Listener lifecycle for the voting server.
//!
//! [`start_server`] owns the listener from bind to drain: it serves the
//! voting router until the caller's shutdown future fires (Ctrl-C in the
//! binary), stops accepting, and waits for open requests and `WebSocket`
//! upgrades already handed off to finish their HTTP exchange.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use chessvote_core::config::ServerSection;
use tokio::net::TcpListener;
use tracing::info;

use crate::router::build_router;
use crate::state::AppState;

/// Where the voting server listens, taken from the `server` config
/// section.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind; `0.0.0.0` accepts viewers from any network.
    pub host: String,
    /// Port the browser clients and move senders connect to.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: String::from("0.0.0.0"),
            port: 8080,
        }
    }
}

impl From<&ServerSection> for ServerConfig {
    fn from(section: &ServerSection) -> Self {
        Self {
            host: section.host.clone(),
            port: section.port,
        }
    }
}

impl ServerConfig {
    /// Parse the configured host and port into a socket address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the pair is not a valid address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ServerError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ServerError::Bind(format!("invalid address: {e}")))
    }
}

/// Serve the voting API until `shutdown` resolves.
///
/// Once `shutdown` fires no new connections are accepted; in-flight
/// command requests complete before this returns. The broadcast
/// dispatcher is not stopped here, the caller owns its handle.
///
/// # Errors
///
/// [`ServerError::Bind`] if the address is malformed or taken,
/// [`ServerError::Serve`] if the accept loop fails.
pub async fn start_server<F>(
    config: &ServerConfig,
    state: Arc<AppState>,
    shutdown: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = config.socket_addr()?;
    let router = build_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind(format!("bind failed on {addr}: {e}")))?;

    info!(%addr, "Chessvote server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ServerError::Serve(format!("serve error: {e}")))?;

    info!("Chessvote server drained and stopped");
    Ok(())
}

/// Listener failures surfaced to `main`.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The configured host and port could not be parsed or bound.
    #[error("cannot listen: {0}")]
    Bind(String),

    /// The accept loop stopped with an I/O error before shutdown.
    #[error("server stopped unexpectedly: {0}")]
    Serve(String),
}
