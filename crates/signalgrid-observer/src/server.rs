//! Observer HTTP server lifecycle management.
//!
//! Binding and serving are separate steps so the engine can report a bad
//! address or a taken port before it starts ticking, then run the server
//! as a background task next to the tick loop. The server drains its open
//! requests and exits when its shutdown future resolves.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::router::build_router;
use crate::state::AppState;

/// Bind address for the Observer server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// The host address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// The TCP port to listen on (0 picks a free port).
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

impl ServerConfig {
    /// The `host:port` socket address to bind.
    pub fn socket_addr(&self) -> Result<SocketAddr, ServerError> {
        let raw = format!("{}:{}", self.host, self.port);
        raw.parse()
            .map_err(|e| ServerError::Bind(format!("invalid address {raw}: {e}")))
    }
}

/// A bound, not yet serving, Observer server.
#[derive(Debug)]
pub struct ObserverServer {
    listener: TcpListener,
    addr: SocketAddr,
}

impl ObserverServer {
    /// Bind the listener for `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address is invalid or the
    /// port cannot be bound.
    pub async fn bind(config: &ServerConfig) -> Result<Self, ServerError> {
        let requested = config.socket_addr()?;
        let listener = TcpListener::bind(requested)
            .await
            .map_err(|e| ServerError::Bind(format!("bind failed on {requested}: {e}")))?;
        let addr = listener
            .local_addr()
            .map_err(|e| ServerError::Bind(format!("no local address for {requested}: {e}")))?;
        Ok(Self { listener, addr })
    }

    /// The address actually bound.
    pub const fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serve requests until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Serve`] on a fatal I/O error.
    pub async fn serve<F>(self, state: Arc<AppState>, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!(addr = %self.addr, "Observer server listening");
        axum::serve(self.listener, build_router(state))
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Serve(format!("serve error: {e}")))?;
        info!(addr = %self.addr, "Observer server stopped");
        Ok(())
    }
}

/// Errors that can occur when starting or running the Observer server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to the network address.
    #[error("bind error: {0}")]
    Bind(String),

    /// The server encountered a fatal error while serving.
    #[error("serve error: {0}")]
    Serve(String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use signalgrid_core::command::CommandInterface;
    use signalgrid_core::config::ControllerConfig;
    use signalgrid_core::registry::LightRegistry;
    use signalgrid_types::TrafficLightInit;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;

    use super::*;

    #[test]
    fn default_binds_all_interfaces() {
        let addr = ServerConfig::default().socket_addr();
        assert!(matches!(addr, Ok(a) if a.port() == 8080 && a.ip().is_unspecified()));
    }

    #[test]
    fn bad_host_is_bind_error() {
        let config = ServerConfig {
            host: "not a host".to_owned(),
            port: 8080,
        };
        assert!(matches!(config.socket_addr(), Err(ServerError::Bind(_))));
    }

    #[tokio::test]
    async fn serves_over_tcp_until_shutdown() {
        let registry = Arc::new(LightRegistry::new(&ControllerConfig::default()));
        registry
            .register(TrafficLightInit::new("Main & 5th", "Downtown"))
            .unwrap();
        let state = Arc::new(AppState::new(CommandInterface::new(registry)));

        let config = ServerConfig {
            host: "127.0.0.1".to_owned(),
            port: 0,
        };
        let server = ObserverServer::bind(&config).await.unwrap();
        let addr = server.local_addr();
        assert_ne!(addr.port(), 0);
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let serving = tokio::spawn(server.serve(state, async {
            let _ = stop_rx.await;
        }));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /api/summary HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();

        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("\"total\":1"));

        stop_tx.send(()).unwrap();
        assert!(serving.await.unwrap().is_ok());
    }
}
