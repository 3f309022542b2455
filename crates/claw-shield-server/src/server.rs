//! Login server implementation.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use claw_shield::BruteForceShield;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::routes::create_router;
use crate::state::AppState;

/// HTTP server exposing a login endpoint behind a [`BruteForceShield`].
#[derive(Debug, Clone)]
pub struct ShieldServer {
    state: Arc<AppState>,
}

impl ShieldServer {
    /// Create a new server around an existing shield.
    #[must_use]
    pub fn new(config: ServerConfig, shield: Arc<BruteForceShield>) -> Self {
        Self {
            state: Arc::new(AppState::new(config, shield)),
        }
    }

    /// Get the shared state.
    #[must_use]
    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    /// Build the router without binding a socket.
    #[must_use]
    pub fn router(&self) -> Router {
        create_router(self.state())
    }

    /// Start the server and run until a fatal error.
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the configured address fails.
    pub async fn serve(&self) -> ServerResult<()> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Start the server, shutting down gracefully once `shutdown` completes.
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the configured address fails.
    pub async fn serve_with_shutdown<F>(&self, shutdown: F) -> ServerResult<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let addr = self.state.config().bind_addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindFailed(addr, e))?;

        info!(addr = %addr, "Login server listening");

        let service = self
            .router()
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, service)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))?;

        info!("Login server stopped");
        Ok(())
    }
}
