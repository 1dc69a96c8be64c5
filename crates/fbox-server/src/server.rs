use std::sync::Arc;

use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::router::build_router;
use crate::state::AppState;

/// fbox HTTP server.
pub struct FboxServer {
    config: ServerConfig,
}

impl FboxServer {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Open the configured stores and build the router (useful for testing).
    pub fn router(&self) -> ServerResult<axum::Router> {
        let state = AppState::open(&self.config)?;
        Ok(build_router(Arc::new(state)))
    }

    /// Serve requests until Ctrl-C.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router()?;
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        tracing::info!("fbox server listening on {}", self.config.bind_addr);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))?;
        tracing::info!("fbox server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
