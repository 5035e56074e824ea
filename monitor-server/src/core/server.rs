//! Server Implementation
//!
//! HTTP 服务器启动和管理

use crate::api::build_app;
use crate::core::tasks::BackgroundTasks;
use crate::core::{Config, ServerState};
use crate::utils::AppError;

/// HTTP Server
pub struct Server {
    config: Config,
    state: ServerState,
    tasks: BackgroundTasks,
}

impl Server {
    /// Create server with initialized state and registered background tasks
    pub fn with_state(config: Config, state: ServerState, tasks: BackgroundTasks) -> Self {
        Self {
            config,
            state,
            tasks,
        }
    }

    /// Serve until Ctrl-C, then drain background tasks
    pub async fn run(self) -> Result<(), AppError> {
        let app = build_app(&self.state).with_state(self.state.clone());

        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to bind {addr}: {e}")))?;
        tracing::info!("Inventory monitor listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("Shutting down...");
            })
            .await
            .map_err(|e| AppError::Internal(format!("HTTP server error: {e}")))?;

        // HTTP has stopped accepting; stop the engine loops too
        self.tasks.shutdown().await;
        Ok(())
    }
}
