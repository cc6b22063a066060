//! Web server for the data room service.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;

use crate::config::Config;
use crate::{DataRoomError, Database, Result};

use super::handlers::AppState;
use super::router::{create_health_router, create_openapi_router, create_router};

/// Web server for the API.
pub struct WebServer {
    /// Server address.
    addr: SocketAddr,
    /// Application state.
    app_state: Arc<AppState>,
    /// Allowed CORS origins.
    cors_origins: Vec<String>,
    /// Request body limit in bytes.
    max_body_bytes: usize,
    /// Interval of the completion sweep.
    sweep_interval: Duration,
}

impl WebServer {
    /// Create a new web server, opening the chunk and file stores.
    pub fn new(config: &Config, db: Database) -> Result<Self> {
        let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
            .parse()
            .map_err(|e| {
                DataRoomError::Config(format!(
                    "invalid server address {}:{}: {}",
                    config.server.host, config.server.port, e
                ))
            })?;

        let app_state = AppState::from_config(Arc::new(db), config)?;
        tracing::info!(
            "Storage initialized (staging: {}, files: {})",
            config.storage.staging_path,
            config.storage.files_path
        );

        Ok(Self {
            addr,
            app_state: Arc::new(app_state),
            cors_origins: config.server.cors_origins.clone(),
            max_body_bytes: config.max_chunk_bytes(),
            sweep_interval: Duration::from_secs(config.upload.sweep_interval_secs),
        })
    }

    /// Get the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Start the completion sweep background task.
    ///
    /// Sessions whose chunks are all staged but which were never published
    /// (a failed assembly, a crash between chunk and publish) are completed
    /// here.
    fn start_sweep_task(state: Arc<AppState>, period: Duration) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);

            // Skip the first immediate tick
            interval.tick().await;

            loop {
                interval.tick().await;

                match state.upload_service().sweep().await {
                    Ok(count) => {
                        if count > 0 {
                            tracing::info!(published_count = count, "Completed stalled uploads");
                        } else {
                            tracing::debug!("No stalled uploads to complete");
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to sweep upload sessions");
                    }
                }
            }
        });
    }

    fn build_router(&self) -> Router {
        create_router(
            self.app_state.clone(),
            &self.cors_origins,
            self.max_body_bytes,
        )
        .merge(create_health_router())
        .merge(create_openapi_router())
    }

    async fn bind(&self) -> std::io::Result<(TcpListener, SocketAddr)> {
        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;

        Self::start_sweep_task(self.app_state.clone(), self.sweep_interval);
        tracing::info!(
            "Upload sweep task started (runs every {}s)",
            self.sweep_interval.as_secs()
        );

        tracing::info!("Web server listening on http://{}", local_addr);
        Ok((listener, local_addr))
    }

    /// Run the web server.
    pub async fn run(self) -> std::io::Result<()> {
        let router = self.build_router();
        let (listener, _) = self.bind().await?;
        axum::serve(listener, router).await
    }

    /// Run the server and return the actual bound address.
    ///
    /// This is useful for testing when binding to port 0.
    pub async fn run_with_addr(self) -> std::io::Result<SocketAddr> {
        let router = self.build_router();
        let (listener, local_addr) = self.bind().await?;

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!("Web server error: {}", e);
            }
        });

        Ok(local_addr)
    }
}
