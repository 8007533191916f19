use crate::api::{handlers, middleware, ApiState};
use crate::config::ApiConfig;
use crate::error::{Result, UserSyncError};
use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Operator API server
pub struct ApiServer {
    config: ApiConfig,
    state: ApiState,
}

impl ApiServer {
    pub fn new(config: ApiConfig, state: ApiState) -> Self {
        Self { config, state }
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let router = Router::new()
            // Health and status
            .route("/health", get(handlers::health))
            .route("/status", get(handlers::status))
            // Direction control
            .route("/directions/:direction/run", post(handlers::run_direction))
            .route("/directions/:direction/start", put(handlers::start_direction))
            .route("/directions/:direction/stop", put(handlers::stop_direction))
            .route(
                "/directions/:direction/watermark",
                delete(handlers::reset_watermark),
            )
            // Metrics endpoint
            .route("/metrics", get(handlers::get_metrics))
            .layer(axum_middleware::from_fn(middleware::track_metrics))
            .layer(TraceLayer::new_for_http());

        let router = if self.config.cors.enabled {
            router.layer(CorsLayer::permissive())
        } else {
            router
        };

        router.with_state(self.state.clone())
    }

    /// Serve until `shutdown` resolves
    pub async fn start<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.build_router();

        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .map_err(|e| UserSyncError::Configuration(format!("Invalid API address: {}", e)))?;

        info!("Starting API server on {}", addr);

        // Try to bind with retries
        let mut retry_count = 0;
        let max_retries = 3;
        let listener = loop {
            match tokio::net::TcpListener::bind(addr).await {
                Ok(listener) => break listener,
                Err(e) if retry_count < max_retries => {
                    warn!(
                        "Failed to bind to {}: {}. Retrying in 2 seconds... ({}/{})",
                        addr,
                        e,
                        retry_count + 1,
                        max_retries
                    );
                    retry_count += 1;
                    tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;
                }
                Err(e) => {
                    error!("Failed to bind to {} after {} retries: {}", addr, max_retries, e);
                    return Err(UserSyncError::Io(e));
                }
            }
        };

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(UserSyncError::Io)?;

        info!("API server stopped gracefully");
        Ok(())
    }
}

/// Resolves on Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received shutdown signal");
}
