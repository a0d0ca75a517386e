//! HTTP upload service.
//!
//! A small axum application: upload a PDF, get its page images back.
//! Each upload is rasterised into its own `<output_root>/<job-id>/`
//! directory, so concurrent requests never write to the same files.

mod routes;

pub use routes::router;

use crate::config::{DEFAULT_DPI, DEFAULT_OUTPUT_DIR, DEFAULT_WIDTH};
use crate::error::Pdf2PngError;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Settings for the HTTP service.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on. Default: `127.0.0.1:8080`.
    pub bind: SocketAddr,
    /// Root under which each upload gets its own directory. Default: `image`.
    pub output_root: PathBuf,
    /// Maximum accepted request body in bytes. Default: 64 MiB.
    pub body_limit: usize,
    /// DPI when the request does not specify one.
    pub default_dpi: u32,
    /// Width when the request does not specify one.
    pub default_width: Option<u32>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            output_root: PathBuf::from(DEFAULT_OUTPUT_DIR),
            body_limit: 64 * 1024 * 1024,
            default_dpi: DEFAULT_DPI,
            default_width: Some(DEFAULT_WIDTH),
        }
    }
}

/// Shared, immutable application state.
#[derive(Clone)]
pub struct ServerState {
    inner: Arc<ServerConfig>,
}

impl ServerState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            inner: Arc::new(config),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.inner
    }
}

/// The full application with tracing and CORS layers.
pub fn app(state: ServerState) -> axum::Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Run the service until Ctrl+C or SIGTERM.
pub async fn serve(config: ServerConfig) -> Result<(), Pdf2PngError> {
    let bind = config.bind;
    tokio::fs::create_dir_all(&config.output_root)
        .await
        .map_err(|e| Pdf2PngError::OutputWriteFailed {
            path: config.output_root.clone(),
            source: e,
        })?;

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|e| Pdf2PngError::Internal(format!("Failed to bind {}: {}", bind, e)))?;
    tracing::info!("pdf2png listening on http://{}", bind);

    axum::serve(listener, app(ServerState::new(config)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Pdf2PngError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
