// HTTP server
// Upload, ask and health endpoints over a shared indexer and answerer

pub mod errors;
pub mod handlers;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::answerer::Answerer;
use crate::config::Config;
use crate::embeddings::{Embedder, embedder_from_config};
use crate::generation::{Generator, generator_from_config};
use crate::indexer::Indexer;

/// State shared by all request handlers
pub struct AppState {
    pub config: Arc<Config>,
    pub indexer: Indexer,
    pub answerer: Answerer,
    /// Serializes writers to the vector store
    pub index_lock: Mutex<()>,
}

impl AppState {
    #[inline]
    pub fn new(
        config: Arc<Config>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self {
            indexer: Indexer::new(Arc::clone(&config), Arc::clone(&embedder)),
            answerer: Answerer::new(Arc::clone(&config), embedder, generator),
            config,
            index_lock: Mutex::new(()),
        }
    }

    /// Build the embedder and generator selected by `config`
    #[inline]
    pub fn from_config(config: Config) -> crate::Result<Self> {
        let embedder = embedder_from_config(&config)?;
        let generator = generator_from_config(&config)?;
        Ok(Self::new(Arc::new(config), embedder, generator))
    }
}

#[inline]
pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.server.max_upload_bytes;

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/upload-pdf", post(handlers::upload_pdf))
        .route("/api/ask", post(handlers::ask))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind to `server.host:server.port` and serve until Ctrl-C
#[inline]
pub async fn serve(config: Config) -> Result<()> {
    let address = config.server.bind_address();
    let state = AppState::from_config(config).context("Failed to initialize services")?;

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;

    info!("Listening on http://{}", address);

    axum::serve(listener, router(Arc::new(state)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
