use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

mod config;
mod error;
mod logging;
mod routes;
mod services;
mod store;
mod models;

/// Multipart framing on top of the file itself.
const UPLOAD_OVERHEAD: usize = 64 * 1024;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    logging::init_logging()?;

    // Load configuration
    let config = config::load_config()?;

    // Build our application state
    let state = Arc::new(AppState::new(config.clone()));

    let app = Router::new()
        .merge(routes::routes(&config))
        .layer(DefaultBodyLimit::max(config.max_upload_size + UPLOAD_OVERHEAD))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.host, config.port))?;
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// Application state
pub struct AppState {
    pub config: config::Config,
    pub store: store::DatasetStore,
}

impl AppState {
    fn new(config: config::Config) -> Self {
        Self {
            config,
            store: store::DatasetStore::new(),
        }
    }
}
