use std::sync::Arc;
use std::time::Duration;

use axum::{http::HeaderValue, http::Method, routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::{config::Config, error::AppError, AppState};

pub mod analytics;
pub mod cleaning;
pub mod data;
pub mod ml;

pub const SERVICE_NAME: &str = "Data Analytics Platform";

pub fn routes(config: &Config) -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .nest("/api/data", data::routes())
        .nest("/api/cleaning", cleaning::routes())
        .nest("/api/analytics", analytics::routes())
        .nest("/api/ml", ml::routes())
        .layer(cors_layer(&config.cors_origins))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .max_age(Duration::from_secs(3600))
}

async fn root() -> Json<Value> {
    Json(json!({
        "message": format!("{} API", SERVICE_NAME),
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "data": "/api/data",
            "cleaning": "/api/cleaning",
            "analytics": "/api/analytics",
            "ml": "/api/ml",
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
    }))
}

/// Runs CPU-bound analysis off the async worker threads.
pub(crate) async fn run_blocking<T, F>(job: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| AppError::Internal(format!("Analysis task failed: {}", e)))?
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    pub fn app() -> (Router, Arc<AppState>) {
        let config = Config::default();
        let state = Arc::new(AppState::new(config.clone()));
        (routes(&config).with_state(state.clone()), state)
    }

    pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    pub async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
        send(app, Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        send(app, request).await
    }
}
