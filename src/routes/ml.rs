use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};

use crate::{
    error::AppError,
    models::{AnomalyQuery, ForecastRequest, SegmentationRequest},
    routes::run_blocking,
    services::{
        forecast::{self, ForecastResult},
        insights::{self, Recommendation},
        outliers::{self, AnomalyReport},
        segmentation::{self, SegmentationResult},
    },
    AppState,
};

const FORECAST_PERIODS: RangeInclusive<usize> = 1..=12;
const CLUSTER_COUNTS: RangeInclusive<usize> = 2..=10;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/forecast", post(forecast_sales))
        .route("/segment", post(segment_customers))
        .route("/anomalies", get(detect_anomalies))
        .route("/recommendations", get(generate_recommendations))
}

fn check_range(name: &str, value: usize, range: RangeInclusive<usize>) -> Result<(), AppError> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(AppError::InvalidInput(format!(
            "{} must be between {} and {}",
            name,
            range.start(),
            range.end()
        )))
    }
}

async fn forecast_sales(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ForecastRequest>,
) -> Result<Json<ForecastResult>, AppError> {
    check_range("periods", request.periods, FORECAST_PERIODS)?;
    let table = state.store.active()?;

    let result = run_blocking(move || Ok(forecast::forecast(&table, request.periods)?)).await?;
    Ok(Json(result))
}

async fn segment_customers(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SegmentationRequest>,
) -> Result<Json<SegmentationResult>, AppError> {
    check_range("n_clusters", request.n_clusters, CLUSTER_COUNTS)?;
    let table = state.store.active()?;
    let seed = state.config.random_seed;
    let start = Instant::now();

    let result = run_blocking(move || Ok(segmentation::segment(&table, request.n_clusters, seed)?)).await?;
    tracing::info!("Segmentation into {} clusters took {:?}", request.n_clusters, start.elapsed());
    Ok(Json(result))
}

async fn detect_anomalies(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AnomalyQuery>,
) -> Result<Json<AnomalyReport>, AppError> {
    let table = state.store.active()?;
    let report = outliers::detect_anomalies(&table, query.threshold)?;
    tracing::info!("Found {} anomalies at threshold {}", report.anomaly_count, query.threshold);
    Ok(Json(report))
}

async fn generate_recommendations(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Recommendation>>, AppError> {
    let table = state.store.active()?;
    Ok(Json(insights::generate_recommendations(&table)))
}
