use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};

use crate::{
    error::AppError,
    models::{CleaningConfigRequest, CleaningResults, OutlierQuery},
    routes::run_blocking,
    services::{
        cleaner::{self, CleaningOptions},
        outliers::{self, OutlierReport},
        quality::{self, QualityMetrics},
    },
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/quality", get(assess_quality))
        .route("/clean", post(clean_data))
        .route("/outliers", get(detect_outliers))
}

async fn assess_quality(State(state): State<Arc<AppState>>) -> Result<Json<QualityMetrics>, AppError> {
    let raw = state.store.raw()?;
    Ok(Json(quality::assess(&raw)))
}

async fn clean_data(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CleaningConfigRequest>,
) -> Result<Json<CleaningResults>, AppError> {
    let start = Instant::now();
    let raw = state.store.raw()?;
    let options = CleaningOptions {
        strategy: request.strategy,
        remove_duplicates: request.remove_duplicates,
        standardize: request.standardize_data,
        seed: state.config.random_seed,
    };
    tracing::info!(
        "Cleaning {} rows with strategy {} (dedupe: {}, standardize: {})",
        raw.row_count(),
        options.strategy,
        options.remove_duplicates,
        options.standardize
    );

    let source = raw.clone();
    let (cleaned, stats) = run_blocking(move || Ok(cleaner::clean(&source, &options)?)).await?;
    let results = CleaningResults {
        success: true,
        stats,
        strategy_used: options.strategy,
        final_rows: cleaned.row_count(),
        final_columns: cleaned.column_count(),
    };
    state.store.commit_cleaned(&raw, cleaned)?;

    tracing::info!(
        "Cleaning filled {}/{} missing values, removed {} duplicates in {:?}",
        stats.missing_filled,
        stats.missing_found,
        stats.duplicates_removed,
        start.elapsed()
    );
    Ok(Json(results))
}

async fn detect_outliers(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OutlierQuery>,
) -> Result<Json<OutlierReport>, AppError> {
    let table = state.store.active()?;
    Ok(Json(outliers::detect_outliers(&table, query.threshold)?))
}
