use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};

use crate::{
    error::AppError,
    models::{ColumnQuery, DistributionQuery, HypothesisQuery, TrendQuery},
    services::{
        insights::{self, Insight},
        statistics::{
            self, CategoricalDistribution, Correlation, Distribution, FieldSummary, HypothesisTest, Percentiles,
            Trend,
        },
    },
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/summary", get(get_summary))
        .route("/distribution", get(get_distribution))
        .route("/correlation", get(get_correlation))
        .route("/trend", get(get_trend))
        .route("/categorical", get(get_categorical))
        .route("/hypothesis-test", get(get_hypothesis_test))
        .route("/percentiles", get(get_percentiles))
        .route("/insights", get(get_insights))
}

async fn get_summary(State(state): State<Arc<AppState>>) -> Result<Json<Vec<FieldSummary>>, AppError> {
    let table = state.store.active()?;
    Ok(Json(statistics::summary(&table)))
}

async fn get_distribution(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DistributionQuery>,
) -> Result<Json<Distribution>, AppError> {
    let table = state.store.active()?;
    let bins = query.bins.unwrap_or(state.config.default_chart_bins);
    Ok(Json(statistics::distribution(&table, &query.column, bins)?))
}

async fn get_correlation(State(state): State<Arc<AppState>>) -> Result<Json<Correlation>, AppError> {
    let table = state.store.active()?;
    Ok(Json(statistics::correlation(&table)))
}

async fn get_trend(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TrendQuery>,
) -> Result<Json<Trend>, AppError> {
    let table = state.store.active()?;
    Ok(Json(statistics::time_series_trend(&table, &query.date_col, &query.value_col)?))
}

async fn get_categorical(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ColumnQuery>,
) -> Result<Json<CategoricalDistribution>, AppError> {
    let table = state.store.active()?;
    Ok(Json(statistics::categorical_distribution(&table, &query.column)?))
}

async fn get_hypothesis_test(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HypothesisQuery>,
) -> Result<Json<HypothesisTest>, AppError> {
    let table = state.store.active()?;
    Ok(Json(statistics::hypothesis_test(&table, &query.col1, &query.col2)?))
}

async fn get_percentiles(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ColumnQuery>,
) -> Result<Json<Percentiles>, AppError> {
    let table = state.store.active()?;
    Ok(Json(statistics::percentiles(&table, &query.column)?))
}

async fn get_insights(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Insight>>, AppError> {
    let snapshot = state.store.snapshot()?;
    let insights = insights::generate_insights(&snapshot.raw, &snapshot.active());
    tracing::info!("Generated {} insights", insights.len());
    Ok(Json(insights))
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::*;
    use axum::http::StatusCode;

    async fn loaded() -> axum::Router {
        let (app, _) = app();
        get(&app, "/api/data/generate/sales?size=300").await;
        app
    }

    #[tokio::test]
    async fn test_summary_and_correlation() {
        let app = loaded().await;
        let (status, body) = get(&app, "/api/analytics/summary").await;
        assert_eq!(status, StatusCode::OK);
        let fields: Vec<&str> = body.as_array().unwrap().iter().map(|s| s["field"].as_str().unwrap()).collect();
        assert_eq!(fields, vec!["id", "quantity", "price", "revenue", "customer_id"]);

        let (status, body) = get(&app, "/api/analytics/correlation").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["columns"].as_array().unwrap().len(), 5);
        assert!((body["values"][0][0].as_f64().unwrap() - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_distribution_uses_default_bins() {
        let app = loaded().await;
        let (status, body) = get(&app, "/api/analytics/distribution?column=price").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["values"].as_array().unwrap().len(), 10);

        let (status, body) = get(&app, "/api/analytics/distribution?column=nope").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].is_string());

        let (status, body) = get(&app, "/api/analytics/distribution?column=price&bins=18446744073709551615").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "bins must be between 1 and 1000");
    }

    #[tokio::test]
    async fn test_trend_categorical_and_tests() {
        let app = loaded().await;
        let (status, body) = get(&app, "/api/analytics/trend?date_col=date&value_col=revenue").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["labels"].as_array().unwrap().len() >= 12);

        let (status, body) = get(&app, "/api/analytics/categorical?column=region").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["labels"].as_array().unwrap().len(), 4);

        let (status, body) = get(&app, "/api/analytics/hypothesis-test?col1=price&col2=quantity").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["significant"], true);

        let (status, body) = get(&app, "/api/analytics/percentiles?column=quantity").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["column"], "quantity");
    }

    #[tokio::test]
    async fn test_insights() {
        let app = loaded().await;
        let (status, body) = get(&app, "/api/analytics/insights").await;
        assert_eq!(status, StatusCode::OK);
        let insights = body.as_array().unwrap();
        assert!(!insights.is_empty());
        assert!(insights.iter().all(|i| i["confidence"].as_u64().unwrap() <= 100));
    }
}
