use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Multipart, Path, Query, State},
    routing::{get, post},
    Json, Router,
};

use crate::{
    error::AppError,
    models::{DataResponse, GenerateQuery, LoadResponse, PreviewQuery, PreviewResponse, TableRecords},
    services::{loader, sample_data::{self, SampleKind}},
    AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/upload", post(upload_file))
        .route("/generate/:data_type", get(generate_sample_data))
        .route("/preview", get(get_preview))
        .route("/raw", get(get_raw_data))
        .route("/cleaned", get(get_cleaned_data))
}

async fn upload_file(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<LoadResponse>, AppError> {
    let start = Instant::now();

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        // reject the extension before reading the body
        loader::UploadFormat::from_filename(&filename)?;

        let data = field.bytes().await?;
        if data.len() > state.config.max_upload_size {
            return Err(AppError::InvalidInput(format!(
                "File too large: {} bytes (limit {})",
                data.len(),
                state.config.max_upload_size
            )));
        }
        tracing::info!("Received upload {} ({} bytes)", filename, data.len());

        let table = loader::load_upload(&filename, data)?;
        let response = LoadResponse::new(format!("Successfully loaded {} rows", table.row_count()), &table);
        state.store.load(table);

        tracing::info!("Upload processed in {:?}", start.elapsed());
        return Ok(Json(response));
    }

    Err(AppError::InvalidInput("Missing multipart field 'file'".to_string()))
}

async fn generate_sample_data(
    State(state): State<Arc<AppState>>,
    Path(data_type): Path<String>,
    Query(query): Query<GenerateQuery>,
) -> Result<Json<LoadResponse>, AppError> {
    let kind: SampleKind = data_type.parse()?;
    let table = sample_data::generate(kind, query.size, state.config.random_seed)?;
    tracing::info!("Generated {} {} records", table.row_count(), kind);

    let response = LoadResponse::new(format!("Generated {} {} records", table.row_count(), kind), &table);
    state.store.load(table);
    Ok(Json(response))
}

async fn get_preview(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PreviewQuery>,
) -> Result<Json<PreviewResponse>, AppError> {
    let raw = state.store.raw()?;
    let limit = query.limit.min(state.config.max_rows_preview);

    Ok(Json(PreviewResponse {
        total_rows: raw.row_count(),
        data: TableRecords::head(raw, limit),
        has_cleaned: state.store.has_cleaned(),
    }))
}

async fn get_raw_data(State(state): State<Arc<AppState>>) -> Result<Json<DataResponse>, AppError> {
    let raw = state.store.raw()?;
    Ok(Json(DataResponse {
        count: raw.row_count(),
        data: TableRecords::all(raw),
    }))
}

async fn get_cleaned_data(State(state): State<Arc<AppState>>) -> Result<Json<DataResponse>, AppError> {
    let cleaned = state.store.cleaned()?;
    Ok(Json(DataResponse {
        count: cleaned.row_count(),
        data: TableRecords::all(cleaned),
    }))
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};

    fn multipart_upload(filename: &str, content: &str) -> Request<Body> {
        let boundary = "X-BOUNDARY";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\nContent-Type: text/csv\r\n\r\n{c}\r\n--{b}--\r\n",
            b = boundary,
            f = filename,
            c = content
        );
        Request::post("/api/data/upload")
            .header("content-type", format!("multipart/form-data; boundary={}", boundary))
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_generate_then_preview() {
        let (app, _) = app();
        let (status, body) = get(&app, "/api/data/generate/sales?size=50").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Generated 50 sales records");
        assert_eq!(body["rows"], 50);
        assert_eq!(body["columns"], 8);

        let (status, body) = get(&app, "/api/data/preview?limit=3").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 3);
        assert_eq!(body["total_rows"], 50);
        assert_eq!(body["has_cleaned"], false);
        assert_eq!(body["data"][0]["id"], 1.0);
    }

    #[tokio::test]
    async fn test_unknown_sample_kind() {
        let (app, _) = app();
        let (status, body) = get(&app, "/api/data/generate/weather").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().contains("weather"));
    }

    #[tokio::test]
    async fn test_oversized_sample_is_rejected() {
        let (app, state) = app();
        let (status, body) = get(&app, "/api/data/generate/sales?size=100000000000").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "size must be between 1 and 100000");
        assert!(state.store.raw().is_err());
    }

    #[tokio::test]
    async fn test_csv_upload() {
        let (app, state) = app();
        let (status, body) = send(&app, multipart_upload("orders.csv", "product,price\nMouse,10\nLaptop,\n")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Successfully loaded 2 rows");
        assert_eq!(body["headers"], serde_json::json!(["product", "price"]));
        assert_eq!(state.store.raw().unwrap().missing_count(), 1);

        let (status, body) = get(&app, "/api/data/raw").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 2);
        assert!(body["data"][1]["price"].is_null());
    }

    #[tokio::test]
    async fn test_upload_rejects_other_extensions() {
        let (app, _) = app();
        let (status, body) = send(&app, multipart_upload("notes.txt", "a\n1\n")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Only CSV or XLSX files are supported");
    }

    #[tokio::test]
    async fn test_cleaned_requires_cleaning() {
        let (app, _) = app();
        get(&app, "/api/data/generate/customers?size=20").await;
        let (status, body) = get(&app, "/api/data/cleaned").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "No cleaned data available. Run cleaning first.");
    }
}
