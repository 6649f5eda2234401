use axum::{
    response::{IntoResponse, Response},
    http::StatusCode,
};
use serde_json::json;
use axum::Json;
use thiserror::Error;

/// Failures raised by the cleaning and analysis core.
///
/// Both kinds are surfaced to the caller as a rejected request and are never
/// retried internally.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalyticsError {
    /// Missing or invalid column reference, wrong dtype, empty table, bad parameter.
    #[error("{0}")]
    Validation(String),

    /// Too few data points for forecasting, clustering or testing.
    #[error("{0}")]
    InsufficientData(String),
}

impl AnalyticsError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AnalyticsError::Validation(msg.into())
    }

    pub fn insufficient(msg: impl Into<String>) -> Self {
        AnalyticsError::InsufficientData(msg.into())
    }
}

#[derive(Debug)]
pub enum AppError {
    InvalidInput(String),
    NotFound(String),
    IoError(std::io::Error),
    FileProcessingError(String),
    Analytics(AnalyticsError),
    Internal(String),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::InvalidInput(msg) => write!(f, "{}", msg),
            AppError::NotFound(msg) => write!(f, "{}", msg),
            AppError::IoError(err) => write!(f, "IO error: {}", err),
            AppError::FileProcessingError(msg) => write!(f, "{}", msg),
            AppError::Analytics(err) => write!(f, "{}", err),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::IoError(err)
    }
}

impl From<AnalyticsError> for AppError {
    fn from(err: AnalyticsError) -> Self {
        AppError::Analytics(err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        AppError::InvalidInput(format!("Invalid upload: {}", err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::IoError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::FileProcessingError(_) => StatusCode::BAD_REQUEST,
            AppError::Analytics(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::warn!("Request rejected: {}", self);
        }

        let body = Json(json!({
            "detail": self.to_string()
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analytics_error_message_is_flat() {
        let err = AnalyticsError::validation("Column price not found");
        assert_eq!(err.to_string(), "Column price not found");

        let err = AnalyticsError::insufficient("Insufficient data for forecasting");
        assert_eq!(err.to_string(), "Insufficient data for forecasting");
    }

    #[test]
    fn test_app_error_status_codes() {
        let response = AppError::NotFound("No data loaded".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = AppError::from(AnalyticsError::validation("bad column")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = AppError::Internal("boom".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_app_error_keeps_analytics_message() {
        let err: AppError = AnalyticsError::insufficient("need 3 points").into();
        assert_eq!(err.to_string(), "need 3 points");
    }
}
