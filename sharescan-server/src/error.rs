use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Another operation is already running")]
    OperationRunning,

    #[error("{0}")]
    MissingInput(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::OperationRunning => StatusCode::CONFLICT,
            ApiError::MissingInput(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(source) => {
                error!(error = %source, "Unhandled handler error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = ErrorResponse {
            success: false,
            message: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}
