use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::models::ChainFailure;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unsupported chain: {0}")]
    UnsupportedChain(String),

    #[error("All chain providers failed for {address}")]
    ServiceUnavailable {
        address: String,
        failures: Vec<ChainFailure>,
    },

    #[error("Internal server error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match self {
            AppError::BadRequest(ref msg) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone(), None)
            }
            AppError::UnsupportedChain(ref msg) => (
                StatusCode::BAD_REQUEST,
                "UNSUPPORTED_CHAIN",
                format!("Unsupported chain: {}", msg),
                None,
            ),
            AppError::ServiceUnavailable { ref failures, .. } => (
                StatusCode::SERVICE_UNAVAILABLE,
                "ALL_PROVIDERS_FAILED",
                self.to_string(),
                serde_json::to_value(failures).ok(),
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                self.to_string(),
                None,
            ),
        };

        let body = Json(ErrorResponse {
            success: false,
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details,
            },
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
