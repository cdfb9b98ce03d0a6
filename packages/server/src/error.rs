use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::outbox::StoreError;

/// Structured error response returned by all endpoints on failure.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Machine-readable error code. One of: `TOKEN_MISSING`, `TOKEN_INVALID`,
    /// `SERVICE_UNAVAILABLE`.
    #[schema(example = "TOKEN_INVALID")]
    pub code: &'static str,
    /// Human-readable error description.
    #[schema(example = "Invalid cron secret")]
    pub message: String,
}

/// Application-level error type.
#[derive(Debug)]
pub enum AppError {
    TokenMissing,
    TokenInvalid,
    /// The outbox store cannot be reached.
    Unavailable(String),
}

impl AppError {
    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        match self {
            AppError::TokenMissing => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "TOKEN_MISSING",
                    message: "Cron secret required".into(),
                },
            ),
            AppError::TokenInvalid => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "TOKEN_INVALID",
                    message: "Invalid cron secret".into(),
                },
            ),
            AppError::Unavailable(detail) => {
                tracing::error!("Outbox store unavailable: {}", detail);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorBody {
                        code: "SERVICE_UNAVAILABLE",
                        message: "Outbox store unavailable".into(),
                    },
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Unavailable(err.to_string())
    }
}
