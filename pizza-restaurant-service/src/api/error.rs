use axum::{http::StatusCode, response::Json};
use tracing::error;

use crate::api::models::{ApiErrorResponse, ApiErrorsResponse};
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),
    #[error("{}", .0.join(", "))]
    BadRequest(Vec<String>),
    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(err) => ApiError::BadRequest(vec![err.to_string()]),
            StoreError::ReferentialIntegrity(messages) => ApiError::BadRequest(messages),
            err => ApiError::InternalError(err.to_string()),
        }
    }
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            ApiError::NotFound(error) => {
                (StatusCode::NOT_FOUND, Json(ApiErrorResponse { error })).into_response()
            }
            ApiError::BadRequest(errors) => {
                (StatusCode::BAD_REQUEST, Json(ApiErrorsResponse { errors })).into_response()
            }
            ApiError::InternalError(detail) => {
                error!(%detail, "request failed");
                let body = Json(ApiErrorResponse {
                    error: "Internal server error".to_string(),
                });
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
        }
    }
}
