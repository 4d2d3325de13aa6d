//! Error responses for admission requests that cannot be evaluated.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Errors returned by the admission API for requests it cannot evaluate.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ApiError {
    #[error("Unknown rate limit policy: {0}")]
    UnknownPolicy(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(&'static str),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::UnknownPolicy(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        };

        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
