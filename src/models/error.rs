use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::StoreError;

/// Response for an error
#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct ErrorResponse {
    pub code: u16,
    pub status: String,
    pub error: String,
}

/// Error half of every handler result.
pub type ApiError = (StatusCode, Json<ErrorResponse>);

impl ErrorResponse {
    pub fn with_status(status: StatusCode, error: impl Into<String>) -> ApiError {
        (
            status,
            Json(ErrorResponse {
                code: status.as_u16(),
                status: status.to_string(),
                error: error.into(),
            }),
        )
    }

    /// Map a store failure to its HTTP status. `not_found` is the message
    /// shown when the store reports a missing record.
    pub fn from_store(err: &StoreError, not_found: &str) -> ApiError {
        match err {
            StoreError::NotFound => Self::with_status(StatusCode::NOT_FOUND, not_found),
            StoreError::InvalidInput(message) => {
                Self::with_status(StatusCode::BAD_REQUEST, message.clone())
            }
            StoreError::Database(e) => {
                Self::with_status(StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
            }
        }
    }
}
