use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::error;

use crate::shared::response::ApiResponse;

/// Boundary error for every HTTP handler. Handlers translate storage and
/// validation failures into one of these; nothing is fatal to the process.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Authentication(&'static str),
    #[error("{0}")]
    Configuration(&'static str),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Persistence(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Authentication(msg) => (StatusCode::UNAUTHORIZED, (*msg).to_string()),
            Self::Configuration(detail) => {
                error!("Configuration error: {detail}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Server configuration error".to_string(),
                )
            }
            Self::NotFound(what) => (StatusCode::NOT_FOUND, format!("{what} not found")),
            Self::Persistence(detail) => {
                error!("Persistence error: {detail}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Storage error".to_string(),
                )
            }
        };

        (
            status,
            Json(ApiResponse::<serde_json::Value>::error(&message)),
        )
            .into_response()
    }
}

impl From<diesel::result::Error> for ApiError {
    fn from(err: diesel::result::Error) -> Self {
        use diesel::result::{DatabaseErrorKind, Error};
        match err {
            Error::NotFound => Self::NotFound("record"),
            Error::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                Self::Validation(format!("duplicate record: {}", info.message()))
            }
            other => Self::Persistence(other.to_string()),
        }
    }
}
