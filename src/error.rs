//! Error types for the bookstore server

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::db::DbError;

/// Error codes reported to API clients in `ErrorCode`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ErrorCode {
    Internal = 0,
    InvalidJsonBody = 30,
    InvalidCredentials = 201,
    EntityNotFound = 404,
    Validation = 500,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad request: {cause}")]
    BadRequest { cause: String, code: ErrorCode },

    #[error("Not authenticated: {0}")]
    NotAuthenticated(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{cause}: {source}")]
    Database {
        cause: String,
        #[source]
        source: DbError,
    },

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(cause: impl Into<String>) -> Self {
        AppError::BadRequest {
            cause: cause.into(),
            code: ErrorCode::Validation,
        }
    }

    pub fn invalid_json(cause: impl Into<String>) -> Self {
        AppError::BadRequest {
            cause: cause.into(),
            code: ErrorCode::InvalidJsonBody,
        }
    }

    /// Wrap a database failure with the operation that hit it
    pub fn database(cause: impl Into<String>) -> impl FnOnce(DbError) -> Self {
        let cause = cause.into();
        move |source| AppError::Database { cause, source }
    }
}

impl From<DbError> for AppError {
    fn from(source: DbError) -> Self {
        AppError::Database {
            cause: "Database error".to_string(),
            source,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!("Rejected request body: {}", rejection.body_text());
        AppError::invalid_json("Failed to decode JSON")
    }
}

/// Error response body
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorResponse {
    pub error_code: i32,
    pub cause: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, cause) = match self {
            AppError::BadRequest { cause, code } => (StatusCode::BAD_REQUEST, code, cause),
            AppError::NotAuthenticated(cause) => {
                (StatusCode::UNAUTHORIZED, ErrorCode::InvalidCredentials, cause)
            }
            AppError::Forbidden(cause) => (StatusCode::FORBIDDEN, ErrorCode::Validation, cause),
            AppError::NotFound(cause) => (StatusCode::NOT_FOUND, ErrorCode::EntityNotFound, cause),
            AppError::Database { cause, source } => {
                tracing::error!("{}: {:?}", cause, source);
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Internal, cause)
            }
            AppError::Internal(cause) => {
                tracing::error!("Internal error: {}", cause);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::Internal,
                    "Internal error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error_code: code as i32,
            cause,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
