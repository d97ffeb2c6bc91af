use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::repositories::StoreError;
use crate::upload::UploadRejection;

/// The application's error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed or missing input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A unique-constraint violation, e.g. a duplicate email.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Login failed. Deliberately does not say whether the email exists.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Missing or invalid token, or an action the caller's role never permits.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Valid identity but insufficient privilege or not the owner.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A resource not found error.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The token names an identity the directory no longer holds.
    #[error("Entity not found")]
    EntityNotFound,

    /// An attachment failed the upload pipeline.
    #[error("Upload rejected: {0}")]
    UploadRejected(#[from] UploadRejection),

    /// A storage failure on an account endpoint, answered as a 400 with `message`.
    #[error("Account lookup failed ({message}): {source}")]
    AccountLookup {
        message: &'static str,
        source: StoreError,
    },

    /// A storage adapter failure.
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// An I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Password hashing or token signing failed.
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// An internal server error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut reason = None;

        let (status, message) = match self {
            AppError::Validation(ref msg) => {
                tracing::debug!("Validation error: {}", msg);
                (StatusCode::BAD_REQUEST, msg.clone())
            }

            AppError::Conflict(ref msg) => {
                tracing::debug!("Conflict: {}", msg);
                (StatusCode::BAD_REQUEST, msg.clone())
            }

            AppError::InvalidCredentials => {
                tracing::warn!("Authentication failed");
                (StatusCode::BAD_REQUEST, "Invalid email or password".to_string())
            }

            AppError::Unauthorized(ref msg) => {
                tracing::warn!("Unauthorized: {}", msg);
                (StatusCode::UNAUTHORIZED, msg.clone())
            }

            AppError::Forbidden(ref msg) => {
                tracing::warn!("Forbidden: {}", msg);
                (StatusCode::FORBIDDEN, msg.clone())
            }

            AppError::NotFound(ref msg) => {
                tracing::debug!("Resource not found: {}", msg);
                (StatusCode::NOT_FOUND, msg.clone())
            }

            AppError::EntityNotFound => {
                tracing::debug!("Entity referenced by token not found");
                (StatusCode::BAD_REQUEST, "Entity not found".to_string())
            }

            AppError::UploadRejected(ref rejection) => {
                tracing::debug!("Upload rejected: {}", rejection);
                reason = Some(rejection.reason());
                (StatusCode::BAD_REQUEST, rejection.to_string())
            }

            AppError::AccountLookup {
                message,
                ref source,
            } => {
                tracing::error!("Account lookup failed: {}", source);
                (StatusCode::BAD_REQUEST, message.to_string())
            }

            AppError::Store(ref e) => {
                tracing::error!("Storage error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }

            AppError::Io(ref e) => {
                tracing::error!("IO error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "File system error".to_string())
            }

            AppError::Crypto(ref msg) => {
                tracing::error!("Crypto error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }

            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = match reason {
            Some(reason) => sonic_rs::to_string(&sonic_rs::json!({
                "message": message,
                "reason": reason
            })),
            None => sonic_rs::to_string(&sonic_rs::json!({
                "message": message
            })),
        }
        .unwrap_or_else(|_| r#"{"message":"Internal server error"}"#.to_string());

        (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
    }
}
