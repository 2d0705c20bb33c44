//! Structured error handling for REST handlers.
//!
//! Every fallible operation in the workspace returns [`AppError`], which renders
//! as an HTTP status plus a JSON body `{"error": "..."}`.
//! Internal details are logged but never exposed to clients.

use std::fmt::Display;

use axum::Json;
use axum::response::{IntoResponse, Response};
use http::{StatusCode, header};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Application error type with automatic HTTP response conversion.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Unprocessable: {0}")]
    Unprocessable(String),

    #[error("Bad gateway: {0}")]
    BadGateway(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("Gateway timeout: {0}")]
    GatewayTimeout(String),

    #[error("Internal: {0}")]
    Internal(String),
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl AppError {
    /// Create a not found error for an entity.
    pub fn not_found(entity: &str, id: impl Display) -> Self {
        Self::NotFound(format!("{entity} not found: {id}"))
    }

    /// Create a conflict error for duplicate data.
    #[must_use]
    pub fn conflict(entity: &str, field: &str) -> Self {
        Self::Conflict(format!("{entity} with this {field} already exists"))
    }

    /// HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::PermissionDenied(_) => StatusCode::FORBIDDEN,
            Self::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) | Self::AlreadyExists(_) => StatusCode::CONFLICT,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::BadGateway(_) => StatusCode::BAD_GATEWAY,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::GatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to clients.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::NotFound(msg)
            | Self::Unauthenticated(msg)
            | Self::PermissionDenied(msg)
            | Self::InvalidArgument(msg)
            | Self::Conflict(msg)
            | Self::AlreadyExists(msg)
            | Self::PayloadTooLarge(msg)
            | Self::UnsupportedMediaType(msg)
            | Self::Unprocessable(msg)
            | Self::BadGateway(msg)
            | Self::Unavailable(msg)
            | Self::GatewayTimeout(msg) => msg.clone(),
            Self::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Self::Internal(msg) = &self {
            error!(error = %msg, "Internal error");
        }

        let status = self.status_code();
        let body = Json(ErrorBody {
            error: self.public_message(),
        });

        if matches!(self, Self::Unauthenticated(_)) {
            (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response()
        } else {
            (status, body).into_response()
        }
    }
}

/// Result alias used by handlers.
pub type AppResult<T> = Result<T, AppError>;

/// Extension trait for converting foreign errors to `AppError::Internal` with logging.
pub trait StatusExt<T> {
    /// Convert error to an internal error with logging.
    ///
    /// # Errors
    /// Returns `AppError::Internal` with the provided message.
    fn status(self, msg: &'static str) -> Result<T, AppError>;
}

impl<T, E: Display> StatusExt<T> for Result<T, E> {
    fn status(self, msg: &'static str) -> Result<T, AppError> {
        self.map_err(|e| {
            error!(error = %e, "{msg}");
            AppError::Internal(msg.to_string())
        })
    }
}

/// Extension trait for Option types.
pub trait OptionStatusExt<T> {
    /// Convert `None` to `AppError::NotFound`.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the option is `None`.
    fn ok_or_not_found(self, msg: &'static str) -> Result<T, AppError>;
}

impl<T> OptionStatusExt<T> for Option<T> {
    fn ok_or_not_found(self, msg: &'static str) -> Result<T, AppError> {
        self.ok_or_else(|| AppError::NotFound(msg.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn not_found_helper_formats_correctly() {
        let err = AppError::not_found("Assessment", "abc-123");
        assert!(err.to_string().contains("Assessment"));
        assert!(err.to_string().contains("abc-123"));
    }

    #[test]
    fn conflict_helper_formats_correctly() {
        let err = AppError::conflict("User", "email");
        assert!(err.to_string().contains("User"));
        assert!(err.to_string().contains("email"));
    }

    #[test]
    fn status_codes_map_correctly() {
        let cases = [
            (AppError::NotFound(String::new()), StatusCode::NOT_FOUND),
            (AppError::Unauthenticated(String::new()), StatusCode::UNAUTHORIZED),
            (AppError::PermissionDenied(String::new()), StatusCode::FORBIDDEN),
            (AppError::InvalidArgument(String::new()), StatusCode::BAD_REQUEST),
            (AppError::AlreadyExists(String::new()), StatusCode::CONFLICT),
            (AppError::PayloadTooLarge(String::new()), StatusCode::PAYLOAD_TOO_LARGE),
            (
                AppError::UnsupportedMediaType(String::new()),
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ),
            (AppError::Unprocessable(String::new()), StatusCode::UNPROCESSABLE_ENTITY),
            (AppError::BadGateway(String::new()), StatusCode::BAD_GATEWAY),
            (AppError::Unavailable(String::new()), StatusCode::SERVICE_UNAVAILABLE),
            (AppError::GatewayTimeout(String::new()), StatusCode::GATEWAY_TIMEOUT),
            (AppError::Internal(String::new()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(err.status_code(), expected, "{err}");
        }
    }

    #[tokio::test]
    async fn internal_details_are_hidden() {
        let response = AppError::Internal("connection refused at 10.0.0.3".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Internal server error");
    }

    #[tokio::test]
    async fn unauthenticated_sets_challenge_header() {
        let response = AppError::Unauthenticated("Authentication required".into()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
        let body = body_json(response).await;
        assert_eq!(body["error"], "Authentication required");
    }

    #[test]
    fn status_ext_maps_to_internal() {
        let result: Result<(), &str> = Err("boom");
        assert!(matches!(
            result.status("Failed to do thing"),
            Err(AppError::Internal(msg)) if msg == "Failed to do thing"
        ));
    }

    #[test]
    fn option_ext_maps_to_not_found() {
        let value: Option<u8> = None;
        assert!(matches!(
            value.ok_or_not_found("Missing"),
            Err(AppError::NotFound(_))
        ));
    }
}
