//! Request validation.
//!
//! Request DTOs implement [`Validate`]; handlers take [`ValidJson<T>`] instead
//! of `Json<T>` so malformed bodies and rule violations are rejected before
//! any handler code runs.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use serde::de::DeserializeOwned;

use crate::AppError;

/// Business-rule validation for a deserialized request body.
pub trait Validate {
    /// Check the value against domain rules.
    ///
    /// # Errors
    /// Returns `AppError::InvalidArgument` describing the first violation.
    fn validate(&self) -> Result<(), AppError>;
}

/// JSON extractor that runs [`Validate`] after deserialization.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| AppError::InvalidArgument(rejection.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}

/// Domain-level validation helpers shared by request DTOs.
pub mod domain {
    use crate::AppError;

    /// Minimum password length.
    pub const MIN_PASSWORD_LENGTH: usize = 8;
    /// Maximum password length (Argon2 input is hashed, but bound the work).
    pub const MAX_PASSWORD_LENGTH: usize = 128;
    /// Maximum email length.
    pub const MAX_EMAIL_LENGTH: usize = 255;
    /// Maximum name length.
    pub const MAX_NAME_LENGTH: usize = 255;
    /// Maximum chat message length in characters.
    pub const MAX_CHAT_MESSAGE_LENGTH: usize = 2000;
    /// Maximum consent version length.
    pub const MAX_CONSENT_VERSION_LENGTH: usize = 32;

    fn field_violation(field: &str, description: &str) -> AppError {
        AppError::InvalidArgument(format!("{field}: {description}"))
    }

    /// Validate password strength.
    pub fn validate_password(password: &str) -> Result<(), AppError> {
        let len = password.chars().count();
        if len < MIN_PASSWORD_LENGTH {
            return Err(field_violation(
                "password",
                &format!("must be at least {MIN_PASSWORD_LENGTH} characters"),
            ));
        }
        if len > MAX_PASSWORD_LENGTH {
            return Err(field_violation(
                "password",
                &format!("must not exceed {MAX_PASSWORD_LENGTH} characters"),
            ));
        }

        let has_letter = password.chars().any(char::is_alphabetic);
        let has_digit = password.chars().any(|c| c.is_ascii_digit());

        if !has_letter || !has_digit {
            return Err(field_violation(
                "password",
                "must contain at least one letter and one number",
            ));
        }

        Ok(())
    }

    /// Validate email format (basic structural check).
    pub fn validate_email(email: &str) -> Result<(), AppError> {
        let email = email.trim();

        if email.len() > MAX_EMAIL_LENGTH {
            return Err(field_violation(
                "email",
                &format!("must not exceed {MAX_EMAIL_LENGTH} characters"),
            ));
        }

        if !email.contains('@')
            || email.starts_with('@')
            || email.ends_with('@')
            || email.chars().any(char::is_whitespace)
        {
            return Err(field_violation("email", "invalid format"));
        }

        Ok(())
    }

    /// Validate a person's name.
    pub fn validate_name(name: &str) -> Result<(), AppError> {
        let name = name.trim();

        if name.is_empty() {
            return Err(field_violation("full_name", "cannot be empty"));
        }

        if name.chars().count() > MAX_NAME_LENGTH {
            return Err(field_violation(
                "full_name",
                &format!("must not exceed {MAX_NAME_LENGTH} characters"),
            ));
        }

        Ok(())
    }

    /// Validate a chat question.
    pub fn validate_chat_message(message: &str) -> Result<(), AppError> {
        let message = message.trim();

        if message.is_empty() {
            return Err(field_violation("message", "cannot be empty"));
        }

        if message.chars().count() > MAX_CHAT_MESSAGE_LENGTH {
            return Err(field_violation(
                "message",
                &format!("must not exceed {MAX_CHAT_MESSAGE_LENGTH} characters"),
            ));
        }

        Ok(())
    }

    /// Validate a consent document version string.
    pub fn validate_consent_version(version: &str) -> Result<(), AppError> {
        let version = version.trim();

        if version.is_empty() {
            return Err(field_violation("consent_version", "cannot be empty"));
        }

        if version.len() > MAX_CONSENT_VERSION_LENGTH {
            return Err(field_violation(
                "consent_version",
                &format!("must not exceed {MAX_CONSENT_VERSION_LENGTH} characters"),
            ));
        }

        Ok(())
    }
}
