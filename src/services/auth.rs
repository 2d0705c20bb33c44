//! Registration, login and current-user endpoints.
//!
//! Access tokens only: a token is issued on register/login and expires after
//! `ACCESS_TOKEN_TTL_MINUTES`. There are no refresh tokens or sessions.

use axum::Json;
use axum::extract::State;
use chrono::{DateTime, Utc};
use http::StatusCode;
use medlens_core::validation::domain;
use medlens_core::{AppError, AppResult, AuthInfo, Validate, ValidJson};
use medlens_db::{CreateUserParams, User, roles};
use serde::{Deserialize, Serialize};
use tracing::{Span, info, instrument};
use uuid::Uuid;

use crate::core::{AppState, password};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Email as stored and looked up: trimmed and lowercased.
#[must_use]
pub fn canonical_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

impl Validate for RegisterRequest {
    fn validate(&self) -> Result<(), AppError> {
        domain::validate_email(&canonical_email(&self.email))?;
        domain::validate_password(&self.password)?;
        domain::validate_name(&self.full_name)
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<(), AppError> {
        if self.email.trim().is_empty() || self.password.is_empty() {
            return Err(AppError::InvalidArgument(
                "Email and password are required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Public view of a user.
#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
    pub user: UserView,
}

fn auth_response(state: &AppState, user: User) -> AppResult<AuthResponse> {
    let issued = state
        .jwt()
        .issue(&user, state.settings().access_token_ttl_minutes)?;
    Ok(AuthResponse {
        token: issued.token,
        token_type: "Bearer",
        expires_at: issued.expires_at,
        user: user.into(),
    })
}

/// `POST /api/auth/register`
#[instrument(skip_all, fields(user_id))]
pub async fn register(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let email = canonical_email(&req.email);
    let password_hash = password::hash_blocking(req.password).await?;

    let user = state
        .db()
        .users
        .create_user(CreateUserParams {
            email: &email,
            password_hash: &password_hash,
            full_name: req.full_name.trim(),
            role: roles::USER,
        })
        .await?;

    Span::current().record("user_id", user.id.to_string());
    info!(user_id = %user.id, "User registered");
    metrics::counter!("auth_registrations_total").increment(1);

    Ok((StatusCode::CREATED, Json(auth_response(&state, user)?)))
}

/// `POST /api/auth/login`
#[instrument(skip_all, fields(user_id))]
pub async fn login(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let email = canonical_email(&req.email);

    let user = match state.db().users.get_user_by_email(&email).await {
        Ok(user) => Some(user),
        Err(AppError::NotFound(_)) => None,
        Err(e) => return Err(e),
    };

    let hash = user.as_ref().map(|u| u.password_hash.clone());
    let valid = password::verify_blocking(req.password, hash).await?;

    let Some(user) = user.filter(|_| valid) else {
        metrics::counter!("auth_logins_total", "outcome" => "rejected").increment(1);
        return Err(AppError::Unauthenticated(INVALID_CREDENTIALS.to_string()));
    };

    Span::current().record("user_id", user.id.to_string());
    info!(user_id = %user.id, "User logged in");
    metrics::counter!("auth_logins_total", "outcome" => "success").increment(1);

    Ok(Json(auth_response(&state, user)?))
}

/// `GET /api/auth/me`
#[instrument(skip_all, fields(user_id = %auth.user_id))]
pub async fn me(State(state): State<AppState>, auth: AuthInfo) -> AppResult<Json<UserView>> {
    let user = state.db().users.get_user_by_id(auth.user_id).await?;
    Ok(Json(user.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_canonicalized() {
        assert_eq!(canonical_email("  Jane.Doe@Example.COM "), "jane.doe@example.com");
    }

    #[test]
    fn register_validation() {
        let valid = RegisterRequest {
            email: " Jane@Example.com ".to_string(),
            password: "secret123".to_string(),
            full_name: "Jane Doe".to_string(),
        };
        assert!(valid.validate().is_ok());

        let weak = RegisterRequest {
            password: "short".to_string(),
            ..valid
        };
        assert!(matches!(weak.validate(), Err(AppError::InvalidArgument(_))));
    }

    #[test]
    fn login_requires_both_fields() {
        let req = LoginRequest {
            email: "jane@example.com".to_string(),
            password: String::new(),
        };
        assert!(req.validate().is_err());
    }
}
