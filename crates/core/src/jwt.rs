//! JWT access token generation, validation, and claims.
//!
//! A single [`JwtValidator`] owns the cached HS256 keys and is shared by the
//! auth middleware (decode) and the auth handlers (encode).
//!
//! This module is database-agnostic: implement [`JwtSubject`] for your user type.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::AppError;

/// JWT issuer identifier.
const ISSUER: &str = "medlens";
/// JWT audience identifier.
const AUDIENCE: &str = "medlens";

/// Types that can be used as JWT subjects.
pub trait JwtSubject {
    /// User's unique identifier.
    fn user_id(&self) -> Uuid;
    /// User's email address.
    fn email(&self) -> &str;
    /// User's display name.
    fn name(&self) -> &str;
    /// User's role as stored (e.g. "admin", "user").
    fn role(&self) -> &str;
}

/// User role used for authorization checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[serde(rename = "admin")]
    Administrator,
    User,
}

impl UserRole {
    /// Role name as stored in the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Administrator => "admin",
            Self::User => "user",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" | "administrator" => Ok(Self::Administrator),
            "user" => Ok(Self::User),
            _ => Err(format!("Unknown role: {s}")),
        }
    }
}

/// Validated authentication info from a bearer token.
///
/// Injected into request extensions by the auth middleware.
#[derive(Debug, Clone)]
pub struct AuthInfo {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub role: UserRole,
}

impl AuthInfo {
    /// Check if user has admin role.
    #[inline]
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self.role, UserRole::Administrator)
    }

    /// Check if user can access a resource owned by `owner_id`.
    #[inline]
    #[must_use]
    pub fn can_access(&self, owner_id: Uuid) -> bool {
        self.user_id == owner_id || self.is_admin()
    }

    /// Require access to a resource owned by `owner_id`.
    ///
    /// # Errors
    /// Returns `AppError::PermissionDenied` if the caller is neither owner nor admin.
    pub fn require_access(&self, owner_id: Uuid, action: &str) -> Result<(), AppError> {
        if self.can_access(owner_id) {
            Ok(())
        } else {
            warn!(user_id = %self.user_id, owner = %owner_id, action, "Permission denied");
            Err(AppError::PermissionDenied(format!(
                "Cannot {action} for other users"
            )))
        }
    }
}

/// JWT claims structure following RFC 7519.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Audience
    pub aud: String,
    /// Issuer
    pub iss: String,
    /// JWT ID
    pub jti: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Not before (Unix timestamp)
    pub nbf: i64,

    pub role: String,
    pub email: String,
    pub name: String,
}

/// JWT validation errors.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("missing authorization header")]
    MissingHeader,
    #[error("invalid authorization format")]
    InvalidFormat,
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("invalid claim: {0}")]
    InvalidClaim(&'static str),
}

impl TryFrom<Claims> for AuthInfo {
    type Error = JwtError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: Uuid::parse_str(&claims.sub).map_err(|_| JwtError::InvalidClaim("sub"))?,
            role: claims
                .role
                .parse()
                .map_err(|_| JwtError::InvalidClaim("role"))?,
            email: claims.email,
            name: claims.name,
        })
    }
}

/// Freshly issued access token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Pre-compiled JWT validator with cached encoding/decoding keys.
#[derive(Clone)]
pub struct JwtValidator {
    encoding_key: Arc<EncodingKey>,
    decoding_key: Arc<DecodingKey>,
    validation: Arc<Validation>,
}

impl std::fmt::Debug for JwtValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtValidator").finish_non_exhaustive()
    }
}

impl JwtValidator {
    /// Create a new validator from a secret.
    #[must_use]
    pub fn new(secret: &SecretString) -> Self {
        let secret_bytes = secret.expose_secret().as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[AUDIENCE]);
        validation.set_issuer(&[ISSUER]);
        validation.validate_exp = true;
        validation.validate_nbf = true;

        Self {
            encoding_key: Arc::new(EncodingKey::from_secret(secret_bytes)),
            decoding_key: Arc::new(DecodingKey::from_secret(secret_bytes)),
            validation: Arc::new(validation),
        }
    }

    /// Issue an access token for any type implementing `JwtSubject`.
    #[allow(clippy::cast_possible_wrap)] // TTL is a bounded config value
    pub fn issue<T: JwtSubject>(
        &self,
        subject: &T,
        ttl_minutes: u64,
    ) -> Result<IssuedToken, AppError> {
        let now = Utc::now();
        let expires_at = now + Duration::minutes(ttl_minutes as i64);

        let claims = Claims {
            sub: subject.user_id().to_string(),
            aud: AUDIENCE.to_string(),
            iss: ISSUER.to_string(),
            jti: Uuid::new_v4().to_string(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            nbf: now.timestamp(),

            role: subject.role().to_string(),
            email: subject.email().to_string(),
            name: subject.name().to_string(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("JWT encoding failed: {e}")))?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Validate a JWT and extract auth info.
    pub fn validate(&self, token: &str) -> Result<AuthInfo, JwtError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|_| JwtError::InvalidToken)?;

        token_data.claims.try_into()
    }
}
