//! User repository for the `users` table.

use sqlx::postgres::PgPool;
use uuid::Uuid;

use crate::{AppError, CreateUserParams, DbError, User};

const USER_COLUMNS: &str = "id, email, password_hash, full_name, role, created_at, updated_at";

/// User repository for the `users` table.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get user by (already normalized) email.
    pub async fn get_user_by_email(&self, email: &str) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 LIMIT 1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError)?
        .ok_or_else(|| AppError::not_found("User", email))
    }

    /// Get user by ID.
    pub async fn get_user_by_id(&self, user_id: Uuid) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 LIMIT 1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError)?
        .ok_or_else(|| AppError::not_found("User", user_id))
    }

    /// Create a new user.
    ///
    /// # Errors
    /// Returns `AppError::AlreadyExists` if the email is taken.
    pub async fn create_user(&self, params: CreateUserParams<'_>) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(&format!(
            r"
            INSERT INTO users (id, email, password_hash, full_name, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(Uuid::new_v4())
        .bind(params.email)
        .bind(params.password_hash)
        .bind(params.full_name)
        .bind(params.role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match AppError::from(DbError(e)) {
            AppError::AlreadyExists(_) => AppError::conflict("User", "email"),
            other => other,
        })
    }
}
