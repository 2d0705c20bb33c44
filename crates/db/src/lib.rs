//! PostgreSQL persistence layer built on `sqlx`.
//!
//! Provides:
//! - Connection pool management via [`create_pool`]
//! - Embedded schema migrations via [`Database::migrate`]
//! - One repository per table grouped in [`Database`]
//!
//! # Example
//!
//! ```ignore
//! use medlens_db::{create_pool, Database, DbConfig};
//!
//! let pool = create_pool(&DbConfig::from_url("postgres://localhost/medlens")).await?;
//! let db = Database::new(pool);
//! db.migrate().await?;
//!
//! let user = db.users.get_user_by_email("jane@example.com").await?;
//! ```

mod models;
mod repository;

use medlens_core::AppError;
use tracing::{error, warn};

/// Database error wrapper so repository methods can use `?` into `AppError`.
#[derive(Debug)]
struct DbError(sqlx::Error);

impl From<sqlx::Error> for DbError {
    #[inline]
    fn from(e: sqlx::Error) -> Self {
        Self(e)
    }
}

impl From<DbError> for AppError {
    fn from(e: DbError) -> Self {
        match &e.0 {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                constraint_error(Constraint::Unique, db.constraint(), db.message())
            }
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                constraint_error(Constraint::ForeignKey, db.constraint(), db.message())
            }
            _ => {
                error!(error = %e.0, "Database error");
                Self::Unavailable("Database unavailable".to_string())
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Constraint {
    Unique,
    ForeignKey,
}

/// Postgres messages name tables and constraints; they are logged, never returned.
fn constraint_error(kind: Constraint, constraint: Option<&str>, message: &str) -> AppError {
    warn!(?kind, constraint, detail = message, "Constraint violation");
    match kind {
        Constraint::Unique => AppError::AlreadyExists("Resource already exists".to_string()),
        Constraint::ForeignKey => {
            AppError::NotFound("Referenced resource not found".to_string())
        }
    }
}

pub use models::{
    Assessment, ChatEntry, ConsentLog, ConsentType, CreateAssessmentParams,
    CreateChatEntryParams, CreateConsentLogParams, CreateUserParams, Page, User, roles,
};

pub use repository::{
    AssessmentRepository, ChatRepository, ConsentRepository, Database, DbConfig, UserRepository,
    create_pool,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_messages_hide_schema_details() {
        let raw = r#"duplicate key value violates unique constraint "users_email_key""#;
        match constraint_error(Constraint::Unique, Some("users_email_key"), raw) {
            AppError::AlreadyExists(msg) => {
                assert_eq!(msg, "Resource already exists");
                assert!(!msg.contains("users_email_key"));
            }
            other => panic!("expected AlreadyExists, got {other:?}"),
        }

        let raw = r#"insert or update on table "chat_history" violates foreign key constraint "chat_history_user_id_fkey""#;
        match constraint_error(Constraint::ForeignKey, None, raw) {
            AppError::NotFound(msg) => {
                assert_eq!(msg, "Referenced resource not found");
                assert!(!msg.contains("chat_history"));
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }
}
