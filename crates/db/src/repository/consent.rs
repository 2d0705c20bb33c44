//! Consent log repository for the append-only `consent_logs` table.

use sqlx::postgres::PgPool;
use uuid::Uuid;

use crate::{AppError, ConsentLog, ConsentType, CreateConsentLogParams, DbError};

const CONSENT_COLUMNS: &str =
    "id, user_id, consent_type, granted, consent_version, ip_address, user_agent, created_at";

/// Consent log repository.
#[derive(Debug, Clone)]
pub struct ConsentRepository {
    pool: PgPool,
}

impl ConsentRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append a consent decision.
    pub async fn record(&self, params: CreateConsentLogParams<'_>) -> Result<ConsentLog, AppError> {
        sqlx::query_as::<_, ConsentLog>(&format!(
            r"
            INSERT INTO consent_logs (id, user_id, consent_type, granted, consent_version, ip_address, user_agent)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {CONSENT_COLUMNS}
            "
        ))
        .bind(Uuid::new_v4())
        .bind(params.user_id)
        .bind(params.consent_type.as_str())
        .bind(params.granted)
        .bind(params.consent_version)
        .bind(params.ip_address)
        .bind(params.user_agent)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DbError(e).into())
    }

    /// Latest decision per consent type for a user.
    pub async fn latest_for_user(&self, user_id: Uuid) -> Result<Vec<ConsentLog>, AppError> {
        sqlx::query_as::<_, ConsentLog>(&format!(
            r"
            SELECT DISTINCT ON (consent_type) {CONSENT_COLUMNS}
              FROM consent_logs
             WHERE user_id = $1
             ORDER BY consent_type, created_at DESC, id DESC
            "
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DbError(e).into())
    }

    /// Whether the user's latest decision for `consent_type` is a grant.
    pub async fn is_granted(&self, user_id: Uuid, consent_type: ConsentType) -> Result<bool, AppError> {
        let granted = sqlx::query_scalar::<_, bool>(
            r"
            SELECT granted
              FROM consent_logs
             WHERE user_id = $1
               AND consent_type = $2
             ORDER BY created_at DESC, id DESC
             LIMIT 1
            ",
        )
        .bind(user_id)
        .bind(consent_type.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError)?;

        Ok(granted.unwrap_or(false))
    }

    /// Full consent history for a user, newest first (audit view).
    pub async fn history_for_user(&self, user_id: Uuid) -> Result<Vec<ConsentLog>, AppError> {
        sqlx::query_as::<_, ConsentLog>(&format!(
            r"
            SELECT {CONSENT_COLUMNS}
              FROM consent_logs
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC
            "
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DbError(e).into())
    }
}
