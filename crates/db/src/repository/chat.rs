//! Chat history repository for the `chat_history` table.

use sqlx::postgres::PgPool;
use uuid::Uuid;

use crate::{AppError, ChatEntry, CreateChatEntryParams, DbError};

const CHAT_COLUMNS: &str =
    "id, user_id, assessment_id, message, response, sources, created_at";

/// Chat history repository for the `chat_history` table.
#[derive(Debug, Clone)]
pub struct ChatRepository {
    pool: PgPool,
}

impl ChatRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Store one question/answer exchange.
    pub async fn create_entry(&self, params: CreateChatEntryParams<'_>) -> Result<ChatEntry, AppError> {
        sqlx::query_as::<_, ChatEntry>(&format!(
            r"
            INSERT INTO chat_history (id, user_id, assessment_id, message, response, sources)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {CHAT_COLUMNS}
            "
        ))
        .bind(Uuid::new_v4())
        .bind(params.user_id)
        .bind(params.assessment_id)
        .bind(params.message)
        .bind(params.response)
        .bind(params.sources)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DbError(e).into())
    }

    /// Most recent `limit` exchanges for a user, returned oldest first.
    ///
    /// `assessment_id = None` selects general (unattached) exchanges.
    pub async fn recent_entries(
        &self,
        user_id: Uuid,
        assessment_id: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<ChatEntry>, AppError> {
        sqlx::query_as::<_, ChatEntry>(&format!(
            r"
            SELECT {CHAT_COLUMNS}
              FROM (
                    SELECT {CHAT_COLUMNS}
                      FROM chat_history
                     WHERE user_id = $1
                       AND assessment_id IS NOT DISTINCT FROM $2
                     ORDER BY created_at DESC, id DESC
                     LIMIT $3
                   ) recent
             ORDER BY created_at ASC, id ASC
            "
        ))
        .bind(user_id)
        .bind(assessment_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DbError(e).into())
    }

    /// Most recent `limit` exchanges for a user, returned oldest first.
    ///
    /// Unlike [`Self::recent_entries`], `assessment_id = None` selects every
    /// exchange of the user.
    pub async fn history(
        &self,
        user_id: Uuid,
        assessment_id: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<ChatEntry>, AppError> {
        sqlx::query_as::<_, ChatEntry>(&format!(
            r"
            SELECT {CHAT_COLUMNS}
              FROM (
                    SELECT {CHAT_COLUMNS}
                      FROM chat_history
                     WHERE user_id = $1
                       AND ($2::uuid IS NULL OR assessment_id = $2)
                     ORDER BY created_at DESC, id DESC
                     LIMIT $3
                   ) recent
             ORDER BY created_at ASC, id ASC
            "
        ))
        .bind(user_id)
        .bind(assessment_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DbError(e).into())
    }
}
