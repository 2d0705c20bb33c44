//! Assessment repository for the `assessments` table.

use sqlx::postgres::PgPool;
use uuid::Uuid;

use crate::{AppError, Assessment, CreateAssessmentParams, DbError, Page};

const ASSESSMENT_COLUMNS: &str = r"
    id, user_id, predicted_label, normalized_label, display_name, confidence,
    urgency, low_confidence, chat_available, raw_prediction,
    image_filename, image_content_type, image_size_bytes, created_at
";

/// Assessment repository for the `assessments` table.
#[derive(Debug, Clone)]
pub struct AssessmentRepository {
    pool: PgPool,
}

impl AssessmentRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Store a new assessment.
    pub async fn create_assessment(
        &self,
        params: CreateAssessmentParams<'_>,
    ) -> Result<Assessment, AppError> {
        sqlx::query_as::<_, Assessment>(&format!(
            r"
            INSERT INTO assessments (
                id, user_id, predicted_label, normalized_label, display_name, confidence,
                urgency, low_confidence, chat_available, raw_prediction,
                image_filename, image_content_type, image_size_bytes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {ASSESSMENT_COLUMNS}
            "
        ))
        .bind(Uuid::new_v4())
        .bind(params.user_id)
        .bind(params.predicted_label)
        .bind(params.normalized_label)
        .bind(params.display_name)
        .bind(params.confidence)
        .bind(params.urgency)
        .bind(params.low_confidence)
        .bind(params.chat_available)
        .bind(params.raw_prediction)
        .bind(params.image_filename)
        .bind(params.image_content_type)
        .bind(params.image_size_bytes)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DbError(e).into())
    }

    /// Get assessment by ID (ownership is checked by the caller).
    pub async fn get_assessment(&self, id: Uuid) -> Result<Assessment, AppError> {
        sqlx::query_as::<_, Assessment>(&format!(
            "SELECT {ASSESSMENT_COLUMNS} FROM assessments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError)?
        .ok_or_else(|| AppError::not_found("Assessment", id))
    }

    /// List a user's assessments, newest first.
    pub async fn list_for_user(&self, user_id: Uuid, page: Page) -> Result<Vec<Assessment>, AppError> {
        sqlx::query_as::<_, Assessment>(&format!(
            r"
            SELECT {ASSESSMENT_COLUMNS}
              FROM assessments
             WHERE user_id = $1
             ORDER BY created_at DESC, id
             LIMIT $2 OFFSET $3
            "
        ))
        .bind(user_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DbError(e).into())
    }

    /// Delete an assessment. Chat rows referencing it are detached by the FK.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if no row was deleted.
    pub async fn delete_assessment(&self, id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM assessments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DbError)?;

        if result.rows_affected() > 0 {
            Ok(())
        } else {
            Err(AppError::not_found("Assessment", id))
        }
    }
}
