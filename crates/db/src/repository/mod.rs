//! Repository layer with connection pooling.
//!
//! # Error Handling
//!
//! All repository methods return `Result<T, AppError>` where errors are:
//! - `AppError::Unavailable` - connection or query failures
//! - `AppError::NotFound` - requested row does not exist, or a foreign key target is missing
//! - `AppError::AlreadyExists` - unique constraint violated

mod assessment;
mod chat;
mod config;
mod consent;
mod user;

use sqlx::postgres::PgPool;

use crate::AppError;

pub use assessment::AssessmentRepository;
pub use chat::ChatRepository;
pub use config::{DbConfig, create_pool};
pub use consent::ConsentRepository;
pub use user::UserRepository;

/// Embedded migrations from `crates/db/migrations`.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Combined database context.
#[derive(Debug, Clone)]
pub struct Database {
    pub users: UserRepository,
    pub assessments: AssessmentRepository,
    pub chat: ChatRepository,
    pub consents: ConsentRepository,
    pool: PgPool,
}

impl Database {
    /// Creates a new database context with all repositories.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            users: UserRepository::new(pool.clone()),
            assessments: AssessmentRepository::new(pool.clone()),
            chat: ChatRepository::new(pool.clone()),
            consents: ConsentRepository::new(pool.clone()),
            pool,
        }
    }

    /// Apply pending schema migrations.
    pub async fn migrate(&self) -> Result<(), AppError> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Unavailable(format!("Migration failed: {e}")))
    }

    /// Check database health by executing a simple query.
    pub async fn health_check(&self) -> bool {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }

    /// Returns a reference to the underlying connection pool.
    #[inline]
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use uuid::Uuid;

    use super::*;
    use crate::{
        ConsentType, CreateAssessmentParams, CreateChatEntryParams, CreateConsentLogParams,
        CreateUserParams, User, roles,
    };

    async fn user(db: &Database) -> User {
        let email = format!("{}@example.com", Uuid::new_v4());
        db.users
            .create_user(CreateUserParams {
                email: &email,
                password_hash: "hash",
                full_name: "Jane Doe",
                role: roles::USER,
            })
            .await
            .unwrap()
    }

    async fn consent(db: &Database, user_id: Uuid, consent_type: ConsentType, granted: bool) {
        db.consents
            .record(CreateConsentLogParams {
                user_id,
                consent_type,
                granted,
                consent_version: "1.0",
                ip_address: None,
                user_agent: None,
            })
            .await
            .unwrap();
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL"]
    async fn latest_consent_decision_wins(pool: PgPool) {
        let db = Database::new(pool);
        let user = user(&db).await;
        let ty = ConsentType::ImageAnalysis;

        assert!(!db.consents.is_granted(user.id, ty).await.unwrap());

        consent(&db, user.id, ty, true).await;
        assert!(db.consents.is_granted(user.id, ty).await.unwrap());
        assert!(!db.consents.is_granted(user.id, ConsentType::DataStorage).await.unwrap());

        consent(&db, user.id, ty, false).await;
        assert!(!db.consents.is_granted(user.id, ty).await.unwrap());
        assert_eq!(db.consents.history_for_user(user.id).await.unwrap().len(), 2);
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL"]
    async fn deleting_assessment_detaches_chat_history(pool: PgPool) {
        let db = Database::new(pool);
        let user = user(&db).await;
        let raw = json!({"prediction": "Melanoma", "confidence": 0.9});

        let assessment = db
            .assessments
            .create_assessment(CreateAssessmentParams {
                user_id: user.id,
                predicted_label: "Melanoma",
                normalized_label: "melanoma",
                display_name: "Melanoma",
                confidence: 0.9,
                urgency: "high",
                low_confidence: false,
                chat_available: true,
                raw_prediction: &raw,
                image_filename: Some("lesion.png"),
                image_content_type: "image/png",
                image_size_bytes: 1024,
            })
            .await
            .unwrap();

        let sources = json!([]);
        let entry = db
            .chat
            .create_entry(CreateChatEntryParams {
                user_id: user.id,
                assessment_id: Some(assessment.id),
                message: "Is this serious?",
                response: "Please see a dermatologist.",
                sources: &sources,
            })
            .await
            .unwrap();

        db.assessments.delete_assessment(assessment.id).await.unwrap();
        assert!(matches!(
            db.assessments.get_assessment(assessment.id).await,
            Err(AppError::NotFound(_))
        ));

        let history = db.chat.history(user.id, None, 50).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, entry.id);
        assert_eq!(history[0].assessment_id, None);
    }
}
