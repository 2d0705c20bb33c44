//! Consent recording and lookup.
//!
//! The log is append-only; the effective decision for a type is its newest row.

use axum::Json;
use axum::extract::{Path, State};
use http::StatusCode;
use medlens_core::validation::domain;
use medlens_core::{AdminAuth, AppError, AppResult, AuthInfo, Validate, ValidJson};
use medlens_db::{ConsentLog, ConsentType, CreateConsentLogParams};
use serde::{Deserialize, Serialize};
use tracing::{Span, info, instrument};
use uuid::Uuid;

use crate::core::{AppState, ClientContext};

#[derive(Debug, Deserialize)]
pub struct ConsentRequest {
    pub consent_type: String,
    pub granted: bool,
    pub consent_version: String,
}

impl ConsentRequest {
    fn parsed_type(&self) -> Result<ConsentType, AppError> {
        self.consent_type.parse().map_err(|_| {
            let allowed: Vec<_> = ConsentType::ALL.iter().map(|t| t.as_str()).collect();
            AppError::InvalidArgument(format!(
                "consent_type: must be one of {}",
                allowed.join(", ")
            ))
        })
    }
}

impl Validate for ConsentRequest {
    fn validate(&self) -> Result<(), AppError> {
        self.parsed_type()?;
        domain::validate_consent_version(&self.consent_version)
    }
}

/// Current decision per consent type. Types never answered are `false`.
#[derive(Debug, Serialize)]
pub struct ConsentStatus {
    pub image_analysis: bool,
    pub data_storage: bool,
    pub terms_of_use: bool,
    pub consents: Vec<ConsentLog>,
}

impl From<Vec<ConsentLog>> for ConsentStatus {
    fn from(latest: Vec<ConsentLog>) -> Self {
        let granted = |ty: ConsentType| {
            latest
                .iter()
                .any(|log| log.consent_type == ty.as_str() && log.granted)
        };
        Self {
            image_analysis: granted(ConsentType::ImageAnalysis),
            data_storage: granted(ConsentType::DataStorage),
            terms_of_use: granted(ConsentType::TermsOfUse),
            consents: latest,
        }
    }
}

/// `POST /api/consent`
#[instrument(skip_all, fields(user_id = %auth.user_id))]
pub async fn record_consent(
    State(state): State<AppState>,
    auth: AuthInfo,
    client: ClientContext,
    ValidJson(req): ValidJson<ConsentRequest>,
) -> AppResult<(StatusCode, Json<ConsentLog>)> {
    let consent_type = req.parsed_type()?;

    let log = state
        .db()
        .consents
        .record(CreateConsentLogParams {
            user_id: auth.user_id,
            consent_type,
            granted: req.granted,
            consent_version: req.consent_version.trim(),
            ip_address: client.ip_network(),
            user_agent: client.user_agent(),
        })
        .await?;

    info!(consent_type = %consent_type, granted = req.granted, "Consent recorded");
    Ok((StatusCode::CREATED, Json(log)))
}

/// `GET /api/consent`
#[instrument(skip_all, fields(user_id = %auth.user_id))]
pub async fn current_consents(
    State(state): State<AppState>,
    auth: AuthInfo,
) -> AppResult<Json<ConsentStatus>> {
    let latest = state.db().consents.latest_for_user(auth.user_id).await?;
    Ok(Json(latest.into()))
}

/// `GET /api/admin/users/{id}/consents`
#[instrument(skip_all, fields(admin_id, target_user_id))]
pub async fn user_consent_history(
    State(state): State<AppState>,
    AdminAuth(admin): AdminAuth,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<Vec<ConsentLog>>> {
    let span = Span::current();
    span.record("admin_id", admin.user_id.to_string());
    span.record("target_user_id", user_id.to_string());

    state.db().users.get_user_by_id(user_id).await?;
    let history = state.db().consents.history_for_user(user_id).await?;
    Ok(Json(history))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn log(consent_type: &str, granted: bool) -> ConsentLog {
        ConsentLog {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            consent_type: consent_type.to_string(),
            granted,
            consent_version: "1.0".to_string(),
            ip_address: None,
            user_agent: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn rejects_unknown_type() {
        let req = ConsentRequest {
            consent_type: "marketing".to_string(),
            granted: true,
            consent_version: "1.0".to_string(),
        };
        assert!(matches!(
            req.validate(),
            Err(AppError::InvalidArgument(msg)) if msg.contains("image_analysis")
        ));
    }

    #[test]
    fn rejects_blank_version() {
        let req = ConsentRequest {
            consent_type: "data_storage".to_string(),
            granted: false,
            consent_version: "  ".to_string(),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn status_reflects_latest_decisions() {
        let status = ConsentStatus::from(vec![
            log("image_analysis", true),
            log("data_storage", false),
        ]);
        assert!(status.image_analysis);
        assert!(!status.data_storage);
        assert!(!status.terms_of_use);
        assert_eq!(status.consents.len(), 2);
    }
}
