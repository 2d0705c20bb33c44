//! Image prediction and stored assessments.
//!
//! `POST /api/predict` runs upload validation → consent check → AI service →
//! enrichment → (optional) persistence. The image itself is never stored.

use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::{DateTime, Utc};
use http::StatusCode;
use medlens_core::{AppError, AppResult, AuthInfo};
use medlens_db::{Assessment, ConsentType, CreateAssessmentParams, Page};
use medlens_upstream::Prediction;
use serde::{Deserialize, Serialize};
use tracing::{Span, info, instrument};
use uuid::Uuid;

use crate::core::{AppState, Enrichment};
use crate::middleware::ImageUpload;

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

/// Response of `POST /api/predict`.
#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    /// Stored assessment id, `None` without `data_storage` consent.
    pub id: Option<Uuid>,
    pub stored: bool,
    pub prediction: Prediction,
    pub enrichment: Enrichment,
    pub created_at: DateTime<Utc>,
}

/// Stored assessment with its education content re-derived from the catalog.
#[derive(Debug, Serialize)]
pub struct AssessmentDetail {
    #[serde(flatten)]
    pub assessment: Assessment,
    pub enrichment: Enrichment,
}

impl PredictionResponse {
    /// `stored` is the persisted row, if the caller allowed storage.
    #[must_use]
    pub fn new(
        prediction: Prediction,
        enrichment: Enrichment,
        stored: Option<&Assessment>,
    ) -> Self {
        Self {
            id: stored.map(|a| a.id),
            stored: stored.is_some(),
            created_at: stored.map_or_else(Utc::now, |a| a.created_at),
            prediction,
            enrichment,
        }
    }
}

/// Images are only forwarded when the latest `image_analysis` decision is a grant.
fn require_image_consent(granted: bool) -> AppResult<()> {
    if granted {
        Ok(())
    } else {
        Err(AppError::PermissionDenied(
            "Consent to image analysis is required before uploading images".to_string(),
        ))
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct AssessmentList {
    pub items: Vec<Assessment>,
    pub limit: i64,
    pub offset: i64,
}

/// `POST /api/predict`
#[instrument(skip_all, fields(user_id = %auth.user_id, label, stored))]
pub async fn predict(
    State(state): State<AppState>,
    auth: AuthInfo,
    upload: ImageUpload,
) -> AppResult<Json<PredictionResponse>> {
    let consents = &state.db().consents;
    require_image_consent(
        consents
            .is_granted(auth.user_id, ConsentType::ImageAnalysis)
            .await?,
    )?;

    let prediction = state.predictor().predict(upload.payload()).await?;
    let enrichment = state.catalog().enrich(
        &prediction.label,
        prediction.confidence,
        state.settings().low_confidence_threshold,
    );

    let span = Span::current();
    span.record("label", enrichment.label.as_str());
    metrics::counter!(
        "predictions_total",
        "urgency" => enrichment.urgency.as_str(),
        "known" => if enrichment.known { "true" } else { "false" }
    )
    .increment(1);

    let stored = if consents
        .is_granted(auth.user_id, ConsentType::DataStorage)
        .await?
    {
        Some(
            state
                .db()
                .assessments
                .create_assessment(CreateAssessmentParams {
                    user_id: auth.user_id,
                    predicted_label: &prediction.label,
                    normalized_label: &enrichment.label,
                    display_name: &enrichment.display_name,
                    confidence: prediction.confidence,
                    urgency: enrichment.urgency.as_str(),
                    low_confidence: enrichment.low_confidence,
                    chat_available: enrichment.chat_available,
                    raw_prediction: &prediction.raw,
                    image_filename: upload.filename.as_deref(),
                    image_content_type: upload.content_type,
                    image_size_bytes: upload.size(),
                })
                .await?,
        )
    } else {
        None
    };

    span.record("stored", stored.is_some());
    info!(
        urgency = %enrichment.urgency,
        confidence = prediction.confidence,
        low_confidence = enrichment.low_confidence,
        "Prediction completed"
    );

    Ok(Json(PredictionResponse::new(prediction, enrichment, stored.as_ref())))
}

/// `GET /api/assessments`
#[instrument(skip_all, fields(user_id = %auth.user_id))]
pub async fn list_assessments(
    State(state): State<AppState>,
    auth: AuthInfo,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<AssessmentList>> {
    let page = Page::clamped(query.limit, query.offset, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE);
    let items = state.db().assessments.list_for_user(auth.user_id, page).await?;
    Ok(Json(AssessmentList {
        items,
        limit: page.limit,
        offset: page.offset,
    }))
}

/// Load an assessment the caller may access.
pub(super) async fn accessible_assessment(
    state: &AppState,
    auth: &AuthInfo,
    id: Uuid,
    action: &str,
) -> AppResult<Assessment> {
    let assessment = state.db().assessments.get_assessment(id).await?;
    auth.require_access(assessment.user_id, action)?;
    Ok(assessment)
}

/// `GET /api/assessments/{id}`
#[instrument(skip_all, fields(user_id = %auth.user_id))]
pub async fn get_assessment(
    State(state): State<AppState>,
    auth: AuthInfo,
    Path(id): Path<Uuid>,
) -> AppResult<Json<AssessmentDetail>> {
    let assessment = accessible_assessment(&state, &auth, id, "view this assessment").await?;
    let enrichment = state.catalog().enrich(
        &assessment.predicted_label,
        assessment.confidence,
        state.settings().low_confidence_threshold,
    );
    Ok(Json(AssessmentDetail {
        assessment,
        enrichment,
    }))
}

/// `DELETE /api/assessments/{id}`
#[instrument(skip_all, fields(user_id = %auth.user_id))]
pub async fn delete_assessment(
    State(state): State<AppState>,
    auth: AuthInfo,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    accessible_assessment(&state, &auth, id, "delete this assessment").await?;
    state.db().assessments.delete_assessment(id).await?;
    info!(assessment_id = %id, "Assessment deleted");
    Ok(StatusCode::NO_CONTENT)
}
