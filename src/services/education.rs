//! Public education catalog endpoints.

use axum::Json;
use axum::extract::{Path, State};
use medlens_core::{AppError, AppResult};
use serde::Serialize;

use crate::core::{AppState, CatalogEntry, DISCLAIMER, DiseaseInfo};

#[derive(Debug, Serialize)]
pub struct EducationEntry {
    pub label: String,
    #[serde(flatten)]
    pub info: DiseaseInfo,
}

impl From<CatalogEntry<'_>> for EducationEntry {
    fn from(entry: CatalogEntry<'_>) -> Self {
        Self {
            label: entry.label.to_string(),
            info: entry.info.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EducationList {
    pub entries: Vec<EducationEntry>,
    pub disclaimer: &'static str,
}

/// `GET /api/education`
pub async fn list_entries(State(state): State<AppState>) -> Json<EducationList> {
    Json(EducationList {
        entries: state.catalog().entries().map(Into::into).collect(),
        disclaimer: DISCLAIMER,
    })
}

/// `GET /api/education/{label}`
pub async fn get_entry(
    State(state): State<AppState>,
    Path(label): Path<String>,
) -> AppResult<Json<EducationEntry>> {
    state
        .catalog()
        .lookup(&label)
        .map(|entry| Json(entry.into()))
        .ok_or_else(|| AppError::not_found("Condition", label.trim()))
}
