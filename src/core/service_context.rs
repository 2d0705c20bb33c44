//! Shared state handed to every handler.

use std::sync::Arc;

use axum::extract::FromRef;
use medlens_core::JwtValidator;
use medlens_db::Database;
use medlens_upstream::{ChatClient, PredictionClient};

use super::DiseaseCatalog;
use crate::middleware::UploadPolicy;

/// Tunables the handlers need from configuration.
#[derive(Debug, Clone, Copy)]
pub struct ServiceSettings {
    pub access_token_ttl_minutes: u64,
    pub low_confidence_threshold: f64,
    pub max_upload_bytes: usize,
}

/// Shared infrastructure for all handlers.
///
/// Cheap to clone: the pool, the HTTP clients and the catalog are all
/// reference-counted. Handlers receive it as `State<AppState>`.
#[derive(Debug, Clone)]
pub struct ServiceContext {
    db: Database,
    jwt: JwtValidator,
    catalog: Arc<DiseaseCatalog>,
    predictor: PredictionClient,
    chat: ChatClient,
    settings: ServiceSettings,
}

/// Router state.
pub type AppState = Arc<ServiceContext>;

impl ServiceContext {
    #[must_use]
    pub fn new(
        db: Database,
        jwt: JwtValidator,
        catalog: Arc<DiseaseCatalog>,
        predictor: PredictionClient,
        chat: ChatClient,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            db,
            jwt,
            catalog,
            predictor,
            chat,
            settings,
        }
    }

    #[inline]
    #[must_use]
    pub const fn db(&self) -> &Database {
        &self.db
    }

    #[inline]
    #[must_use]
    pub const fn jwt(&self) -> &JwtValidator {
        &self.jwt
    }

    #[inline]
    #[must_use]
    pub fn catalog(&self) -> &DiseaseCatalog {
        &self.catalog
    }

    /// Image classification client.
    #[inline]
    #[must_use]
    pub const fn predictor(&self) -> &PredictionClient {
        &self.predictor
    }

    /// Retrieval-augmented chat client.
    #[inline]
    #[must_use]
    pub const fn chat(&self) -> &ChatClient {
        &self.chat
    }

    #[inline]
    #[must_use]
    pub const fn settings(&self) -> &ServiceSettings {
        &self.settings
    }
}

impl FromRef<AppState> for UploadPolicy {
    fn from_ref(state: &AppState) -> Self {
        Self {
            max_bytes: state.settings.max_upload_bytes,
        }
    }
}
