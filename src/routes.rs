//! REST routes and health check handlers.

use axum::extract::{DefaultBodyLimit, FromRef, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use medlens_telemetry::PrometheusHandle;
use serde::Serialize;

use crate::core::AppState;
use crate::middleware::UploadPolicy;
use crate::services::{assessments, auth, chat, consent, education};

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    checks: HealthChecks,
}

#[derive(Debug, Serialize)]
pub struct HealthChecks {
    database: CheckResult,
    ai_service: CheckResult,
    rag_service: CheckResult,
}

#[derive(Debug, Serialize)]
pub struct CheckResult {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl CheckResult {
    fn from_probe(ok: bool, failure: &str) -> Self {
        if ok {
            Self {
                status: "healthy",
                message: None,
            }
        } else {
            Self {
                status: "unhealthy",
                message: Some(failure.to_string()),
            }
        }
    }

    fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Build version.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build all REST routes with the given application state.
pub fn rest_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "medlens" }))
        .route("/health", get(|| async { "OK" }))
        .route("/health/live", get(|| async { "OK" }))
        .route("/health/ready", get(readiness_handler))
        .merge(api_routes(&state))
        .with_state(state)
}

/// Add the Prometheus scrape endpoint.
pub fn with_metrics(router: Router, metrics_handle: PrometheusHandle) -> Router {
    router.route(
        "/metrics",
        get(move || {
            let handle = metrics_handle.clone();
            async move { handle.render() }
        }),
    )
}

fn api_routes(state: &AppState) -> Router<AppState> {
    let upload = UploadPolicy::from_ref(state);

    Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/me", get(auth::me))
        .route(
            "/api/predict",
            post(assessments::predict).layer(DefaultBodyLimit::max(upload.body_limit())),
        )
        .route("/api/assessments", get(assessments::list_assessments))
        .route(
            "/api/assessments/{id}",
            get(assessments::get_assessment).delete(assessments::delete_assessment),
        )
        .route("/api/chat", post(chat::send_message))
        .route("/api/chat/history", get(chat::chat_history))
        .route(
            "/api/consent",
            post(consent::record_consent).get(consent::current_consents),
        )
        .route(
            "/api/admin/users/{id}/consents",
            get(consent::user_consent_history),
        )
        .route("/api/education", get(education::list_entries))
        .route("/api/education/{label}", get(education::get_entry))
}

async fn readiness_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let (db_ok, ai_ok, rag_ok) = tokio::join!(
        state.db().health_check(),
        state.predictor().health_check(),
        state.chat().health_check(),
    );

    let database = CheckResult::from_probe(db_ok, "Database connection failed");
    let ai_service = CheckResult::from_probe(ai_ok, "AI service unreachable");
    let rag_service = CheckResult::from_probe(rag_ok, "Chat service unreachable");

    // Upstream checks are informational only.
    let status = if database.is_healthy() {
        "healthy"
    } else {
        "unhealthy"
    };

    Json(HealthResponse {
        status,
        version: VERSION,
        checks: HealthChecks {
            database,
            ai_service,
            rag_service,
        },
    })
}
