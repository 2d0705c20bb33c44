//! Server startup and wiring.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use http::header::HeaderName;
use http::{Request, StatusCode};
use medlens_core::JwtValidator;
use medlens_db::{Database, create_pool};
use medlens_telemetry::PrometheusHandle;
use medlens_upstream::{ChatClient, PredictionClient};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::{Level, info};

use crate::config::Config;
use crate::core::{DiseaseCatalog, ServiceContext};
use crate::middleware::{AuthLayer, MetricsLayer, REQUEST_ID_HEADER, RequestIdLayer};
use crate::routes::{rest_routes, with_metrics};

/// Build and configure the complete application.
pub async fn build_app(
    config: &Config,
    metrics_handle: PrometheusHandle,
) -> anyhow::Result<(Router, SocketAddr)> {
    let jwt_validator = JwtValidator::new(&config.jwt_secret_key);

    // Database
    let pool = create_pool(&config.db_config()).await?;
    info!("Connected to database");
    let database = Database::new(pool);
    if config.db_migrate {
        database.migrate().await?;
        info!("Database migrations applied");
    }

    // Education catalog
    let catalog = DiseaseCatalog::load(&config.disease_info_path).with_context(|| {
        format!(
            "Failed to load disease catalog from {}",
            config.disease_info_path.display()
        )
    })?;
    info!(entries = catalog.len(), "Disease catalog loaded");

    // Upstream clients
    let predictor = PredictionClient::new(config.ai_service()?)?;
    let chat = ChatClient::new(config.rag_service()?)?;

    let addr: SocketAddr = config.http_address.parse()?;

    let state = Arc::new(ServiceContext::new(
        database,
        jwt_validator.clone(),
        Arc::new(catalog),
        predictor,
        chat,
        config.service_settings(),
    ));

    let router = with_metrics(rest_routes(state), metrics_handle);

    let cors = build_cors(config.cors_allow_origins.as_deref());

    // Executes top to bottom on the request.
    let middleware = ServiceBuilder::new()
        .layer(RequestIdLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request<_>| {
                    tracing::info_span!(
                        "request",
                        method = %req.method(),
                        uri = %req.uri(),
                        request_id = tracing::field::Empty,
                        user_id = tracing::field::Empty,
                    )
                })
                .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
        )
        .layer(MetricsLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout(),
        ))
        .layer(cors)
        .layer(AuthLayer::new(jwt_validator));

    Ok((router.layer(middleware), addr))
}

fn build_cors(origins: Option<&str>) -> CorsLayer {
    let cors = match origins {
        Some(o) if o.trim() == "*" => CorsLayer::permissive(),
        Some(o) => {
            let origins: Vec<_> = o.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            CorsLayer::new().allow_origin(origins)
        }
        None => CorsLayer::permissive(),
    };

    cors.allow_headers(Any)
        .expose_headers([HeaderName::from_static(REQUEST_ID_HEADER)])
        .allow_methods(Any)
        .max_age(Duration::from_secs(3600))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::routing::get;
    use http::header;
    use tower::ServiceExt;

    use super::*;

    #[tokio::test]
    async fn cors_allows_listed_origin_and_exposes_request_id() {
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(build_cors(Some("https://app.example.com, https://admin.example.com")));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(header::ORIGIN, "https://admin.example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let headers = response.headers();
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://admin.example.com"
        );
        assert_eq!(headers[header::ACCESS_CONTROL_EXPOSE_HEADERS], REQUEST_ID_HEADER);
    }

    #[tokio::test]
    async fn cors_ignores_unlisted_origin() {
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(build_cors(Some("https://app.example.com")));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(header::ORIGIN, "https://evil.example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(
            !response
                .headers()
                .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        );
    }
}
