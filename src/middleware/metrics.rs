//! Request metrics middleware.
//!
//! # Metrics Emitted
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `http_requests_total` | Counter | `method`, `path`, `status` | Total request count |
//! | `http_request_duration_seconds` | Histogram | `method`, `path`, `status` | Request latency |
//!
//! `path` is the route template: UUID segments become `{id}`, education
//! labels become `{label}`, and anything not in [`KNOWN_PATHS`] is bucketed
//! as `/*` to keep label cardinality bounded.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use http::{Request, Response};
use tower::{Layer, Service};
use uuid::Uuid;

/// Route templates reported verbatim.
const KNOWN_PATHS: &[&str] = &[
    "/",
    "/health",
    "/health/live",
    "/health/ready",
    "/metrics",
    "/api/auth/register",
    "/api/auth/login",
    "/api/auth/me",
    "/api/predict",
    "/api/assessments",
    "/api/assessments/{id}",
    "/api/chat",
    "/api/chat/history",
    "/api/consent",
    "/api/education",
    "/api/education/{label}",
    "/api/admin/users/{id}/consents",
];

const EDUCATION_PREFIX: &str = "/api/education/";

/// Tower layer for request metrics collection.
#[derive(Clone, Copy, Default)]
pub struct MetricsLayer;

impl MetricsLayer {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsMiddleware { inner }
    }
}

/// Metrics middleware service.
#[derive(Clone)]
pub struct MetricsMiddleware<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for MetricsMiddleware<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    ReqBody: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let method = req.method().to_string();
        let path = normalize_path(req.uri().path());
        let start = Instant::now();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let response = inner.call(req).await?;

            let labels = [
                ("method", method),
                ("path", path),
                ("status", response.status().as_u16().to_string()),
            ];
            metrics::counter!("http_requests_total", &labels).increment(1);
            metrics::histogram!("http_request_duration_seconds", &labels)
                .record(start.elapsed().as_secs_f64());

            Ok(response)
        })
    }
}

/// Map a request path to its route template, or `/*` if unknown.
fn normalize_path(path: &str) -> String {
    let path = match path.strip_suffix('/') {
        Some(trimmed) if !trimmed.is_empty() => trimmed,
        _ => path,
    };

    if let Some(label) = path.strip_prefix(EDUCATION_PREFIX)
        && !label.is_empty()
        && !label.contains('/')
    {
        return "/api/education/{label}".to_string();
    }

    let template = path
        .split('/')
        .map(|segment| {
            if Uuid::try_parse(segment).is_ok() {
                "{id}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/");

    if KNOWN_PATHS.contains(&template.as_str()) {
        template
    } else {
        "/*".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_paths_pass_through() {
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("/health/ready"), "/health/ready");
        assert_eq!(normalize_path("/api/predict"), "/api/predict");
        assert_eq!(normalize_path("/api/chat/history/"), "/api/chat/history");
    }

    #[test]
    fn uuid_segments_are_templated() {
        assert_eq!(
            normalize_path("/api/assessments/9b2f6a0e-8a4e-4d8c-9a57-0c1f2a3b4c5d"),
            "/api/assessments/{id}"
        );
        assert_eq!(
            normalize_path("/api/admin/users/9b2f6a0e-8a4e-4d8c-9a57-0c1f2a3b4c5d/consents"),
            "/api/admin/users/{id}/consents"
        );
    }

    #[test]
    fn education_labels_are_templated() {
        assert_eq!(normalize_path("/api/education/melanoma"), "/api/education/{label}");
        assert_eq!(normalize_path("/api/education"), "/api/education");
    }

    #[test]
    fn unknown_paths_bucketed() {
        assert_eq!(normalize_path("/api/assessments/not-a-uuid"), "/*");
        assert_eq!(normalize_path("/wp-login.php"), "/*");
        assert_eq!(normalize_path("/api/education/a/b"), "/*");
    }
}
