//! Bearer token authentication middleware.
//!
//! Validates `Authorization: Bearer <jwt>` on every non-public route and
//! injects [`AuthInfo`] into request extensions for handlers to extract.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::response::IntoResponse;
use http::{Request, Response};
use medlens_core::{AppError, AuthInfo, JwtError, JwtValidator};
use phf::phf_set;
use tower::{Layer, Service};
use tracing::{Span, debug};

/// Routes reachable without a token (exact match).
static PUBLIC_ROUTES: phf::Set<&'static str> = phf_set! {
    "/",
    "/health",
    "/health/live",
    "/health/ready",
    "/metrics",
    "/api/auth/register",
    "/api/auth/login",
    "/api/education",
};

/// Route prefixes reachable without a token.
const PUBLIC_PREFIXES: &[&str] = &["/api/education/"];

/// Tower layer for JWT authentication.
#[derive(Clone)]
pub struct AuthLayer {
    validator: JwtValidator,
}

impl AuthLayer {
    #[must_use]
    pub const fn new(validator: JwtValidator) -> Self {
        Self { validator }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthMiddleware {
            inner,
            validator: self.validator.clone(),
        }
    }
}

/// Authentication middleware service.
#[derive(Clone)]
pub struct AuthMiddleware<S> {
    inner: S,
    validator: JwtValidator,
}

impl<S, ReqBody> Service<Request<ReqBody>> for AuthMiddleware<S>
where
    S: Service<Request<ReqBody>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
    ReqBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        // CORS preflight never carries credentials
        if req.method() == http::Method::OPTIONS || is_public_route(req.uri().path()) {
            let mut inner = self.inner.clone();
            return Box::pin(async move { inner.call(req).await });
        }

        match self.authenticate(&req) {
            Ok(auth_info) => {
                Span::current().record("user_id", auth_info.user_id.to_string());
                debug!(user_id = %auth_info.user_id, role = %auth_info.role, "Authenticated");
                req.extensions_mut().insert(auth_info);
                let mut inner = self.inner.clone();
                Box::pin(async move { inner.call(req).await })
            }
            Err(err) => {
                debug!(path = req.uri().path(), error = %err, "Authentication failed");
                let response = AppError::Unauthenticated(unauthenticated_message(&err)).into_response();
                Box::pin(async move { Ok(response) })
            }
        }
    }
}

impl<S> AuthMiddleware<S> {
    fn authenticate<T>(&self, req: &Request<T>) -> Result<AuthInfo, JwtError> {
        let header = req
            .headers()
            .get(http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(JwtError::MissingHeader)?;

        let token = bearer_token(header).ok_or(JwtError::InvalidFormat)?;
        self.validator.validate(token)
    }
}

/// Token from a `Bearer <token>` header value, scheme matched case-insensitively.
fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

fn unauthenticated_message(err: &JwtError) -> String {
    match err {
        JwtError::MissingHeader => "Authentication required".to_string(),
        JwtError::InvalidFormat => "Authorization header must be 'Bearer <token>'".to_string(),
        _ => "Invalid or expired token".to_string(),
    }
}

/// Whether `path` bypasses authentication.
fn is_public_route(path: &str) -> bool {
    PUBLIC_ROUTES.contains(path) || PUBLIC_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}
