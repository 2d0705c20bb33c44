//! HTTP clients for the two external services the backend fronts:
//!
//! - [`PredictionClient`]: image classification (`POST {base}/predict`, multipart)
//! - [`ChatClient`]: retrieval-augmented chat (`POST {base}/chat`, JSON)
//!
//! Both are thin pass-throughs. Failures are classified into [`UpstreamError`]
//! and translated to generic HTTP statuses via `AppError`. Nothing is retried.

mod chat;
mod prediction;

use std::time::Duration;

use medlens_core::AppError;
use reqwest::{Client, StatusCode};
use tracing::warn;
use url::Url;

pub use chat::{ChatAnswer, ChatClient, ChatRequest, ChatTurn};
pub use prediction::{ImagePayload, LabelScore, Prediction, PredictionClient};

/// Connect timeout applied to every upstream request.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Upstream call errors.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("{service} is unreachable: {reason}")]
    Unreachable { service: &'static str, reason: String },
    #[error("{service} timed out")]
    Timeout { service: &'static str },
    #[error("{service} rejected the request with status {status}")]
    Rejected { service: &'static str, status: StatusCode },
    #[error("{service} failed with status {status}")]
    Failed { service: &'static str, status: StatusCode },
    #[error("{service} returned an invalid response: {reason}")]
    InvalidResponse { service: &'static str, reason: String },
    #[error("{service} request could not be built: {reason}")]
    Request { service: &'static str, reason: String },
}

impl UpstreamError {
    /// Classify a transport-level `reqwest` error.
    fn from_transport(service: &'static str, e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout { service }
        } else if e.is_connect() {
            Self::Unreachable {
                service,
                reason: e.to_string(),
            }
        } else if e.is_decode() || e.is_body() {
            Self::InvalidResponse {
                service,
                reason: e.to_string(),
            }
        } else if e.is_builder() {
            Self::Request {
                service,
                reason: e.to_string(),
            }
        } else {
            Self::Unreachable {
                service,
                reason: e.to_string(),
            }
        }
    }

    /// Classify a non-success HTTP status.
    fn from_status(service: &'static str, status: StatusCode) -> Self {
        match status {
            StatusCode::BAD_REQUEST
            | StatusCode::PAYLOAD_TOO_LARGE
            | StatusCode::UNSUPPORTED_MEDIA_TYPE
            | StatusCode::UNPROCESSABLE_ENTITY => Self::Rejected { service, status },
            _ => Self::Failed { service, status },
        }
    }
}

impl From<UpstreamError> for AppError {
    fn from(e: UpstreamError) -> Self {
        warn!(error = %e, "Upstream call failed");
        match e {
            UpstreamError::Unreachable { service, .. } => {
                Self::Unavailable(format!("{service} unavailable"))
            }
            UpstreamError::Timeout { service } => {
                Self::GatewayTimeout(format!("{service} did not respond in time"))
            }
            UpstreamError::Rejected { service, .. } => {
                Self::Unprocessable(format!("{service} rejected the request"))
            }
            UpstreamError::Failed { service, .. } => {
                Self::BadGateway(format!("{service} returned an error"))
            }
            UpstreamError::InvalidResponse { service, .. } => {
                Self::BadGateway(format!("{service} returned an invalid response"))
            }
            UpstreamError::Request { service, reason } => {
                Self::Internal(format!("{service} request build failed: {reason}"))
            }
        }
    }
}

/// Connection settings for one upstream service.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Base URL, e.g. `http://ai:8000`.
    pub base_url: Url,
    /// Total request timeout.
    pub timeout: Duration,
}

impl UpstreamConfig {
    /// Absolute URL for `path` under the base URL, keeping any base path prefix.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Build the shared `reqwest` client for one upstream service.
fn build_client(service: &'static str, config: &UpstreamConfig) -> Result<Client, UpstreamError> {
    Client::builder()
        .timeout(config.timeout)
        .connect_timeout(CONNECT_TIMEOUT.min(config.timeout))
        .user_agent(concat!("medlens/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| UpstreamError::Request {
            service,
            reason: e.to_string(),
        })
}

/// GET `{base}/health` and report whether it answered 2xx.
async fn probe_health(client: &Client, config: &UpstreamConfig) -> bool {
    client
        .get(config.endpoint("health"))
        .send()
        .await
        .is_ok_and(|r| r.status().is_success())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_double_slash() {
        let config = UpstreamConfig {
            base_url: "http://ai:8000/".parse().unwrap(),
            timeout: Duration::from_secs(1),
        };
        assert_eq!(config.endpoint("/predict"), "http://ai:8000/predict");

        let prefixed = UpstreamConfig {
            base_url: "http://gateway/ml".parse().unwrap(),
            timeout: Duration::from_secs(1),
        };
        assert_eq!(prefixed.endpoint("predict"), "http://gateway/ml/predict");
    }

    #[test]
    fn status_classification() {
        assert!(matches!(
            UpstreamError::from_status("AI service", StatusCode::UNPROCESSABLE_ENTITY),
            UpstreamError::Rejected { .. }
        ));
        assert!(matches!(
            UpstreamError::from_status("AI service", StatusCode::NOT_FOUND),
            UpstreamError::Failed { .. }
        ));
        assert!(matches!(
            UpstreamError::from_status("AI service", StatusCode::INTERNAL_SERVER_ERROR),
            UpstreamError::Failed { .. }
        ));
    }

    #[test]
    fn app_error_translation() {
        let service = "AI service";
        assert!(matches!(
            AppError::from(UpstreamError::Unreachable { service, reason: String::new() }),
            AppError::Unavailable(msg) if msg == "AI service unavailable"
        ));
        assert!(matches!(
            AppError::from(UpstreamError::Timeout { service }),
            AppError::GatewayTimeout(_)
        ));
        assert!(matches!(
            AppError::from(UpstreamError::Rejected { service, status: StatusCode::BAD_REQUEST }),
            AppError::Unprocessable(_)
        ));
        assert!(matches!(
            AppError::from(UpstreamError::Failed { service, status: StatusCode::BAD_GATEWAY }),
            AppError::BadGateway(_)
        ));
        assert!(matches!(
            AppError::from(UpstreamError::InvalidResponse { service, reason: String::new() }),
            AppError::BadGateway(_)
        ));
    }
}
