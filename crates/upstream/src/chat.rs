//! Client for the external retrieval-augmented chat service.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::{UpstreamConfig, UpstreamError, build_client, probe_health};

const SERVICE: &str = "Chat service";

/// One prior message sent as conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatTurn {
    /// `"user"` or `"assistant"`.
    pub role: &'static str,
    pub content: String,
}

impl ChatTurn {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant",
            content: content.into(),
        }
    }
}

/// Body of `POST {base}/chat`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest<'a> {
    pub question: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disease: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urgency: Option<&'a str>,
    pub history: Vec<ChatTurn>,
}

/// Answer returned by the chat service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatAnswer {
    #[serde(alias = "response", alias = "text")]
    pub answer: String,
    /// Retrieved passages or citations, passed through as-is.
    #[serde(default)]
    pub sources: Vec<Value>,
}

/// Client for `POST {base}/chat`.
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: Client,
    config: UpstreamConfig,
}

impl ChatClient {
    /// Create a new client.
    ///
    /// # Errors
    /// Returns `UpstreamError::Request` if the HTTP client cannot be built.
    pub fn new(config: UpstreamConfig) -> Result<Self, UpstreamError> {
        let client = build_client(SERVICE, &config)?;
        Ok(Self { client, config })
    }

    /// Ask a question and return the generated answer.
    #[instrument(skip_all, fields(disease = request.disease, history = request.history.len()))]
    pub async fn ask(&self, request: &ChatRequest<'_>) -> Result<ChatAnswer, UpstreamError> {
        let response = self
            .client
            .post(self.config.endpoint("chat"))
            .json(request)
            .send()
            .await
            .map_err(|e| UpstreamError::from_transport(SERVICE, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::from_status(SERVICE, status));
        }

        let answer: ChatAnswer = response
            .json()
            .await
            .map_err(|e| UpstreamError::from_transport(SERVICE, &e))?;

        if answer.answer.trim().is_empty() {
            return Err(UpstreamError::InvalidResponse {
                service: SERVICE,
                reason: "empty answer".to_string(),
            });
        }

        debug!(sources = answer.sources.len(), "Chat answer received");
        Ok(answer)
    }

    /// Whether the service answers its health endpoint.
    pub async fn health_check(&self) -> bool {
        probe_health(&self.client, &self.config).await
    }
}
