//! Client for the external image classification service.

use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::{UpstreamConfig, UpstreamError, build_client, probe_health};

const SERVICE: &str = "AI service";

/// Image forwarded to the prediction service.
#[derive(Debug, Clone, Copy)]
pub struct ImagePayload<'a> {
    pub bytes: &'a [u8],
    pub filename: &'a str,
    pub content_type: &'a str,
}

/// One candidate label with its score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelScore {
    pub label: String,
    pub confidence: f64,
}

/// Parsed prediction plus the untouched upstream JSON.
#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    pub label: String,
    pub confidence: f64,
    pub top_predictions: Vec<LabelScore>,
    #[serde(skip)]
    pub raw: Value,
}

// Synonyms are separate fields: serde aliases reject bodies carrying two of them.
#[derive(Deserialize)]
struct WirePrediction {
    prediction: Option<String>,
    label: Option<String>,
    class: Option<String>,
    predicted_class: Option<String>,
    confidence: Option<f64>,
    probability: Option<f64>,
    score: Option<f64>,
    top_predictions: Option<Vec<Value>>,
}

#[derive(Deserialize)]
struct WireScore {
    label: Option<String>,
    class: Option<String>,
    name: Option<String>,
    confidence: Option<f64>,
    probability: Option<f64>,
    score: Option<f64>,
}

fn is_probability(value: f64) -> bool {
    (0.0..=1.0).contains(&value)
}

impl WireScore {
    /// Usable candidate, or `None` for malformed entries.
    fn parse(value: Value) -> Option<LabelScore> {
        let wire: Self = serde_json::from_value(value).ok()?;
        let label = wire.label.or(wire.class).or(wire.name)?.trim().to_string();
        let confidence = wire.confidence.or(wire.probability).or(wire.score)?;
        (!label.is_empty() && is_probability(confidence))
            .then_some(LabelScore { label, confidence })
    }
}

impl Prediction {
    /// Parse and sanity-check the upstream body.
    fn from_body(body: Value) -> Result<Self, UpstreamError> {
        let invalid = |reason: String| UpstreamError::InvalidResponse {
            service: SERVICE,
            reason,
        };

        let wire: WirePrediction =
            serde_json::from_value(body.clone()).map_err(|e| invalid(e.to_string()))?;

        let label = wire
            .prediction
            .or(wire.label)
            .or(wire.class)
            .or(wire.predicted_class)
            .unwrap_or_default()
            .trim()
            .to_string();
        if label.is_empty() {
            return Err(invalid("empty label".to_string()));
        }
        let confidence = wire
            .confidence
            .or(wire.probability)
            .or(wire.score)
            .ok_or_else(|| invalid("missing confidence".to_string()))?;
        if !is_probability(confidence) {
            return Err(invalid(format!("confidence {confidence} outside [0, 1]")));
        }

        let top_predictions = wire
            .top_predictions
            .unwrap_or_default()
            .into_iter()
            .filter_map(WireScore::parse)
            .collect();

        Ok(Self {
            label,
            confidence,
            top_predictions,
            raw: body,
        })
    }
}

/// Client for `POST {base}/predict`.
#[derive(Debug, Clone)]
pub struct PredictionClient {
    client: Client,
    config: UpstreamConfig,
}

impl PredictionClient {
    /// Create a new client.
    ///
    /// # Errors
    /// Returns `UpstreamError::Request` if the HTTP client cannot be built.
    pub fn new(config: UpstreamConfig) -> Result<Self, UpstreamError> {
        let client = build_client(SERVICE, &config)?;
        Ok(Self { client, config })
    }

    /// Forward an image and return the parsed prediction.
    #[instrument(skip(self, image), fields(size = image.bytes.len(), content_type = image.content_type))]
    pub async fn predict(&self, image: ImagePayload<'_>) -> Result<Prediction, UpstreamError> {
        let part = Part::bytes(image.bytes.to_vec())
            .file_name(image.filename.to_string())
            .mime_str(image.content_type)
            .map_err(|e| UpstreamError::Request {
                service: SERVICE,
                reason: e.to_string(),
            })?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(self.config.endpoint("predict"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| UpstreamError::from_transport(SERVICE, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::from_status(SERVICE, status));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| UpstreamError::from_transport(SERVICE, &e))?;

        let prediction = Prediction::from_body(body)?;
        debug!(
            label = %prediction.label,
            confidence = prediction.confidence,
            "Prediction received"
        );
        Ok(prediction)
    }

    /// Whether the service answers its health endpoint.
    pub async fn health_check(&self) -> bool {
        probe_health(&self.client, &self.config).await
    }
}
