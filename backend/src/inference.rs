use async_trait::async_trait;
use log::{debug, error, info};
use serde_json::{json, Map, Value};
use std::time::Instant;

use crate::config::{RequestEnvelope, ScoringConfig};
use crate::error::PredictionError;
use crate::models::{EncodedFeatureVector, PatientFeatures, PredictionResponse};

/// Anything that can turn patient features into a readmission score.
#[async_trait]
pub trait ScoringService: Send + Sync {
    async fn predict(&self, features: &PatientFeatures) -> Result<PredictionResponse, PredictionError>;
}

/// Client for the remote scoring endpoint. One `predict` call is exactly one
/// outbound POST; nothing is retried or cached.
#[derive(Clone)]
pub struct PredictionClient {
    http: reqwest::Client,
    endpoint: reqwest::Url,
    envelope: RequestEnvelope,
}

impl PredictionClient {
    pub fn new(endpoint: &str, envelope: RequestEnvelope) -> Result<Self, PredictionError> {
        Self::from_config(&ScoringConfig {
            endpoint: endpoint.to_string(),
            request_envelope: envelope,
            timeout_secs: None,
        })
    }

    pub fn from_config(config: &ScoringConfig) -> Result<Self, PredictionError> {
        let endpoint = reqwest::Url::parse(&config.endpoint)
            .map_err(|e| PredictionError::Config(format!("invalid endpoint {:?}: {}", config.endpoint, e)))?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| PredictionError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint,
            envelope: config.request_envelope,
        })
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    pub fn envelope(&self) -> RequestEnvelope {
        self.envelope
    }
}

#[async_trait]
impl ScoringService for PredictionClient {
    async fn predict(&self, features: &PatientFeatures) -> Result<PredictionResponse, PredictionError> {
        let start_time = Instant::now();
        let encoded = features.encode();
        let payload = build_request_payload(&encoded, self.envelope);
        debug!("Scoring payload: {}", payload);

        let result: Result<PredictionResponse, PredictionError> = async {
            let response = self.http.post(self.endpoint.clone()).json(&payload).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(PredictionError::Status { status: status.as_u16() });
            }
            let body = response.bytes().await?;
            parse_prediction(&body)
        }
        .await;

        match &result {
            Ok(prediction) => info!(
                "Prediction received: score={:.4} in {} ms",
                prediction.prediction,
                start_time.elapsed().as_millis()
            ),
            Err(e) => error!("Prediction failed ({}): {}", e.kind(), e),
        }
        result
    }
}

/// `{"input": csv}`, either as-is or serialised under `body`.
pub fn build_request_payload(encoded: &EncodedFeatureVector, envelope: RequestEnvelope) -> Value {
    let inner = json!({ "input": encoded.as_str() });
    match envelope {
        RequestEnvelope::Direct => inner,
        RequestEnvelope::Proxy => json!({ "body": inner.to_string() }),
    }
}

/// Extracts the score from a raw response body. A `body` property is
/// unwrapped once; a string there holds JSON text.
pub fn parse_prediction(body: &[u8]) -> Result<PredictionResponse, PredictionError> {
    let top: Value = serde_json::from_slice(body)
        .map_err(|e| PredictionError::MalformedResponse(format!("response is not JSON: {}", e)))?;
    let top = into_object(top, "response")?;

    if let Some(status) = top.get("statusCode").and_then(Value::as_u64) {
        let status = u16::try_from(status).map_err(|_| {
            PredictionError::MalformedResponse(format!("statusCode {} is not an HTTP status", status))
        })?;
        if !(200..300).contains(&status) {
            return Err(PredictionError::Status { status });
        }
    }

    let payload = match top.get("body").map(unwrap_body) {
        Some(unwrapped) => unwrapped?,
        None => top,
    };

    extract_prediction(&payload)
}

fn unwrap_body(inner: &Value) -> Result<Map<String, Value>, PredictionError> {
    match inner {
        Value::String(text) => {
            let decoded: Value = serde_json::from_str(text)
                .map_err(|e| PredictionError::MalformedResponse(format!("body is not JSON: {}", e)))?;
            into_object(decoded, "body")
        }
        Value::Object(map) => Ok(map.clone()),
        other => Err(PredictionError::MalformedResponse(format!(
            "body must be a JSON string or object, got {}",
            other
        ))),
    }
}

fn into_object(value: Value, what: &str) -> Result<Map<String, Value>, PredictionError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(PredictionError::MalformedResponse(format!(
            "{} must be a JSON object, got {}",
            what, other
        ))),
    }
}

fn extract_prediction(payload: &Map<String, Value>) -> Result<PredictionResponse, PredictionError> {
    let (prediction, raw) = match payload.get("prediction") {
        Some(Value::String(raw)) => {
            let parsed = raw.trim().parse::<f64>().map_err(|_| {
                PredictionError::InvalidPrediction(format!("{:?} is not a number", raw))
            })?;
            (parsed, raw.clone())
        }
        Some(Value::Number(number)) => {
            let parsed = number.as_f64().ok_or_else(|| {
                PredictionError::InvalidPrediction(format!("{} is not representable as f64", number))
            })?;
            (parsed, number.to_string())
        }
        Some(other) => {
            return Err(PredictionError::InvalidPrediction(format!(
                "prediction must be text or a number, got {}",
                other
            )))
        }
        None => {
            return Err(PredictionError::InvalidPrediction(
                "response has no prediction field".to_string(),
            ))
        }
    };

    if !prediction.is_finite() {
        return Err(PredictionError::InvalidPrediction(format!("{:?} is not finite", raw)));
    }

    Ok(PredictionResponse { prediction, raw })
}
