use thiserror::Error;

/// Failure of a single exchange with the scoring endpoint.
#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("Network failure: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Scoring endpoint returned status {status}")]
    Status { status: u16 },
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    #[error("Invalid prediction: {0}")]
    InvalidPrediction(String),
    #[error("Scoring client configuration error: {0}")]
    Config(String),
}

impl PredictionError {
    /// Short category name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PredictionError::Network(_) => "network",
            PredictionError::Status { .. } => "status",
            PredictionError::MalformedResponse(_) => "malformed_response",
            PredictionError::InvalidPrediction(_) => "invalid_prediction",
            PredictionError::Config(_) => "config",
        }
    }
}

#[derive(Debug, Error)]
pub enum FormError {
    #[error("Unknown form field: {0}")]
    UnknownField(String),
    #[error("{field} must be a number (got {value:?})")]
    NotNumeric { field: &'static str, value: String },
    #[error("A prediction is already in progress")]
    Busy,
    #[error(transparent)]
    Prediction(#[from] PredictionError),
}
