pub mod config;
pub mod error;
pub mod form;
pub mod inference;
pub mod models;
pub mod risk;
pub mod routes;
pub mod session;
pub mod views;

pub use error::{FormError, PredictionError};
pub use inference::{PredictionClient, ScoringService};
pub use models::{PatientFeatures, PredictionResponse};
pub use risk::{RiskAssessment, RiskBand};
