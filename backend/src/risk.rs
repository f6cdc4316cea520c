use serde::Serialize;
use std::fmt;

use crate::models::PredictionResponse;

pub const HIGH_THRESHOLD: f64 = 0.7;
pub const MEDIUM_THRESHOLD: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskBand {
    Low,
    Medium,
    High,
}

impl RiskBand {
    /// `>= 0.7` is High, `>= 0.3` is Medium, anything else is Low.
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= HIGH_THRESHOLD => RiskBand::High,
            s if s >= MEDIUM_THRESHOLD => RiskBand::Medium,
            _ => RiskBand::Low,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RiskBand::Low => "Low",
            RiskBand::Medium => "Medium",
            RiskBand::High => "High",
        }
    }

    /// CSS class suffix used by the result card.
    pub fn css_class(&self) -> &'static str {
        match self {
            RiskBand::Low => "band-low",
            RiskBand::Medium => "band-medium",
            RiskBand::High => "band-high",
        }
    }
}

impl fmt::Display for RiskBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub fn percentage(score: f64) -> f64 {
    score * 100.0
}

/// Two decimals, ties rounded away from zero.
pub fn format_percentage(score: f64) -> String {
    let rounded = (percentage(score) * 100.0).round() / 100.0;
    format!("{:.2}", rounded)
}

/// Two slices of the risk donut chart, each kept within [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskDistribution {
    pub low: f64,
    pub high: f64,
}

impl RiskDistribution {
    pub fn from_score(score: f64) -> Self {
        RiskDistribution {
            low: (1.0 - score).clamp(0.0, 1.0),
            high: score.clamp(0.0, 1.0),
        }
    }
}

/// Everything the result card and chart need, derived from one response.
#[derive(Debug, Clone, Serialize)]
pub struct RiskAssessment {
    pub prediction: f64,
    pub raw: String,
    pub percent: String,
    pub band: RiskBand,
    pub distribution: RiskDistribution,
}

impl RiskAssessment {
    pub fn new(response: &PredictionResponse) -> Self {
        RiskAssessment {
            prediction: response.prediction,
            raw: response.raw.clone(),
            percent: format_percentage(response.prediction),
            band: RiskBand::from_score(response.prediction),
            distribution: RiskDistribution::from_score(response.prediction),
        }
    }

    /// Plain-text report used by the command line.
    pub fn summary(&self) -> String {
        format!(
            "Readmission risk: {}% ({})\nRaw score: {}",
            self.percent,
            self.band,
            self.raw.trim_end()
        )
    }
}
