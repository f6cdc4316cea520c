use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the seven patient attributes the scoring endpoint consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureField {
    #[serde(rename = "age")]
    Age,
    #[serde(rename = "gender")]
    Gender,
    #[serde(rename = "num_prior_admissions")]
    NumPriorAdmissions,
    #[serde(rename = "lab_result_1")]
    LabResult1,
    #[serde(rename = "lab_result_2")]
    LabResult2,
    #[serde(rename = "vital_bp")]
    VitalBp,
    #[serde(rename = "length_of_stay")]
    LengthOfStay,
}

impl FeatureField {
    /// Positional order of the encoded vector. The scoring endpoint reads
    /// features by position, so this must never be reordered.
    pub const ALL: [FeatureField; 7] = [
        FeatureField::Age,
        FeatureField::Gender,
        FeatureField::NumPriorAdmissions,
        FeatureField::LabResult1,
        FeatureField::LabResult2,
        FeatureField::VitalBp,
        FeatureField::LengthOfStay,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FeatureField::Age => "age",
            FeatureField::Gender => "gender",
            FeatureField::NumPriorAdmissions => "num_prior_admissions",
            FeatureField::LabResult1 => "lab_result_1",
            FeatureField::LabResult2 => "lab_result_2",
            FeatureField::VitalBp => "vital_bp",
            FeatureField::LengthOfStay => "length_of_stay",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FeatureField::Age => "Age",
            FeatureField::Gender => "Gender (0=M,1=F)",
            FeatureField::NumPriorAdmissions => "Prior admissions",
            FeatureField::LabResult1 => "Lab test 1",
            FeatureField::LabResult2 => "Lab test 2",
            FeatureField::VitalBp => "Vital BP",
            FeatureField::LengthOfStay => "Length of stay (days)",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|field| field.name() == name)
    }
}

impl fmt::Display for FeatureField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PatientFeatures {
    pub age: f64,
    pub gender: f64,
    pub num_prior_admissions: f64,
    pub lab_result_1: f64,
    pub lab_result_2: f64,
    pub vital_bp: f64,
    pub length_of_stay: f64,
}

impl Default for PatientFeatures {
    fn default() -> Self {
        PatientFeatures {
            age: 45.0,
            gender: 0.0,
            num_prior_admissions: 1.0,
            lab_result_1: 100.0,
            lab_result_2: 5.0,
            vital_bp: 120.0,
            length_of_stay: 3.0,
        }
    }
}

impl PatientFeatures {
    /// Only checks that every value is a usable number; ranges are left to
    /// the scoring endpoint.
    pub fn validate(&self) -> Result<(), String> {
        for field in FeatureField::ALL {
            let value = self.get(field);
            if !value.is_finite() {
                return Err(format!("{} must be a finite number (value: {})", field.label(), value));
            }
        }

        Ok(())
    }

    pub fn get(&self, field: FeatureField) -> f64 {
        match field {
            FeatureField::Age => self.age,
            FeatureField::Gender => self.gender,
            FeatureField::NumPriorAdmissions => self.num_prior_admissions,
            FeatureField::LabResult1 => self.lab_result_1,
            FeatureField::LabResult2 => self.lab_result_2,
            FeatureField::VitalBp => self.vital_bp,
            FeatureField::LengthOfStay => self.length_of_stay,
        }
    }

    pub fn set(&mut self, field: FeatureField, value: f64) {
        let slot = match field {
            FeatureField::Age => &mut self.age,
            FeatureField::Gender => &mut self.gender,
            FeatureField::NumPriorAdmissions => &mut self.num_prior_admissions,
            FeatureField::LabResult1 => &mut self.lab_result_1,
            FeatureField::LabResult2 => &mut self.lab_result_2,
            FeatureField::VitalBp => &mut self.vital_bp,
            FeatureField::LengthOfStay => &mut self.length_of_stay,
        };
        *slot = value;
    }

    pub fn to_array(&self) -> [f64; 7] {
        FeatureField::ALL.map(|field| self.get(field))
    }

    pub fn encode(&self) -> EncodedFeatureVector {
        let tokens: Vec<String> = self.to_array().iter().map(|value| value.to_string()).collect();
        EncodedFeatureVector(tokens.join(","))
    }
}

/// Comma-separated feature values in [`FeatureField::ALL`] order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFeatureVector(String);

impl EncodedFeatureVector {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.0.split(',')
    }
}

impl fmt::Display for EncodedFeatureVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A score returned by the scoring endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResponse {
    pub prediction: f64,
    /// The value exactly as the endpoint sent it, trailing newline included.
    pub raw: String,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub timestamp: String,
    pub execution_time_ms: Option<u64>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
            execution_time_ms: None,
        }
    }

    pub fn error(message: &str) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message.to_string()),
            timestamp: chrono::Utc::now().to_rfc3339(),
            execution_time_ms: None,
        }
    }

    pub fn with_elapsed(mut self, start: std::time::Instant) -> Self {
        self.execution_time_ms = Some(start.elapsed().as_millis() as u64);
        self
    }
}
