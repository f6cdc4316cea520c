use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::FormError;
use crate::inference::ScoringService;
use crate::models::{FeatureField, PatientFeatures, PredictionResponse};

#[derive(Debug, Default)]
struct FormState {
    values: PatientFeatures,
    error: Option<String>,
}

/// Immutable copy of a form for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct FormSnapshot {
    pub values: PatientFeatures,
    pub busy: bool,
    pub error: Option<String>,
}

/// Patient input form. At most one submission is in flight at a time; a
/// second one while busy is rejected rather than queued.
#[derive(Debug, Default)]
pub struct PatientForm {
    state: Mutex<FormState>,
    busy: AtomicBool,
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl PatientForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values(values: PatientFeatures) -> Self {
        PatientForm {
            state: Mutex::new(FormState { values, error: None }),
            busy: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FormState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Refused while a submission is in flight.
    pub fn set_field(&self, name: &str, text: &str) -> Result<(), FormError> {
        self.apply([(name, text)])
    }

    /// Sets several fields at once; nothing changes unless every pair parses.
    /// Refused while a submission is in flight.
    pub fn apply<'a, I>(&self, pairs: I) -> Result<(), FormError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let parsed = parse_fields(pairs)?;
        let mut state = self.lock();
        if self.is_busy() {
            return Err(FormError::Busy);
        }
        assign(&mut state, parsed);
        Ok(())
    }

    pub fn values(&self) -> PatientFeatures {
        self.lock().values.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn set_error(&self, message: impl Into<String>) {
        self.lock().error = Some(message.into());
    }

    pub fn snapshot(&self) -> FormSnapshot {
        let state = self.lock();
        FormSnapshot {
            values: state.values.clone(),
            busy: self.is_busy(),
            error: state.error.clone(),
        }
    }

    fn acquire(&self) -> Result<BusyGuard<'_>, FormError> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| BusyGuard(&self.busy))
            .map_err(|_| {
                warn!("Submission rejected: prediction already in progress");
                FormError::Busy
            })
    }

    /// Sends the current values to `service` and hands a successful response
    /// to `on_result`. A failure is kept as the form's inline error; field
    /// values are never touched.
    pub async fn submit<S, F>(&self, service: &S, on_result: F) -> Result<(), FormError>
    where
        S: ScoringService + ?Sized,
        F: FnOnce(PredictionResponse),
    {
        let _busy = self.acquire()?;
        self.run(service, on_result).await
    }

    /// Like [`submit`](Self::submit), but first applies `pairs`. The busy flag
    /// is taken before any field changes, so a rejected submission leaves the
    /// values alone.
    pub async fn submit_with<'a, I, S, F>(&self, pairs: I, service: &S, on_result: F) -> Result<(), FormError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
        S: ScoringService + ?Sized,
        F: FnOnce(PredictionResponse),
    {
        let _busy = self.acquire()?;
        match parse_fields(pairs) {
            Ok(parsed) => {
                let mut state = self.lock();
                assign(&mut state, parsed);
            }
            Err(e) => {
                self.set_error(e.to_string());
                return Err(e);
            }
        }
        self.run(service, on_result).await
    }

    async fn run<S, F>(&self, service: &S, on_result: F) -> Result<(), FormError>
    where
        S: ScoringService + ?Sized,
        F: FnOnce(PredictionResponse),
    {
        let values = {
            let mut state = self.lock();
            state.error = None;
            state.values.clone()
        };
        info!("Submitting patient features: {}", values.encode());

        match service.predict(&values).await {
            Ok(response) => {
                on_result(response);
                Ok(())
            }
            Err(e) => {
                self.set_error(e.to_string());
                Err(FormError::Prediction(e))
            }
        }
    }
}

fn parse_fields<'a, I>(pairs: I) -> Result<Vec<(FeatureField, f64)>, FormError>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    pairs
        .into_iter()
        .map(|(name, text)| parse_field(name, text))
        .collect()
}

fn assign(state: &mut FormState, parsed: Vec<(FeatureField, f64)>) {
    for (field, value) in parsed {
        state.values.set(field, value);
    }
}

fn parse_field(name: &str, text: &str) -> Result<(FeatureField, f64), FormError> {
    let field = FeatureField::from_name(name).ok_or_else(|| FormError::UnknownField(name.to_string()))?;
    let value = text
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| FormError::NotNumeric {
            field: field.label(),
            value: text.to_string(),
        })?;
    Ok((field, value))
}

/// Dashboard page state: the form plus the last successful prediction.
#[derive(Debug, Default)]
pub struct Dashboard {
    form: PatientForm,
    result: Mutex<Option<PredictionResponse>>,
}

impl Dashboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn form(&self) -> &PatientForm {
        &self.form
    }

    pub fn result(&self) -> Option<PredictionResponse> {
        self.result.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set_result(&self, response: PredictionResponse) {
        *self.result.lock().unwrap_or_else(PoisonError::into_inner) = Some(response);
    }

    pub async fn submit<S>(&self, service: &S) -> Result<(), FormError>
    where
        S: ScoringService + ?Sized,
    {
        self.form.submit(service, |response| self.set_result(response)).await
    }

    pub async fn submit_with<'a, I, S>(&self, pairs: I, service: &S) -> Result<(), FormError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
        S: ScoringService + ?Sized,
    {
        self.form
            .submit_with(pairs, service, |response| self.set_result(response))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PredictionError;
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::sync::Notify;

    struct FixedScore(f64);

    #[async_trait]
    impl ScoringService for FixedScore {
        async fn predict(&self, _features: &PatientFeatures) -> Result<PredictionResponse, PredictionError> {
            Ok(PredictionResponse {
                prediction: self.0,
                raw: format!("{}\n", self.0),
            })
        }
    }

    struct Unreachable;

    #[async_trait]
    impl ScoringService for Unreachable {
        async fn predict(&self, _features: &PatientFeatures) -> Result<PredictionResponse, PredictionError> {
            Err(PredictionError::Status { status: 503 })
        }
    }

    /// Holds every call until released.
    struct Gate {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl ScoringService for Gate {
        async fn predict(&self, _features: &PatientFeatures) -> Result<PredictionResponse, PredictionError> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(PredictionResponse {
                prediction: 0.5,
                raw: "0.5".to_string(),
            })
        }
    }

    #[test]
    fn fresh_form_uses_defaults() {
        let snapshot = PatientForm::new().snapshot();
        assert_eq!(snapshot.values, PatientFeatures::default());
        assert!(!snapshot.busy);
        assert_eq!(snapshot.error, None);
    }

    #[test]
    fn set_field_parses_numbers() {
        let form = PatientForm::new();
        form.set_field("age", " 72 ").unwrap();
        form.set_field("lab_result_2", "4.75").unwrap();
        let values = form.values();
        assert_eq!(values.age, 72.0);
        assert_eq!(values.lab_result_2, 4.75);
    }

    #[test]
    fn bad_input_leaves_value_untouched() {
        let form = PatientForm::new();
        let err = form.set_field("vital_bp", "high").unwrap_err();
        assert!(matches!(err, FormError::NotNumeric { field: "Vital BP", .. }));
        assert!(matches!(form.set_field("weight", "80"), Err(FormError::UnknownField(_))));
        assert!(form.set_field("age", "").is_err());
        assert_eq!(form.values(), PatientFeatures::default());
    }

    #[test]
    fn apply_is_all_or_nothing() {
        let form = PatientForm::new();
        let result = form.apply([("age", "50"), ("gender", "one")]);
        assert!(result.is_err());
        assert_eq!(form.values().age, 45.0);

        form.apply([("age", "50"), ("gender", "1")]).unwrap();
        assert_eq!(form.values().encode().as_str(), "50,1,1,100,5,120,3");
    }

    #[tokio::test]
    async fn successful_submit_updates_dashboard_result() {
        let dashboard = Dashboard::new();
        dashboard.submit(&FixedScore(0.81)).await.unwrap();

        let result = dashboard.result().unwrap();
        assert_eq!(result.prediction, 0.81);
        assert!(!dashboard.form().is_busy());
    }

    #[tokio::test]
    async fn failed_submit_reenables_form_and_keeps_values() {
        let dashboard = Dashboard::new();
        dashboard.submit(&FixedScore(0.2)).await.unwrap();
        dashboard.form().set_field("length_of_stay", "9").unwrap();
        let before = dashboard.form().values();

        let err = dashboard.submit(&Unreachable).await.unwrap_err();
        assert!(matches!(err, FormError::Prediction(_)));

        let snapshot = dashboard.form().snapshot();
        assert!(!snapshot.busy);
        assert!(snapshot.error.as_deref().is_some_and(|message| !message.is_empty()));
        assert_eq!(snapshot.values, before);
        // the previous result survives a failed submission
        assert_eq!(dashboard.result().map(|r| r.prediction), Some(0.2));

        dashboard.submit(&FixedScore(0.4)).await.unwrap();
        assert_eq!(dashboard.form().snapshot().error, None);
    }

    #[tokio::test]
    async fn second_submit_while_busy_is_rejected() {
        let dashboard = Arc::new(Dashboard::new());
        let gate = Arc::new(Gate {
            entered: Notify::new(),
            release: Notify::new(),
        });

        let first = {
            let dashboard = Arc::clone(&dashboard);
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { dashboard.submit(gate.as_ref()).await })
        };

        gate.entered.notified().await;
        assert!(dashboard.form().is_busy());

        let second = dashboard.submit(gate.as_ref()).await;
        assert!(matches!(second, Err(FormError::Busy)));

        gate.release.notify_one();
        first.await.unwrap().unwrap();
        assert!(!dashboard.form().is_busy());
        assert_eq!(dashboard.result().map(|r| r.raw), Some("0.5".to_string()));
    }

    #[tokio::test]
    async fn rejected_submission_does_not_touch_values() {
        let dashboard = Arc::new(Dashboard::new());
        let gate = Arc::new(Gate {
            entered: Notify::new(),
            release: Notify::new(),
        });

        let first = {
            let dashboard = Arc::clone(&dashboard);
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { dashboard.submit_with([("age", "60")], gate.as_ref()).await })
        };

        gate.entered.notified().await;
        let in_flight = dashboard.form().values();
        assert_eq!(in_flight.age, 60.0);

        let second = dashboard.submit_with([("age", "99"), ("vital_bp", "180")], gate.as_ref()).await;
        assert!(matches!(second, Err(FormError::Busy)));
        assert!(matches!(dashboard.form().apply([("age", "99")]), Err(FormError::Busy)));
        assert!(matches!(dashboard.form().set_field("vital_bp", "180"), Err(FormError::Busy)));
        assert_eq!(dashboard.form().values(), in_flight);

        gate.release.notify_one();
        first.await.unwrap().unwrap();
        assert_eq!(dashboard.form().values(), in_flight);
        assert!(dashboard.form().apply([("age", "99")]).is_ok());
    }

    #[tokio::test]
    async fn submit_with_bad_field_reports_inline_and_releases_busy() {
        let dashboard = Dashboard::new();
        let err = dashboard
            .submit_with([("age", "70"), ("gender", "x")], &FixedScore(0.9))
            .await
            .unwrap_err();

        assert!(matches!(err, FormError::NotNumeric { .. }));
        let snapshot = dashboard.form().snapshot();
        assert!(!snapshot.busy);
        assert!(snapshot.error.is_some());
        assert_eq!(snapshot.values, PatientFeatures::default());
        assert!(dashboard.result().is_none());
    }
}
