use actix_web::http::header::ContentType;
use actix_web::{get, post, web, HttpResponse, Responder};
use log::{error, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::error::{FormError, PredictionError};
use crate::form::Dashboard;
use crate::inference::ScoringService;
use crate::models::{ApiResponse, PatientFeatures};
use crate::risk::RiskAssessment;
use crate::session::DashboardRegistry;
use crate::views;

pub const FORM_ID_FIELD: &str = "form_id";

/// Shared by every worker.
pub struct AppState {
    pub scoring: Arc<dyn ScoringService>,
    pub dashboards: DashboardRegistry,
    pub status_label: String,
}

impl AppState {
    pub fn new(scoring: Arc<dyn ScoringService>, session_ttl: Duration, status_label: impl Into<String>) -> Self {
        AppState {
            scoring,
            dashboards: DashboardRegistry::new(session_ttl),
            status_label: status_label.into(),
        }
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(index)
        .service(submit_form)
        .service(about)
        .service(health_check)
        .service(predict);
}

fn html(body: String) -> HttpResponse {
    HttpResponse::Ok().content_type(ContentType::html()).body(body)
}

fn render(state: &AppState, form_id: Uuid, dashboard: &Dashboard) -> String {
    views::render_dashboard(
        form_id,
        &dashboard.form().snapshot(),
        dashboard.result().as_ref(),
        Some(&state.status_label),
    )
}

/// 409 page for a form that already has a request in flight. The busy
/// message is shown without overwriting the form's own error.
fn busy(state: &AppState, form_id: Uuid, dashboard: &Dashboard) -> HttpResponse {
    let mut snapshot = dashboard.form().snapshot();
    snapshot.error = Some(FormError::Busy.to_string());
    let body = views::render_dashboard(form_id, &snapshot, dashboard.result().as_ref(), Some(&state.status_label));
    HttpResponse::Conflict().content_type(ContentType::html()).body(body)
}

#[get("/")]
async fn index(state: web::Data<AppState>) -> impl Responder {
    state.dashboards.sweep();
    let (form_id, dashboard) = state.dashboards.open();
    html(render(&state, form_id, &dashboard))
}

#[post("/")]
async fn submit_form(state: web::Data<AppState>, form: web::Form<HashMap<String, String>>) -> impl Responder {
    let mut fields = form.into_inner();
    let requested_id = fields
        .remove(FORM_ID_FIELD)
        .and_then(|id| Uuid::parse_str(&id).ok());

    let (form_id, dashboard) = match requested_id.and_then(|id| state.dashboards.get(&id).map(|d| (id, d))) {
        Some(found) => found,
        None => {
            info!("Unknown or expired form instance, opening a new one");
            state.dashboards.sweep();
            state.dashboards.open()
        }
    };

    let pairs: Vec<(&str, &str)> = fields.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
    match dashboard.submit_with(pairs, state.scoring.as_ref()).await {
        Ok(()) => html(render(&state, form_id, &dashboard)),
        Err(FormError::Busy) => {
            warn!("Form {} resubmitted while a prediction is in flight", form_id);
            busy(&state, form_id, &dashboard)
        }
        Err(e @ (FormError::UnknownField(_) | FormError::NotNumeric { .. })) => {
            warn!("Rejected form input: {}", e);
            html(render(&state, form_id, &dashboard))
        }
        Err(e) => {
            error!("Prediction for form {} failed: {}", form_id, e);
            html(render(&state, form_id, &dashboard))
        }
    }
}

#[get("/about")]
async fn about() -> impl Responder {
    html(views::render_about())
}

#[get("/api/health")]
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(ApiResponse::success("Readmission dashboard is up"))
}

#[post("/api/predict")]
async fn predict(state: web::Data<AppState>, req: web::Json<PatientFeatures>) -> impl Responder {
    let start_time = Instant::now();
    let features = req.into_inner();
    info!("New prediction request: {}", features.encode());

    if let Err(e) = features.validate() {
        error!("Validation failed: {}", e);
        return HttpResponse::BadRequest().json(ApiResponse::<RiskAssessment>::error(&e).with_elapsed(start_time));
    }

    match state.scoring.predict(&features).await {
        Ok(response) => {
            let assessment = RiskAssessment::new(&response);
            info!(
                "Prediction succeeded: {}% ({})",
                assessment.percent, assessment.band
            );
            HttpResponse::Ok().json(ApiResponse::success(assessment).with_elapsed(start_time))
        }
        Err(e) => {
            error!("Prediction error: {}", e);
            let mut builder = match &e {
                PredictionError::Config(_) => HttpResponse::InternalServerError(),
                _ => HttpResponse::BadGateway(),
            };
            builder.json(ApiResponse::<RiskAssessment>::error(&e.to_string()).with_elapsed(start_time))
        }
    }
}
