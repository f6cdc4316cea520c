//! Server-rendered pages: the dashboard (form, result card, chart) and the
//! static About page.

use uuid::Uuid;

use crate::form::FormSnapshot;
use crate::models::{FeatureField, PredictionResponse};
use crate::risk::{RiskAssessment, RiskDistribution};

const LOW_COLOR: &str = "#10B981";
const HIGH_COLOR: &str = "#EF4444";

/// Order the inputs appear on screen. Differs from the encoding order.
const FORM_LAYOUT: [FeatureField; 7] = [
    FeatureField::Age,
    FeatureField::Gender,
    FeatureField::NumPriorAdmissions,
    FeatureField::LengthOfStay,
    FeatureField::LabResult1,
    FeatureField::LabResult2,
    FeatureField::VitalBp,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Dashboard,
    About,
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn layout(active: Page, title: &str, status: Option<&str>, main: &str) -> String {
    let nav_class = |page: Page| if page == active { "nav-link active" } else { "nav-link" };
    let status = status
        .map(|text| format!(r#"<div class="topbar-status">{}</div>"#, escape_html(text)))
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title} · Readmit</title>
<link rel="stylesheet" href="/static/dashboard.css">
</head>
<body>
<div class="shell">
<aside class="sidebar">
<div class="brand"><h2>Service · Readmit</h2><p>Patient risk prediction</p></div>
<nav>
<a class="{dashboard_class}" href="/">Dashboard</a>
<a class="{about_class}" href="/about">About</a>
</nav>
</aside>
<div class="content">
<header class="topbar"><h1>{title}</h1>{status}</header>
{main}
</div>
</div>
</body>
</html>
"#,
        title = escape_html(title),
        dashboard_class = nav_class(Page::Dashboard),
        about_class = nav_class(Page::About),
        status = status,
        main = main,
    )
}

pub fn render_dashboard(
    form_id: Uuid,
    form: &FormSnapshot,
    result: Option<&PredictionResponse>,
    status: Option<&str>,
) -> String {
    let main = format!(
        r#"<main class="grid">
<div class="primary">{form}</div>
<div class="secondary">{card}{chart}</div>
</main>"#,
        form = render_form(form_id, form),
        card = render_result_card(result),
        chart = render_chart(result.map(|r| r.prediction).unwrap_or(0.0)),
    );
    layout(Page::Dashboard, "Patient Readmission Risk", status, &main)
}

pub fn render_form(form_id: Uuid, form: &FormSnapshot) -> String {
    let inputs: String = FORM_LAYOUT
        .iter()
        .map(|&field| {
            format!(
                r#"<div class="field"><label for="{name}">{label}</label><input id="{name}" name="{name}" type="number" step="any" value="{value}"></div>"#,
                name = field.name(),
                label = escape_html(field.label()),
                value = form.values.get(field),
            )
        })
        .collect();

    let (disabled, button_label) = if form.busy {
        (" disabled", "Predicting…")
    } else {
        ("", "Predict Readmission Risk")
    };
    let error = form
        .error
        .as_deref()
        .map(|message| format!(r#"<div class="form-error">{}</div>"#, escape_html(message)))
        .unwrap_or_default();

    format!(
        r#"<section class="card">
<h4>Patient Input</h4>
<form method="post" action="/" class="patient-form" onsubmit="this.querySelector('button').disabled=true">
<input type="hidden" name="form_id" value="{form_id}">
{inputs}
<div class="actions"><button type="submit"{disabled}>{button_label}</button>{error}</div>
</form>
</section>"#
    )
}

pub fn render_result_card(result: Option<&PredictionResponse>) -> String {
    let Some(response) = result else {
        return r#"<section class="card placeholder">No prediction yet. Enter patient data and click Predict.</section>"#
            .to_string();
    };

    let assessment = RiskAssessment::new(response);
    format!(
        r#"<section class="card">
<h4>Prediction Result</h4>
<div class="score {band_class}"><div class="percent">{percent}%</div><div class="band">Readmission risk ({band})</div></div>
<div class="raw">Raw score: {raw}</div>
</section>"#,
        band_class = assessment.band.css_class(),
        percent = assessment.percent,
        band = assessment.band,
        raw = escape_html(&assessment.raw),
    )
}

/// Two-slice donut. The circle's circumference is 100 so slice lengths are
/// percentages.
pub fn render_chart(score: f64) -> String {
    let slices = RiskDistribution::from_score(score);
    let low = slices.low * 100.0;
    let high = slices.high * 100.0;

    format!(
        r#"<section class="card">
<h4>Risk Distribution</h4>
<svg class="donut" viewBox="0 0 42 42" role="img" aria-label="Low {low:.1}%, High {high:.1}%">
<circle cx="21" cy="21" r="15.91549" fill="none" stroke="{LOW_COLOR}" stroke-width="6" stroke-dasharray="{low:.3} {low_gap:.3}" stroke-dashoffset="25"></circle>
<circle cx="21" cy="21" r="15.91549" fill="none" stroke="{HIGH_COLOR}" stroke-width="6" stroke-dasharray="{high:.3} {high_gap:.3}" stroke-dashoffset="{high_offset:.3}"></circle>
</svg>
<ul class="legend"><li><span style="background:{LOW_COLOR}"></span>Low</li><li><span style="background:{HIGH_COLOR}"></span>High</li></ul>
</section>"#,
        low_gap = 100.0 - low,
        high_gap = 100.0 - high,
        high_offset = 25.0 - low,
    )
}

pub fn render_about() -> String {
    let main = r#"<main class="about">
<section class="card">
<h2>About Project</h2>
<p>Patient readmission risk prediction for clinicians. Patient features entered on the dashboard are sent to a hosted scoring endpoint, and the returned probability is shown as a percentage, a Low/Medium/High band and a distribution chart.</p>
<ul>
<li>Real-time predictions from the hosted scoring endpoint</li>
<li>Risk bands: High from 70%, Medium from 30%, Low below</li>
<li>No patient data is stored; reloading the dashboard clears the last result</li>
</ul>
</section>
</main>"#;
    layout(Page::About, "About", None, main)
}
