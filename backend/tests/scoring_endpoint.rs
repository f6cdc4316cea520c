use actix_web::{web, App, HttpResponse, HttpServer};
use serde_json::{json, Value};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};

use readmission_dashboard::config::RequestEnvelope;
use readmission_dashboard::form::Dashboard;
use readmission_dashboard::{PatientFeatures, PredictionClient, PredictionError, ScoringService};

type Captured = Arc<Mutex<Vec<Value>>>;

/// Starts a fake scoring endpoint that records each request body and answers
/// with `reply`. Returns the predict URL.
fn spawn_endpoint(status: u16, reply: &'static str, captured: Captured) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let server = HttpServer::new(move || {
        let captured = captured.clone();
        App::new().route(
            "/prod/predict",
            web::post().to(move |body: web::Json<Value>| {
                let captured = captured.clone();
                async move {
                    captured.lock().unwrap().push(body.into_inner());
                    HttpResponse::build(actix_web::http::StatusCode::from_u16(status).unwrap())
                        .content_type("application/json")
                        .body(reply)
                }
            }),
        )
    })
    .workers(1)
    .listen(listener)
    .unwrap()
    .run();
    actix_web::rt::spawn(server);

    format!("http://{}/prod/predict", addr)
}

#[actix_web::test]
async fn proxy_request_round_trip() {
    let captured = Captured::default();
    let url = spawn_endpoint(
        200,
        r#"{"statusCode":200,"body":"{\"prediction\":\"0.81\\n\"}"}"#,
        captured.clone(),
    );
    let client = PredictionClient::new(&url, RequestEnvelope::Proxy).unwrap();

    let response = client.predict(&PatientFeatures::default()).await.unwrap();
    assert_eq!(response.prediction, 0.81);
    assert_eq!(response.raw, "0.81\n");

    let requests = captured.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let inner: Value = serde_json::from_str(requests[0]["body"].as_str().unwrap()).unwrap();
    assert_eq!(inner, json!({ "input": "45,0,1,100,5,120,3" }));
}

#[actix_web::test]
async fn direct_request_sends_plain_input() {
    let captured = Captured::default();
    let url = spawn_endpoint(200, r#"{"prediction":"0.23\n"}"#, captured.clone());
    let client = PredictionClient::new(&url, RequestEnvelope::Direct).unwrap();

    let features = PatientFeatures {
        age: 67.0,
        ..PatientFeatures::default()
    };
    let response = client.predict(&features).await.unwrap();
    assert_eq!(response.prediction, 0.23);
    assert_eq!(response.raw, "0.23\n");

    let requests = captured.lock().unwrap();
    assert_eq!(requests[0], json!({ "input": "67,0,1,100,5,120,3" }));
}

#[actix_web::test]
async fn error_status_is_a_failure() {
    let url = spawn_endpoint(500, r#"{"message":"Internal server error"}"#, Captured::default());
    let client = PredictionClient::new(&url, RequestEnvelope::Proxy).unwrap();

    let err = client.predict(&PatientFeatures::default()).await.unwrap_err();
    assert!(matches!(err, PredictionError::Status { status: 500 }));
}

#[actix_web::test]
async fn unreachable_endpoint_leaves_form_usable() {
    // bind then drop to get a port with nothing listening
    let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
    let client = PredictionClient::new(&format!("http://127.0.0.1:{}/prod/predict", port), RequestEnvelope::Proxy)
        .unwrap();

    let dashboard = Dashboard::new();
    dashboard.form().set_field("vital_bp", "135").unwrap();
    let before = dashboard.form().values();

    let err = dashboard.submit(&client).await.unwrap_err();
    assert!(!err.to_string().is_empty());

    let snapshot = dashboard.form().snapshot();
    assert!(!snapshot.busy);
    assert!(snapshot.error.is_some_and(|message| message.starts_with("Network failure")));
    assert_eq!(snapshot.values, before);
    assert!(dashboard.result().is_none());
}
