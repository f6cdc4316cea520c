use actix_cors::Cors;
use actix_files::Files;
use actix_web::middleware::{DefaultHeaders, Logger};
use actix_web::{web, App, HttpResponse, HttpServer};
use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;

use readmission_dashboard::config::{load_config, DashboardConfig};
use readmission_dashboard::models::{ApiResponse, PatientFeatures};
use readmission_dashboard::risk::RiskAssessment;
use readmission_dashboard::routes::{self, AppState};
use readmission_dashboard::{PredictionClient, ScoringService};

#[derive(Parser, Debug)]
#[command(name = "readmission-dashboard", version, about = "Patient readmission risk dashboard")]
struct Cli {
    /// TOML configuration file (defaults to ./readmission.toml when present)
    #[arg(long, global = true, env = "READMISSION_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the dashboard over HTTP (default)
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Score one patient against the configured endpoint and print the result
    Predict(PredictArgs),
}

#[derive(Args, Debug)]
struct PredictArgs {
    #[arg(long, default_value_t = 45.0)]
    age: f64,
    /// 0 = male, 1 = female
    #[arg(long, default_value_t = 0.0)]
    gender: f64,
    #[arg(long, default_value_t = 1.0)]
    num_prior_admissions: f64,
    #[arg(long, default_value_t = 100.0)]
    lab_result_1: f64,
    #[arg(long, default_value_t = 5.0)]
    lab_result_2: f64,
    #[arg(long, default_value_t = 120.0)]
    vital_bp: f64,
    #[arg(long, default_value_t = 3.0)]
    length_of_stay: f64,
}

impl From<PredictArgs> for PatientFeatures {
    fn from(args: PredictArgs) -> Self {
        PatientFeatures {
            age: args.age,
            gender: args.gender,
            num_prior_admissions: args.num_prior_admissions,
            lab_result_1: args.lab_result_1,
            lab_result_2: args.lab_result_2,
            vital_bp: args.vital_bp,
            length_of_stay: args.length_of_stay,
        }
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .format_module_path(false)
        .init();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Some(Command::Predict(args)) => predict_once(&config, args.into()).await,
        Some(Command::Serve { host, port }) => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(config).await
        }
        None => serve(config).await,
    }
}

async fn predict_once(config: &DashboardConfig, features: PatientFeatures) -> anyhow::Result<()> {
    features.validate().map_err(anyhow::Error::msg)?;
    let client = PredictionClient::from_config(&config.scoring)?;
    let response = client
        .predict(&features)
        .await
        .with_context(|| format!("Prediction against {} failed", client.endpoint()))?;

    let assessment = RiskAssessment::new(&response);
    println!("{}", assessment.summary());
    Ok(())
}

async fn serve(config: DashboardConfig) -> anyhow::Result<()> {
    info!("Starting patient readmission risk dashboard");

    let client = PredictionClient::from_config(&config.scoring)?;
    info!(
        "Scoring endpoint: {} ({:?} envelope)",
        client.endpoint(),
        client.envelope()
    );
    if config.scoring.timeout_secs.is_none() {
        warn!("No scoring timeout configured, relying on the transport default");
    }

    let status_label = match reqwest::Url::parse(client.endpoint()).ok().and_then(|u| u.host_str().map(str::to_owned)) {
        Some(host) => format!("Scoring endpoint · {}", host),
        None => "Scoring endpoint".to_string(),
    };
    let scoring: Arc<dyn ScoringService> = Arc::new(client);
    let state = web::Data::new(AppState::new(scoring, config.session.ttl(), status_label));

    let bind_address = config.bind_address();
    let workers = config.server.workers.max(1);
    let allowed_origins = config.server.allowed_origins.clone();
    let static_dir = config.server.static_dir.clone();

    info!("Server listening on: http://{}", bind_address);
    info!("Workers: {}", workers);
    info!("Routes:");
    info!("   GET  /             - Dashboard");
    info!("   POST /             - Dashboard form submission");
    info!("   GET  /about        - About");
    info!("   GET  /api/health   - Health check");
    info!("   POST /api/predict  - JSON prediction");

    HttpServer::new(move || {
        let cors = allowed_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allowed_methods(vec!["GET", "POST"])
            .allowed_headers(vec![actix_web::http::header::CONTENT_TYPE])
            .max_age(3600);

        App::new()
            .wrap(Logger::default())
            .wrap(DefaultHeaders::new().add(("X-Content-Type-Options", "nosniff")))
            .wrap(cors)
            .app_data(state.clone())
            .app_data(web::JsonConfig::default().limit(64 * 1024))
            .configure(routes::configure)
            .service(Files::new("/static", static_dir.clone()).prefer_utf8(true))
            .default_service(web::route().to(|| async {
                HttpResponse::NotFound().json(ApiResponse::<String>::error("Endpoint not found"))
            }))
    })
    .workers(workers)
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {}", bind_address))?
    .run()
    .await
    .context("HTTP server terminated with an error")
}
