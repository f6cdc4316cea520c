use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://0fut5yz7b4.execute-api.us-east-1.amazonaws.com/prod/predict";
pub const DEFAULT_CONFIG_FILE: &str = "readmission.toml";

/// How the `{"input": ...}` object is put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RequestEnvelope {
    /// Serialised to text under a `body` key, for proxy integrations that
    /// forward the raw request to a function.
    #[default]
    Proxy,
    /// Sent as-is.
    Direct,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    pub static_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    pub endpoint: String,
    #[serde(default)]
    pub request_envelope: RequestEnvelope,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl ScoringConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        ScoringConfig {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_envelope: RequestEnvelope::Proxy,
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub ttl_secs: u64,
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    pub server: ServerConfig,
    pub scoring: ScoringConfig,
    pub session: SessionConfig,
}

impl DashboardConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Layers, lowest first: built-in defaults, the config file, `READMISSION__*`
/// variables, then the bare `HOST`/`PORT`/`WORKERS` variables.
pub fn load_config(config_file_path: Option<&Path>) -> Result<DashboardConfig> {
    let mut builder = Config::builder()
        .set_default("server.host", "127.0.0.1")?
        .set_default("server.port", 8080_i64)?
        .set_default("server.workers", num_cpus::get() as i64)?
        .set_default("server.allowed_origins", vec!["http://localhost:8080", "http://127.0.0.1:8080"])?
        .set_default("server.static_dir", concat!(env!("CARGO_MANIFEST_DIR"), "/static"))?
        .set_default("scoring.endpoint", DEFAULT_ENDPOINT)?
        .set_default("scoring.request_envelope", "proxy")?
        .set_default("session.ttl_secs", 1800_i64)?;

    match config_file_path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            builder = builder.add_source(File::from(path.to_path_buf()));
        }
        None => {
            let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
            if default_path.exists() {
                builder = builder.add_source(File::from(default_path));
            }
        }
    }

    builder = builder
        .add_source(
            Environment::with_prefix("READMISSION")
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("server.allowed_origins")
                .try_parsing(true),
        )
        .set_override_option("server.host", std::env::var("HOST").ok())?
        .set_override_option("server.port", std::env::var("PORT").ok())?
        .set_override_option("server.workers", std::env::var("WORKERS").ok())?;

    let config = builder.build().context("Failed to assemble dashboard configuration")?;
    config
        .try_deserialize::<DashboardConfig>()
        .context("Failed to parse dashboard configuration")
}
