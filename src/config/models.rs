// src/config/models.rs
use crate::health::{HealthConfiguration, HealthStatus, StatusMapping, MAX_REFRESH_INTERVAL};
use crate::metrics::DEFAULT_REQUEST_TIME_BUCKETS;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Smallest read buffer hyper accepts.
pub const MIN_HEADER_BUFFER_BYTES: usize = 8192;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub api_version: ApiVersionConfig,
    #[serde(default)]
    pub checks: Vec<HttpCheckConfig>,
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        self.health.validate()?;
        self.metrics.validate()?;

        let mut names = HashSet::new();
        for check in &self.checks {
            if check.name.is_empty() {
                bail!("Check for {} has an empty name", check.url);
            }
            if check.name == crate::health::STATUS_KEY {
                bail!("Check name '{}' is reserved for the aggregated status", check.name);
            }
            if !names.insert(check.name.as_str()) {
                bail!("Duplicate check name: {}", check.name);
            }
            if check.timeout_secs == 0 {
                bail!("Check {} must have a positive timeout", check.name);
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upper bound for request line plus headers.
    #[serde(default = "default_max_header_size")]
    pub max_header_size_bytes: usize,
}

impl ServerConfig {
    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", self.host, self.port))
    }

    fn validate(&self) -> Result<()> {
        self.addr()?;
        if self.max_header_size_bytes < MIN_HEADER_BUFFER_BYTES {
            bail!(
                "server.max_header_size_bytes must be at least {}, got {}",
                MIN_HEADER_BUFFER_BYTES,
                self.max_header_size_bytes
            );
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_header_size_bytes: default_max_header_size(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HealthConfig {
    /// Zero keeps the engine in sync mode.
    #[serde(default)]
    pub interval_secs: u64,
    #[serde(default)]
    pub run_checks_on_startup: bool,
    /// Worst status first.
    #[serde(default)]
    pub status_order: Option<Vec<String>>,
    /// Listed as entries since map keys are case-folded by the loader.
    #[serde(default)]
    pub status_mapping: Option<Vec<StatusCodeConfig>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusCodeConfig {
    pub status: String,
    pub code: u16,
}

impl HealthConfig {
    fn validate(&self) -> Result<()> {
        if self.interval_secs > MAX_REFRESH_INTERVAL.as_secs() {
            bail!(
                "health.interval_secs must be at most {}, got {}",
                MAX_REFRESH_INTERVAL.as_secs(),
                self.interval_secs
            );
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn configuration(&self) -> HealthConfiguration {
        HealthConfiguration::every(self.interval())
    }

    /// Worst first, ready for the engine builder.
    pub fn order(&self) -> Option<Vec<HealthStatus>> {
        self.status_order
            .as_ref()
            .map(|names| names.iter().cloned().map(HealthStatus::from).collect())
    }

    pub fn mapping(&self) -> Option<StatusMapping> {
        self.status_mapping.as_ref().map(|entries| {
            entries
                .iter()
                .map(|entry| (HealthStatus::from(entry.status.clone()), entry.code))
                .collect()
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
    #[serde(default = "default_metrics_path")]
    pub path: String,
    #[serde(default = "default_request_time_buckets")]
    pub request_time_buckets: Vec<f64>,
}

impl MetricsConfig {
    fn validate(&self) -> Result<()> {
        if !self.path.starts_with('/') {
            bail!("metrics.path must start with '/', got {}", self.path);
        }
        if self
            .request_time_buckets
            .windows(2)
            .any(|pair| pair[0] >= pair[1])
        {
            bail!("metrics.request_time_buckets must be strictly increasing");
        }
        Ok(())
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_metrics_port(),
            path: default_metrics_path(),
            request_time_buckets: default_request_time_buckets(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiVersionConfig {
    #[serde(default = "default_api_version_path")]
    pub path: PathBuf,
}

impl Default for ApiVersionConfig {
    fn default() -> Self {
        Self {
            path: default_api_version_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpCheckConfig {
    pub name: String,
    pub url: Url,
    #[serde(default = "default_check_timeout")]
    pub timeout_secs: u64,
    /// Non-2xx codes reported as `WARNING` instead of `PROBLEM`.
    #[serde(default)]
    pub warning_status_codes: Vec<u16>,
}

impl HttpCheckConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_header_size() -> usize {
    10240
}

fn default_true() -> bool {
    true
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_request_time_buckets() -> Vec<f64> {
    DEFAULT_REQUEST_TIME_BUCKETS.to_vec()
}

fn default_api_version_path() -> PathBuf {
    PathBuf::from("./api-version-info.json")
}

fn default_check_timeout() -> u64 {
    5
}
