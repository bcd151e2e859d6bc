// src/config/mod.rs
mod models;

pub use models::*;

use anyhow::{Context, Result};
use config::{Environment, File, FileFormat};
use std::path::Path;

/// Prefix for environment overrides, e.g. `HEALTHD__SERVER__PORT=9000`.
pub const ENV_PREFIX: &str = "HEALTHD";

/// Load configuration from a file (YAML or JSON), then apply environment overrides.
pub async fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    let format = match path.extension().and_then(|s| s.to_str()) {
        Some("yaml") | Some("yml") => FileFormat::Yaml,
        _ => FileFormat::Json,
    };

    parse_config(&contents, format, Some(ENV_PREFIX))
}

fn parse_config(contents: &str, format: FileFormat, env_prefix: Option<&str>) -> Result<AppConfig> {
    let mut builder = config::Config::builder().add_source(File::from_str(contents, format));
    if let Some(prefix) = env_prefix {
        builder = builder.add_source(
            Environment::with_prefix(prefix)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );
    }

    let config: AppConfig = builder
        .build()
        .context("Failed to assemble configuration")?
        .try_deserialize()
        .context("Failed to parse configuration")?;

    config.validate()?;
    Ok(config)
}
