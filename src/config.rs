use std::str::FromStr;

use anyhow::{Context, Result};
use dotenvy::dotenv;

fn default_max_upload_size() -> usize {
    // 10 MB in bytes
    10 * 1024 * 1024
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub max_upload_size: usize,
    pub random_seed: u64,
    pub default_chart_bins: usize,
    pub max_rows_preview: usize,
    pub cors_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_upload_size: default_max_upload_size(),
            random_seed: 42,
            default_chart_bins: 10,
            max_rows_preview: 100,
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:3001".to_string(),
            ],
        }
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Failed to parse {}={:?}", key, raw)),
        None => Ok(default),
    }
}

impl Config {
    /// Builds the config from a key lookup, falling back to defaults for
    /// absent keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Config::default();

        let cors_origins = match lookup("CORS_ORIGINS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            None => defaults.cors_origins,
        };

        Ok(Config {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_var(&lookup, "PORT", defaults.port)?,
            max_upload_size: parse_var(&lookup, "MAX_UPLOAD_SIZE", defaults.max_upload_size)?,
            random_seed: parse_var(&lookup, "RANDOM_SEED", defaults.random_seed)?,
            default_chart_bins: parse_var(&lookup, "DEFAULT_CHART_BINS", defaults.default_chart_bins)?,
            max_rows_preview: parse_var(&lookup, "MAX_ROWS_PREVIEW", defaults.max_rows_preview)?,
            cors_origins,
        })
    }
}

pub fn load_config() -> Result<Config> {
    // Load .env file first
    dotenv().ok();

    let config = Config::from_lookup(|key| std::env::var(key).ok())?;
    tracing::info!(
        "Loaded config: {}:{}, seed {}, upload limit {} bytes",
        config.host,
        config.port,
        config.random_seed,
        config.max_upload_size
    );
    Ok(config)
}
