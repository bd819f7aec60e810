use hubsync_common::error::{HubsyncError, HubsyncResult};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub log_level: String,
    /// Downstream action sink. When unset, actions are only logged.
    pub sink_url: Option<String>,
    pub sink_api_key: Option<String>,
    pub persist_watermarks: bool,
    pub batch_size: usize,
}

impl AppConfig {
    /// Load configuration from environment variables.
    /// Loads `.env` file if present, then reads required vars.
    pub fn from_env() -> HubsyncResult<Self> {
        // Best-effort .env load; ignore if missing
        let _ = dotenvy::dotenv();

        let batch_size: usize = get_var_or("HUBSYNC_BATCH_SIZE", "2000")
            .parse()
            .map_err(|e| HubsyncError::Config(format!("invalid HUBSYNC_BATCH_SIZE: {e}")))?;
        if batch_size == 0 {
            return Err(HubsyncError::Config(
                "HUBSYNC_BATCH_SIZE must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            database_url: get_var("DATABASE_URL")?,
            log_level: get_var_or("LOG_LEVEL", "info"),
            sink_url: get_optional("SINK_URL"),
            sink_api_key: get_optional("SINK_API_KEY"),
            persist_watermarks: parse_bool(
                "HUBSYNC_PERSIST_WATERMARKS",
                &get_var_or("HUBSYNC_PERSIST_WATERMARKS", "true"),
            )?,
            batch_size,
        })
    }
}

fn get_var(key: &str) -> HubsyncResult<String> {
    env::var(key).map_err(|_| HubsyncError::Config(format!("{key} is required but not set")))
}

fn get_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn get_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_bool(key: &str, raw: &str) -> HubsyncResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(HubsyncError::Config(format!(
            "invalid {key}: expected a boolean, got {other:?}"
        ))),
    }
}
