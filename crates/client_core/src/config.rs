use std::{fs, io, path::Path, time::Duration};

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::load_coordinator::DeliveryMode;

pub const DEFAULT_CONFIG_FILE: &str = "desktop_config.json";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_base_url: String,
    pub access_token: Option<String>,
    pub delivery: DeliveryMode,
    pub request_timeout_secs: u64,
    pub simulated_latency_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:3000/investments".into(),
            access_token: None,
            delivery: DeliveryMode::Marshaled,
            request_timeout_secs: 10,
            simulated_latency_ms: 150,
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn simulated_latency(&self) -> Duration {
        Duration::from_millis(self.simulated_latency_ms)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file '{path}': {source}")]
    Read { path: String, source: io::Error },
    #[error("failed to parse configuration file '{path}': {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

/// Reads `path` (defaults when it does not exist), then applies `APP__*`
/// environment overrides.
pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    let settings = read_settings_file(path)?;
    Ok(apply_overrides(settings, |key| std::env::var(key).ok()))
}

fn read_settings_file(path: &Path) -> Result<Settings, ConfigError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Settings::default()),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.display().to_string(),
                source,
            })
        }
    };

    serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

fn apply_overrides(mut settings: Settings, lookup: impl Fn(&str) -> Option<String>) -> Settings {
    if let Some(v) = lookup("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }

    if let Some(v) = lookup("APP__ACCESS_TOKEN") {
        settings.access_token = Some(v).filter(|token| !token.is_empty());
    }

    if let Some(v) = lookup("APP__DELIVERY") {
        match v.parse() {
            Ok(mode) => settings.delivery = mode,
            Err(err) => warn!("ignoring APP__DELIVERY: {err}"),
        }
    }

    if let Some(v) = lookup("APP__REQUEST_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout_secs = parsed;
        }
    }

    if let Some(v) = lookup("APP__SIMULATED_LATENCY_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.simulated_latency_ms = parsed;
        }
    }

    settings
}
