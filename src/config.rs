use std::env::VarError;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::models::{SearchMode, TargetMarketplace};

pub const DEFAULT_ENDPOINT: &str = "https://serpapi.com/search.json";
pub const DEFAULT_IMAGE_URL: &str = "https://i.imgur.com/8VmjcR5.png";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set; add it to the environment or a .env file")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Loaded once before the pipeline is built and never changed afterwards.
#[derive(Clone)]
pub struct LensConfig {
    pub api_key: String,
    pub endpoint: String,
    pub mode: SearchMode,
    pub locale: String,
    pub region: String,
    pub snapshot_dir: PathBuf,
    pub marketplace: TargetMarketplace,
    pub http: HttpSettings,
}

impl std::fmt::Debug for LensConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LensConfig")
            .field("api_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("mode", &self.mode)
            .field("locale", &self.locale)
            .field("region", &self.region)
            .field("snapshot_dir", &self.snapshot_dir)
            .field("marketplace", &self.marketplace)
            .field("http", &self.http)
            .finish()
    }
}

impl LensConfig {
    /// Reads `.env` and `backend/.env` (both optional) before the process
    /// environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        dotenvy::from_filename("backend/.env").ok();
        Self::from_env()
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key))
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        let present = |var: &str| -> Option<String> {
            lookup(var)
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let or_default = |var: &str, default: &str| -> String {
            present(var).unwrap_or_else(|| default.to_string())
        };
        let parse_secs = |var: &str, default: u64| -> Result<Duration, ConfigError> {
            match present(var) {
                None => Ok(Duration::from_secs(default)),
                Some(raw) => raw
                    .parse::<u64>()
                    .ok()
                    .filter(|secs| *secs > 0)
                    .map(Duration::from_secs)
                    .ok_or_else(|| ConfigError::InvalidEnvVar {
                        var: var.to_string(),
                        reason: format!("expected a positive number of seconds, got `{raw}`"),
                    }),
            }
        };

        let api_key =
            present("SERPAPI_KEY").ok_or_else(|| ConfigError::MissingEnvVar("SERPAPI_KEY".into()))?;

        let mode = match present("LENS_SEARCH_MODE") {
            None => SearchMode::default(),
            Some(raw) => parse_mode(&raw).map_err(|reason| ConfigError::InvalidEnvVar {
                var: "LENS_SEARCH_MODE".into(),
                reason,
            })?,
        };

        let endpoint = or_default("LENS_ENDPOINT", DEFAULT_ENDPOINT);
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ConfigError::InvalidEnvVar {
                var: "LENS_ENDPOINT".into(),
                reason: format!("expected an http(s) url, got `{endpoint}`"),
            });
        }

        Ok(Self {
            api_key,
            endpoint,
            mode,
            locale: or_default("LENS_LOCALE", "en"),
            region: or_default("LENS_REGION", "us"),
            snapshot_dir: PathBuf::from(or_default("LENS_SNAPSHOT_DIR", ".")),
            marketplace: TargetMarketplace::Amazon,
            http: HttpSettings {
                timeout: parse_secs("HTTP_TIMEOUT_SECS", 15)?,
                connect_timeout: parse_secs("HTTP_CONNECT_TIMEOUT_SECS", 5)?,
            },
        })
    }
}

pub fn parse_mode(raw: &str) -> Result<SearchMode, String> {
    SearchMode::from_str(raw).ok_or_else(|| format!("expected `direct` or `expanded`, got `{raw}`"))
}
