//! Configuration types and loading.
//!
//! Credentials and Vertex AI Search identifiers come from the environment and are
//! required; everything else has defaults and may be tuned from an optional JSON file
//! (e.g. `~/.line-relay/config.json`). The resolved [`RelayConfig`] is built once at
//! startup and shared read-only.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_CHANNEL_SECRET: &str = "ChannelSecret";
pub const ENV_CHANNEL_ACCESS_TOKEN: &str = "ChannelAccessToken";
pub const ENV_PROJECT_ID: &str = "ProjectId";
pub const ENV_LOCATION: &str = "Location";
pub const ENV_ENGINE_ID: &str = "EngineId";
pub const ENV_PORT: &str = "PORT";
pub const ENV_BIND: &str = "RELAY_BIND";
pub const ENV_GOOGLE_ACCESS_TOKEN: &str = "GOOGLE_ACCESS_TOKEN";
pub const ENV_CONFIG_PATH: &str = "RELAY_CONFIG_PATH";

/// Tunable settings (JSON file). Every key is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP listener settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Answer generation (Vertex AI Search) settings.
    #[serde(default)]
    pub answer: AnswerConfig,

    /// LINE Messaging API settings.
    #[serde(default)]
    pub line: LineConfig,
}

/// Listener bind address and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for HTTP (default 8080). Overridden by PORT env.
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "0.0.0.0"). Overridden by RELAY_BIND env.
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
}

fn default_gateway_port() -> u16 {
    8080
}

fn default_gateway_bind() -> String {
    "0.0.0.0".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
        }
    }
}

/// Options sent with every answer query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerConfig {
    /// Language tag for generated answers (default "zh-TW").
    #[serde(default = "default_language_code")]
    pub language_code: String,

    /// Answer generation model version.
    #[serde(default = "default_model_version")]
    pub model_version: String,

    /// Replaces the built-in persona preamble when set.
    #[serde(default)]
    pub preamble: Option<String>,

    /// Overrides the regional/global Discovery Engine endpoint (e.g. for tests).
    #[serde(default)]
    pub api_base: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_language_code() -> String {
    "zh-TW".to_string()
}

fn default_model_version() -> String {
    "gemini-1.5-flash-002/answer_gen/v1".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            language_code: default_language_code(),
            model_version: default_model_version(),
            preamble: None,
            api_base: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl AnswerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// LINE Messaging API endpoint and timeout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineConfig {
    /// Overrides https://api.line.me (e.g. for tests).
    #[serde(default)]
    pub api_base: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            api_base: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Fully resolved process configuration: secrets, search engine identifiers, and settings.
#[derive(Clone)]
pub struct RelayConfig {
    pub channel_secret: String,
    pub channel_access_token: String,
    pub project_id: String,
    pub location: String,
    pub engine_id: String,
    /// Static OAuth2 token for the answer API; when None the metadata server is used.
    pub google_access_token: Option<String>,
    pub settings: Config,
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("channel_secret", &"<redacted>")
            .field("channel_access_token", &"<redacted>")
            .field("project_id", &self.project_id)
            .field("location", &self.location)
            .field("engine_id", &self.engine_id)
            .field(
                "google_access_token",
                &self.google_access_token.as_ref().map(|_| "<redacted>"),
            )
            .field("settings", &self.settings)
            .finish()
    }
}

impl RelayConfig {
    /// Resolve from the process environment.
    pub fn from_env(settings: Config) -> Result<Self, ConfigError> {
        Self::resolve(settings, |name| std::env::var(name).ok())
    }

    /// Resolve using `lookup` for environment values. Blank values count as absent.
    pub fn resolve<F>(mut settings: Config, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let channel_secret = require(ENV_CHANNEL_SECRET)?;
        let channel_access_token = require(ENV_CHANNEL_ACCESS_TOKEN)?;
        let project_id = require(ENV_PROJECT_ID)?;
        let location = require(ENV_LOCATION)?;
        let engine_id = require(ENV_ENGINE_ID)?;

        if let Some(port) = get(ENV_PORT) {
            settings.gateway.port = port.parse().map_err(|_| ConfigError::Invalid {
                name: ENV_PORT,
                value: port.clone(),
            })?;
        }
        if let Some(bind) = get(ENV_BIND) {
            settings.gateway.bind = bind;
        }

        Ok(Self {
            channel_secret,
            channel_access_token,
            project_id,
            location,
            engine_id,
            google_access_token: get(ENV_GOOGLE_ACCESS_TOKEN),
            settings,
        })
    }
}

/// Resolve settings path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var(ENV_CONFIG_PATH).map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".line-relay").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Load settings from the given path (or the default). Missing file => default settings.
/// Returns the settings and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
