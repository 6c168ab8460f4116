//! Configuration management for llmdash

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::models::WidthSpec;

/// Environment variable prefix for overrides (`LLMDASH__SOURCE__API_URL`)
pub const ENV_PREFIX: &str = "LLMDASH";

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Metrics source configuration
    pub source: SourceConfig,

    /// Query defaults
    pub query: QueryConfig,

    /// Event generation configuration
    pub events: EventsConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from defaults, an optional TOML file and the
    /// environment, in increasing order of precedence.
    ///
    /// Credentials left empty are filled from `AIRFOLD_API_KEY` and
    /// `OPENAI_API_KEY`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            debug!(path = %path.display(), "Reading configuration file");
            builder = builder.add_source(::config::File::from(path).required(true));
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        );

        let mut config: Self = builder.build()?.try_deserialize()?;
        config.apply_well_known_env();
        Ok(config)
    }

    fn apply_well_known_env(&mut self) {
        if self.source.api_token.is_empty() {
            if let Ok(token) = std::env::var("AIRFOLD_API_KEY") {
                self.source.api_token = token;
            }
        }
        if self.events.api_key.is_empty() {
            self.events.api_key = self.source.api_token.clone();
        }
        if self.events.provider_api_key.is_empty() {
            if let Ok(key) = std::env::var("OPENAI_API_KEY") {
                self.events.provider_api_key = key;
            }
        }
    }
}

/// Metrics source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Base URL of the metrics API
    pub api_url: String,
    /// Bearer token
    pub api_token: String,
    /// Pipe returning raw metric rows
    pub metrics_pipe: String,
    /// Pipe returning known models
    pub models_pipe: String,
    /// Pipe returning known groups
    pub groups_pipe: String,
    /// Request timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.airfold.co/v1".to_string(),
            api_token: String::new(),
            metrics_pipe: "metrics".to_string(),
            models_pipe: "models".to_string(),
            groups_pipe: "groups".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Query defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Range used when the caller gives none
    #[serde(with = "humantime_serde")]
    pub default_range: Duration,
    /// Bucket width used when the caller gives none
    pub default_width: WidthSpec,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_range: Duration::from_secs(7 * 24 * 60 * 60),
            default_width: WidthSpec::Auto,
        }
    }
}

/// Event generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Endpoint events are posted to
    pub events_url: String,
    /// Bearer token for the events endpoint
    pub api_key: String,
    /// Chat-completion provider base URL
    pub provider_url: String,
    /// Chat-completion provider API key
    pub provider_api_key: String,
    /// Model to send requests to
    pub model: String,
    /// Group id stamped on every event
    pub group_id: String,
    /// Number of requests per run
    pub num_requests: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            events_url: "https://api.airfold.co/v1/events/events".to_string(),
            api_key: String::new(),
            provider_url: "https://api.openai.com/v1".to_string(),
            provider_api_key: String::new(),
            model: "gpt-4o".to_string(),
            group_id: "group01".to_string(),
            num_requests: 100,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (json or pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
