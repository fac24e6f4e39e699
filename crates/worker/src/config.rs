//! Worker configuration loaded from environment variables.

use std::time::Duration;

use assetforge_tripo::PollOptions;

/// Default provider endpoint.
pub const DEFAULT_API_URL: &str = "https://api.tripo3d.ai";

/// A required variable is missing or a value failed to parse.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} must be a positive integer, got '{value}'")]
    Invalid { var: &'static str, value: String },
}

/// Worker configuration.
///
/// The polling schedule defaults match [`PollOptions::default`]; the
/// env overrides exist for latency-sensitive deployments and local
/// testing against a stub provider.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Provider base URL.
    pub api_url: String,
    /// Provider API key, sent as a bearer credential on every call.
    pub api_key: String,
    /// Polling schedule for all stages.
    pub poll_options: PollOptions,
}

impl WorkerConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                    | Default                  |
    /// |----------------------------|--------------------------|
    /// | `TRIPO_API_URL`            | `https://api.tripo3d.ai` |
    /// | `TRIPO_API_KEY`            | (required)               |
    /// | `PIPELINE_POLL_INITIAL_MS` | `5000`                   |
    /// | `PIPELINE_POLL_MAX_MS`     | `30000`                  |
    /// | `PIPELINE_POLL_TIMEOUT_MS` | `300000`                 |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_url = lookup("TRIPO_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_key = lookup("TRIPO_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::Missing("TRIPO_API_KEY"))?;

        let defaults = PollOptions::default();
        let poll_options = PollOptions {
            initial_interval: duration_ms(
                &lookup,
                "PIPELINE_POLL_INITIAL_MS",
                defaults.initial_interval,
            )?,
            max_interval: duration_ms(&lookup, "PIPELINE_POLL_MAX_MS", defaults.max_interval)?,
            max_total: duration_ms(&lookup, "PIPELINE_POLL_TIMEOUT_MS", defaults.max_total)?,
            ..defaults
        };

        Ok(Self {
            api_url,
            api_key,
            poll_options,
        })
    }
}

fn duration_ms(
    lookup: impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| ConfigError::Invalid { var, value: raw }),
    }
}
