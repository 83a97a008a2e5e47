//! Configuration management

use std::{env, path::Path, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Error, Result};

/// Default backend when neither the config file nor the environment names one
pub const DEFAULT_BASE_URL: &str = "https://brainquiz0.up.railway.app";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Environment files to load before resolving `env:` references.
    /// Paths support ~ expansion. Loaded in order, later files override earlier.
    pub env_files: Vec<String>,
    /// Backend API configuration
    pub api: ApiConfig,
    /// Request dispatcher configuration
    pub dispatcher: DispatcherConfig,
    /// Read cache configuration
    pub cache: CacheConfig,
}

/// Backend API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the BrainQuiz backend
    pub base_url: String,
    /// Bearer token. Supports a literal value or `env:VAR_NAME`.
    pub token: Option<String>,
    /// Per-request timeout applied by the HTTP transport
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl ApiConfig {
    /// Resolve the bearer token (expand `env:` references)
    ///
    /// An empty token, or an `env:` reference to an unset variable, resolves to `None`
    /// so no `Authorization` header is sent.
    #[must_use]
    pub fn resolve_token(&self) -> Option<String> {
        let token = self.token.as_deref()?;
        let resolved = if let Some(var_name) = token.strip_prefix("env:") {
            env::var(var_name).ok()?
        } else {
            token.to_string()
        };
        let trimmed = resolved.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

/// Bounded request dispatcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Maximum number of requests executing at once
    pub max_concurrent: usize,
    /// Pause between a request settling and the next admission attempt
    #[serde(with = "humantime_serde")]
    pub drain_delay: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            drain_delay: Duration::from_millis(100),
        }
    }
}

/// Read cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable read caching
    pub enabled: bool,
    /// Time-to-live for cached reads
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
    /// Interval of the background sweep that drops stale entries.
    /// `None` keeps expiry purely lazy.
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(5 * 60),
            sweep_interval: None,
        }
    }
}

impl Config {
    /// Load configuration from an optional YAML file plus `BRAINQUIZ_` environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        // BRAINQUIZ_API__BASE_URL -> api.base_url
        figment = figment.merge(Env::prefixed("BRAINQUIZ_").split("__"));

        let config: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        config.load_env_files();
        config.validate()?;

        Ok(config)
    }

    /// Load env files into the process environment
    fn load_env_files(&self) {
        for path_str in &self.env_files {
            let expanded = if path_str.starts_with('~') {
                if let Some(home) = dirs::home_dir() {
                    path_str.replacen('~', &home.display().to_string(), 1)
                } else {
                    path_str.clone()
                }
            } else {
                path_str.clone()
            };

            let path = Path::new(&expanded);
            if path.exists() {
                match dotenvy::from_path(path) {
                    Ok(()) => tracing::info!("Loaded env file: {expanded}"),
                    Err(e) => tracing::warn!("Failed to load env file {expanded}: {e}"),
                }
            } else {
                tracing::debug!("Env file not found (skipped): {expanded}");
            }
        }
    }

    /// Check invariants figment cannot express
    pub fn validate(&self) -> Result<()> {
        if self.dispatcher.max_concurrent == 0 {
            return Err(Error::Config(
                "dispatcher.max_concurrent must be at least 1".to_string(),
            ));
        }
        if self.cache.ttl.is_zero() {
            return Err(Error::Config("cache.ttl must be non-zero".to_string()));
        }
        if self.cache.sweep_interval.is_some_and(|d| d.is_zero()) {
            return Err(Error::Config(
                "cache.sweep_interval must be non-zero when set".to_string(),
            ));
        }
        let url = Url::parse(&self.api.base_url)
            .map_err(|e| Error::Config(format!("Invalid api.base_url '{}': {e}", self.api.base_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "api.base_url must be http or https, got '{}'",
                url.scheme()
            )));
        }
        Ok(())
    }
}
