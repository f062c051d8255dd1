//! Application-level configuration loading for backend endpoints and sync tuning.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::cache::RetryTuning;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "ARENA_SYNC_CONFIG_PATH";
/// Environment override for the data service REST endpoint.
const BACKEND_URL_ENV: &str = "ARENA_BACKEND_URL";
/// Environment override for the data service API key.
const BACKEND_API_KEY_ENV: &str = "ARENA_BACKEND_API_KEY";
/// Environment override for the change feed websocket endpoint.
const FEED_URL_ENV: &str = "ARENA_FEED_URL";

const DEFAULT_BACKEND_URL: &str = "http://localhost:54321/rest/v1";
const DEFAULT_FEED_URL: &str = "ws://localhost:54321/realtime/v1/websocket";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    backend: BackendConfig,
    tuning: SyncTuning,
}

#[derive(Debug, Clone)]
/// Connection settings for the upstream arena data service.
pub struct BackendConfig {
    /// Base URL of the REST endpoint, without a trailing slash.
    pub base_url: String,
    /// API key sent with every REST and feed request, when the service wants one.
    pub api_key: Option<String>,
    /// Websocket URL of the change feed endpoint.
    pub feed_url: String,
}

#[derive(Debug, Clone)]
/// Knobs for the cache, reconciler and feed recovery behaviour.
pub struct SyncTuning {
    /// Retry ladder applied to transient backend read failures.
    pub retry: RetryTuning,
    /// Whether the periodic lifecycle reconciler runs at all.
    pub reconciler_enabled: bool,
    /// Interval between reconciliation sweeps.
    pub reconciler_period: Duration,
    /// Fixed delay before a dropped feed listener reconnects.
    pub feed_retry_delay: Duration,
}

impl Default for SyncTuning {
    fn default() -> Self {
        Self {
            retry: RetryTuning::default(),
            reconciler_enabled: true,
            reconciler_period: Duration::from_secs(15),
            feed_retry_delay: Duration::from_secs(5),
        }
    }
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    ///
    /// Environment variables override the file for the backend endpoints, which keeps
    /// container deployments free of mounted config files.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let mut config = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(path = %path.display(), "loaded configuration from file");
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        };
        config.apply_env_overrides();
        config
    }

    /// Connection settings for the upstream data service.
    pub fn backend(&self) -> &BackendConfig {
        &self.backend
    }

    /// Cache and reconciliation tuning.
    pub fn tuning(&self) -> &SyncTuning {
        &self.tuning
    }

    fn apply_env_overrides(&mut self) {
        if let Some(url) = non_empty_env(BACKEND_URL_ENV) {
            self.backend.base_url = url;
        }
        if let Some(key) = non_empty_env(BACKEND_API_KEY_ENV) {
            self.backend.api_key = Some(key);
        }
        if let Some(url) = non_empty_env(FEED_URL_ENV) {
            self.backend.feed_url = url;
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig {
                base_url: DEFAULT_BACKEND_URL.to_string(),
                api_key: None,
                feed_url: DEFAULT_FEED_URL.to_string(),
            },
            tuning: SyncTuning::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    backend: RawBackend,
    #[serde(default)]
    sync: RawSync,
}

#[derive(Debug, Default, Deserialize)]
/// JSON representation of the backend connection block.
struct RawBackend {
    base_url: Option<String>,
    api_key: Option<String>,
    feed_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
/// JSON representation of the sync tuning block. Every field is optional.
struct RawSync {
    max_retries: Option<u32>,
    initial_backoff_ms: Option<u64>,
    max_backoff_ms: Option<u64>,
    reconciler_enabled: Option<bool>,
    reconciler_period_secs: Option<u64>,
    feed_retry_delay_secs: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = AppConfig::default();
        let retry_defaults = RetryTuning::default();
        let tuning_defaults = SyncTuning::default();

        let retry = RetryTuning {
            max_retries: value.sync.max_retries.unwrap_or(retry_defaults.max_retries),
            initial_backoff: value
                .sync
                .initial_backoff_ms
                .map(Duration::from_millis)
                .unwrap_or(retry_defaults.initial_backoff),
            max_backoff: value
                .sync
                .max_backoff_ms
                .map(Duration::from_millis)
                .unwrap_or(retry_defaults.max_backoff),
        };

        Self {
            backend: BackendConfig {
                base_url: value
                    .backend
                    .base_url
                    .unwrap_or(defaults.backend.base_url)
                    .trim_end_matches('/')
                    .to_string(),
                api_key: value.backend.api_key,
                feed_url: value.backend.feed_url.unwrap_or(defaults.backend.feed_url),
            },
            tuning: SyncTuning {
                retry,
                reconciler_enabled: value
                    .sync
                    .reconciler_enabled
                    .unwrap_or(tuning_defaults.reconciler_enabled),
                reconciler_period: value
                    .sync
                    .reconciler_period_secs
                    .map(Duration::from_secs)
                    .unwrap_or(tuning_defaults.reconciler_period),
                feed_retry_delay: value
                    .sync
                    .feed_retry_delay_secs
                    .map(Duration::from_secs)
                    .unwrap_or(tuning_defaults.feed_retry_delay),
            },
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Read an environment variable, treating empty values as unset.
fn non_empty_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}
