use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use url::Url;

use super::{
    EmitterConfig, HttpRetryConfig, deserialize_duration_from_seconds,
    serialize_duration_to_seconds,
};
use crate::{engine::EpisodeResetPolicy, notification::MessageTemplates};

/// Provides the default value for shutdown_timeout.
fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Provides the default value for the channel capacities.
fn default_channel_capacity() -> u32 {
    1024
}

/// Provides the default value for sweep_interval_secs.
fn default_sweep_interval_secs() -> Duration {
    Duration::from_secs(60)
}

/// Provides the default value for concurrency.
fn default_concurrency() -> u64 {
    12
}

/// Provides the default value for baseline_window_days.
fn default_baseline_window_days() -> u32 {
    30
}

/// Provides the default value for base_url.
fn default_base_url() -> Url {
    Url::parse("http://localhost/").unwrap_or_else(|_| unreachable!("static URL is valid"))
}

/// Application configuration for spikeguard.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// Database URL for the SQLite database.
    pub database_url: String,

    /// Base URL of the web front end, used to link to the application page.
    #[serde(default = "default_base_url")]
    pub base_url: Url,

    /// Path to the notification preferences file.
    #[serde(skip_deserializing)]
    pub preferences_path: PathBuf,

    /// When an active spike episode ends.
    #[serde(default)]
    pub episode_reset: EpisodeResetPolicy,

    /// Number of past days averaged into the baseline.
    #[serde(default = "default_baseline_window_days")]
    pub baseline_window_days: u32,

    /// The number of events handled concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: u64,

    /// The capacity of the channel feeding events to the dispatcher.
    #[serde(default = "default_channel_capacity")]
    pub event_channel_capacity: u32,

    /// The capacity of the channel used for sending notifications.
    #[serde(default = "default_channel_capacity")]
    pub notification_channel_capacity: u32,

    /// The interval in seconds between expired-episode sweeps.
    #[serde(
        deserialize_with = "deserialize_duration_from_seconds",
        serialize_with = "serialize_duration_to_seconds",
        default = "default_sweep_interval_secs"
    )]
    pub sweep_interval_secs: Duration,

    /// The maximum time in seconds to wait for graceful shutdown.
    #[serde(
        deserialize_with = "deserialize_duration_from_seconds",
        serialize_with = "serialize_duration_to_seconds",
        default = "default_shutdown_timeout"
    )]
    pub shutdown_timeout: Duration,

    /// Subject and body templates of the spike message.
    #[serde(default)]
    pub messages: MessageTemplates,

    /// Where notifications are delivered.
    #[serde(default)]
    pub emitter: EmitterConfig,

    /// Configuration for HTTP client retry policies.
    #[serde(default)]
    pub http_retry_config: HttpRetryConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            base_url: default_base_url(),
            preferences_path: PathBuf::new(),
            episode_reset: EpisodeResetPolicy::default(),
            baseline_window_days: default_baseline_window_days(),
            concurrency: default_concurrency(),
            event_channel_capacity: default_channel_capacity(),
            notification_channel_capacity: default_channel_capacity(),
            sweep_interval_secs: default_sweep_interval_secs(),
            shutdown_timeout: default_shutdown_timeout(),
            messages: MessageTemplates::default(),
            emitter: EmitterConfig::default(),
            http_retry_config: HttpRetryConfig::default(),
        }
    }
}

impl AppConfig {
    /// Creates a new `AppConfig` by reading from the configuration directory.
    pub fn new(config_dir: Option<&str>) -> Result<Self, ConfigError> {
        let config_dir_str = config_dir.unwrap_or("configs");
        let s = Config::builder()
            .add_source(File::with_name(&format!("{}/app.yaml", config_dir_str)))
            .add_source(Environment::with_prefix("SPIKEGUARD").separator("__"))
            .build()?;
        let mut config: Self = s.try_deserialize()?;
        config.validate()?;

        config.preferences_path = Path::new(config_dir_str).join("preferences.yaml");

        Ok(config)
    }

    /// Rejects values the services cannot run with.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.sweep_interval_secs.is_zero() {
            return Err(ConfigError::Message(
                "sweep_interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Creates a new `AppConfigBuilder` for testing purposes.
    #[cfg(test)]
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }
}

/// A builder for creating `AppConfig` instances for testing.
#[cfg(test)]
#[derive(Default)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

#[cfg(test)]
impl AppConfigBuilder {
    pub fn database_url(mut self, url: &str) -> Self {
        self.config.database_url = url.to_string();
        self
    }

    pub fn preferences_path(mut self, path: &str) -> Self {
        self.config.preferences_path = path.into();
        self
    }

    pub fn episode_reset(mut self, policy: EpisodeResetPolicy) -> Self {
        self.config.episode_reset = policy;
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn write_app_yaml(dir: &TempDir, content: &str) {
        fs::write(dir.path().join("app.yaml"), content).unwrap();
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let dir = TempDir::new().unwrap();
        write_app_yaml(&dir, "database_url: sqlite::memory:\n");

        let config = AppConfig::new(dir.path().to_str()).unwrap();

        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.base_url.as_str(), "http://localhost/");
        assert_eq!(config.preferences_path, dir.path().join("preferences.yaml"));
        assert_eq!(config.episode_reset, EpisodeResetPolicy::default());
        assert_eq!(config.baseline_window_days, 30);
        assert_eq!(config.concurrency, 12);
        assert_eq!(config.notification_channel_capacity, 1024);
        assert_eq!(config.sweep_interval_secs, Duration::from_secs(60));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(30));
        assert_eq!(config.messages, MessageTemplates::default());
        assert_eq!(config.emitter, EmitterConfig::Stdout);
    }

    #[test]
    fn test_full_config() {
        let dir = TempDir::new().unwrap();
        write_app_yaml(
            &dir,
            r#"
database_url: sqlite:data/spikeguard.db
base_url: https://errors.example.com/
baseline_window_days: 14
concurrency: 4
sweep_interval_secs: 10
shutdown_timeout: 5
episode_reset:
  type: inactivity
  idle_secs: 3600
messages:
  subject: "Spike: {{ application_name }}"
emitter:
  type: webhook
  url: https://hooks.example.com/spikes
  secret: top-secret
"#,
        );

        let config = AppConfig::new(dir.path().to_str()).unwrap();

        assert_eq!(config.base_url.as_str(), "https://errors.example.com/");
        assert_eq!(config.baseline_window_days, 14);
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.sweep_interval_secs, Duration::from_secs(10));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
        assert_eq!(
            config.episode_reset,
            EpisodeResetPolicy::Inactivity { idle_secs: Duration::from_secs(3600) }
        );
        assert_eq!(config.messages.subject, "Spike: {{ application_name }}");
        assert_eq!(config.messages.body, MessageTemplates::default().body);
        match config.emitter {
            EmitterConfig::Webhook(webhook) => {
                assert_eq!(webhook.url.as_str(), "https://hooks.example.com/spikes");
                assert_eq!(webhook.secret.as_deref(), Some("top-secret"));
            }
            other => panic!("expected webhook emitter, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_database_url_fails() {
        let dir = TempDir::new().unwrap();
        write_app_yaml(&dir, "concurrency: 2\n");
        assert!(AppConfig::new(dir.path().to_str()).is_err());
    }

    #[test]
    fn test_zero_sweep_interval_is_rejected() {
        let dir = TempDir::new().unwrap();
        write_app_yaml(&dir, "database_url: sqlite::memory:\nsweep_interval_secs: 0\n");

        let err = AppConfig::new(dir.path().to_str()).unwrap_err();
        assert!(err.to_string().contains("sweep_interval_secs"));
    }

    #[test]
    fn test_out_of_range_utc_offset_is_rejected() {
        let dir = TempDir::new().unwrap();
        write_app_yaml(
            &dir,
            "database_url: sqlite::memory:\nepisode_reset:\n  type: calendar_day\n  utc_offset_minutes: 1440\n",
        );

        assert!(AppConfig::new(dir.path().to_str()).is_err());
    }

    #[test]
    fn test_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        assert!(AppConfig::new(dir.path().to_str()).is_err());
    }

    #[test]
    fn test_builder() {
        let config = AppConfig::builder()
            .database_url("sqlite::memory:")
            .episode_reset(EpisodeResetPolicy::Never)
            .build();
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.episode_reset, EpisodeResetPolicy::Never);
    }
}
