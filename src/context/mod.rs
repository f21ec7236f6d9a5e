//! Application context and initialization logic.
//! This module handles loading configuration, setting up the database and
//! loading the notification preferences. The `AppContext` struct
//! encapsulates these components for the commands of the binary.

mod error;

use std::sync::Arc;

pub use error::AppContextError;

use crate::{
    config::AppConfig, persistence::sqlite::SqliteStateRepository,
    sources::StaticPreferenceLookup,
};

/// The application context, holding configuration, database repository and
/// notification preferences.
pub struct AppContext {
    /// Shared application configuration.
    pub config: AppConfig,

    /// The state repository for database interactions.
    pub repo: Arc<SqliteStateRepository>,

    /// The notification preferences of every application.
    pub preferences: Arc<StaticPreferenceLookup>,
}

/// A builder for the `AppContext`, allowing configuration overrides
/// and step-by-step initialization.
#[derive(Default)]
pub struct AppContextBuilder {
    /// Optional configuration directory to load settings from.
    config_dir: Option<String>,

    /// Optional override for the database URL.
    database_url_override: Option<String>,
}

impl AppContextBuilder {
    /// Creates a new `AppContextBuilder` with an optional configuration
    /// directory.
    pub fn new(config_dir: Option<String>) -> Self {
        Self { config_dir, database_url_override: None }
    }

    /// Sets a database URL override.
    pub fn database_url(mut self, url: String) -> Self {
        self.database_url_override = Some(url);
        self
    }

    /// Builds the `AppContext`: loads the configuration, opens and migrates
    /// the database and loads the preferences file.
    pub async fn build(self) -> Result<AppContext, AppContextError> {
        tracing::debug!("Loading application configuration...");
        let mut config = AppConfig::new(self.config_dir.as_deref())?;
        tracing::debug!(database_url = %config.database_url, base_url = %config.base_url, "Configuration loaded.");

        if let Some(db_url) = self.database_url_override {
            tracing::info!(database_url = %db_url, "Overriding database URL.");
            config.database_url = db_url;
        }

        tracing::debug!("Initializing state repository...");
        let repo = SqliteStateRepository::new(&config.database_url)
            .await?
            .with_baseline_window_days(config.baseline_window_days);
        repo.run_migrations().await?;
        tracing::info!("Database migrations completed.");

        tracing::debug!(path = %config.preferences_path.display(), "Loading notification preferences...");
        let preferences = StaticPreferenceLookup::from_file(config.preferences_path.clone())?;
        tracing::info!(applications = preferences.len(), "Notification preferences loaded.");

        Ok(AppContext { config, repo: Arc::new(repo), preferences: Arc::new(preferences) })
    }
}
