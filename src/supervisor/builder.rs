//! This module provides the `SupervisorBuilder` for constructing a `Supervisor`.

use std::sync::Arc;

use super::{Supervisor, SupervisorError};
use crate::{
    config::AppConfig,
    engine::SpikeController,
    events::{CountingHandler, ReportAddedHandler},
    notification::{MessageComposer, NotificationEmitter, QueuedEmitter, create_emitter},
    persistence::sqlite::SqliteStateRepository,
    sources::PreferenceLookup,
};

/// A builder for creating a `Supervisor` instance.
#[derive(Default)]
pub struct SupervisorBuilder {
    config: Option<AppConfig>,
    state: Option<Arc<SqliteStateRepository>>,
    preferences: Option<Arc<dyn PreferenceLookup>>,
    emitter: Option<Arc<dyn NotificationEmitter>>,
}

impl SupervisorBuilder {
    /// Creates a new, empty `SupervisorBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the application configuration for the `Supervisor`.
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the state repository (database connection) for the `Supervisor`.
    pub fn state(mut self, state: Arc<SqliteStateRepository>) -> Self {
        self.state = Some(state);
        self
    }

    /// Sets the notification preference lookup.
    pub fn preferences(mut self, preferences: Arc<dyn PreferenceLookup>) -> Self {
        self.preferences = Some(preferences);
        self
    }

    /// Delivers notifications through `emitter` instead of the one described
    /// by the configuration.
    pub fn emitter(mut self, emitter: Arc<dyn NotificationEmitter>) -> Self {
        self.emitter = Some(emitter);
        self
    }

    /// Assembles and validates the components to build a `Supervisor`.
    ///
    /// The controller submits notifications to a queue; the delivery worker
    /// draining it into the actual emitter is started by `Supervisor::run`.
    pub fn build(self) -> Result<Supervisor, SupervisorError> {
        let config = self.config.ok_or(SupervisorError::MissingConfig)?;
        let state = self.state.ok_or(SupervisorError::MissingStateRepository)?;
        let preferences = self.preferences.ok_or(SupervisorError::MissingPreferences)?;

        let emitter = match self.emitter {
            Some(emitter) => emitter,
            None => create_emitter(&config.emitter, &config.http_retry_config)?,
        };
        let (queued_emitter, delivery_worker) =
            QueuedEmitter::new(config.notification_channel_capacity as usize, emitter);

        let composer = MessageComposer::new(config.messages.clone(), config.base_url.clone())?;
        tracing::debug!(reset_policy = ?config.episode_reset, "Creating spike controller.");

        let controller = Arc::new(SpikeController::new(
            preferences,
            Arc::clone(&state) as _,
            Arc::clone(&state) as _,
            Arc::new(queued_emitter),
            composer,
            config.episode_reset.clone(),
        ));
        let report_added: Arc<dyn ReportAddedHandler> = Arc::new(CountingHandler::new(
            Arc::clone(&state) as _,
            Arc::clone(&controller) as _,
        ));

        Ok(Supervisor::new(config, state, controller, report_added, delivery_worker))
    }
}
