use thiserror::Error;

use crate::{
    config::LoaderError, notification::EmitterError, notification::template::TemplateServiceError,
    persistence::error::PersistenceError,
};

/// Errors that can occur during application context initialization.
#[derive(Debug, Error)]
pub enum AppContextError {
    /// Configuration error.
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    /// Persistence error.
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// The preferences file could not be loaded.
    #[error("Failed to load notification preferences: {0}")]
    Preferences(#[from] LoaderError),

    /// The message templates are invalid.
    #[error("Invalid message template: {0}")]
    Template(#[from] TemplateServiceError),

    /// The emitter could not be created.
    #[error("Emitter error: {0}")]
    Emitter(#[from] EmitterError),
}
