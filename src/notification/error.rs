//! Errors raised while delivering notifications.

use thiserror::Error;

/// Errors that can occur within the notification emitters.
#[derive(Debug, Error)]
pub enum EmitterError {
    /// The emitter is misconfigured.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The receiving side rejected or failed to accept the notification.
    #[error("Delivery failed: {0}")]
    DeliveryFailure(String),

    /// The delivery queue is closed; the worker has stopped.
    #[error("Notification queue is closed")]
    QueueClosed,

    /// An error from the underlying `reqwest` or `reqwest_middleware`
    /// libraries.
    #[error("Request error: {0}")]
    RequestError(#[from] reqwest_middleware::Error),
}
