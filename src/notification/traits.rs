//! The delivery seam for spike notifications.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::{models::NotificationRequest, notification::error::EmitterError};

/// Accepts composed notifications for delivery.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NotificationEmitter: Send + Sync {
    /// Hands a notification over for delivery.
    async fn send(&self, request: NotificationRequest) -> Result<(), EmitterError>;

    /// Releases resources held by the emitter.
    async fn shutdown(&self) -> Result<(), EmitterError> {
        Ok(())
    }
}
