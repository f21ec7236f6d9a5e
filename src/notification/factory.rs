//! Builds the configured emitter.

use std::sync::Arc;

use crate::{
    config::{EmitterConfig, HttpRetryConfig},
    notification::{
        create_retryable_http_client, error::EmitterError, stdout::StdoutEmitter,
        traits::NotificationEmitter, webhook::WebhookEmitter,
    },
};

/// Creates the emitter described by `config`. Webhooks without their own
/// retry policy use `default_retry`.
pub fn create_emitter(
    config: &EmitterConfig,
    default_retry: &HttpRetryConfig,
) -> Result<Arc<dyn NotificationEmitter>, EmitterError> {
    match config {
        EmitterConfig::Stdout => Ok(Arc::new(StdoutEmitter::new())),
        EmitterConfig::Webhook(webhook) => {
            let retry_policy = webhook.retry_policy.as_ref().unwrap_or(default_retry);
            let base_client = reqwest::Client::builder()
                .build()
                .map_err(|e| EmitterError::ConfigError(format!("Failed to build HTTP client: {e}")))?;
            let client = create_retryable_http_client(retry_policy, base_client);
            tracing::debug!(url = %webhook.url, ?retry_policy, "Webhook emitter configured.");
            Ok(Arc::new(WebhookEmitter::new(webhook, Arc::new(client))?))
        }
    }
}
