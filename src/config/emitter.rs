use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use url::Url;

use super::HttpRetryConfig;

/// Where composed spike notifications are delivered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EmitterConfig {
    /// Print every notification to standard output.
    #[default]
    Stdout,
    /// POST every notification to a webhook.
    Webhook(WebhookEmitterConfig),
}

/// Settings of the webhook emitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEmitterConfig {
    /// Endpoint receiving the notifications.
    pub url: Url,
    /// Shared secret for the HMAC-SHA256 signature headers.
    #[serde(default)]
    pub secret: Option<String>,
    /// Extra headers sent with every request.
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
    /// Retry policy for transient failures. Falls back to the application's
    /// `http_retry_config`.
    #[serde(default)]
    pub retry_policy: Option<HttpRetryConfig>,
}
