//! Webhook delivery of spike notifications.
//!
//! Every notification is POSTed as JSON. When a secret is configured the
//! payload is signed with HMAC-SHA256 and the signature travels in the
//! `x-signature` / `x-timestamp` headers.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest_middleware::ClientWithMiddleware;
use sha2::Sha256;

use crate::{
    config::WebhookEmitterConfig,
    models::NotificationRequest,
    notification::{error::EmitterError, traits::NotificationEmitter},
};

/// HMAC SHA256 type alias
type HmacSha256 = Hmac<Sha256>;

/// Delivers notifications to a webhook endpoint.
#[derive(Debug)]
pub struct WebhookEmitter {
    url: String,
    secret: Option<String>,
    headers: HeaderMap,
    client: Arc<ClientWithMiddleware>,
}

impl WebhookEmitter {
    /// Creates a new webhook emitter, validating the configured headers.
    pub fn new(
        config: &WebhookEmitterConfig,
        client: Arc<ClientWithMiddleware>,
    ) -> Result<Self, EmitterError> {
        if matches!(config.secret.as_deref(), Some("")) {
            return Err(EmitterError::ConfigError(
                "Invalid secret: cannot be empty.".to_string(),
            ));
        }

        Ok(Self {
            url: config.url.to_string(),
            secret: config.secret.clone(),
            headers: build_headers(config.headers.as_ref())?,
            client,
        })
    }

    /// Signs `payload` with `secret`, returning the hex signature and the
    /// millisecond timestamp that was signed along with it.
    pub fn sign_payload(
        secret: &str,
        payload: &serde_json::Value,
        timestamp: i64,
    ) -> Result<String, EmitterError> {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| EmitterError::ConfigError(format!("Invalid secret: {e}")))?;

        let serialized_payload = serde_json::to_string(payload).map_err(|e| {
            EmitterError::DeliveryFailure(format!("Failed to serialize payload: {e}"))
        })?;
        mac.update(format!("{serialized_payload}{timestamp}").as_bytes());

        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

fn build_headers(custom: Option<&HashMap<String, String>>) -> Result<HeaderMap, EmitterError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_static("content-type"),
        HeaderValue::from_static("application/json"),
    );

    for (key, value) in custom.into_iter().flatten() {
        let header_name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|e| EmitterError::ConfigError(format!("Invalid header name: {key}: {e}")))?;
        let header_value = HeaderValue::from_str(value).map_err(|e| {
            EmitterError::ConfigError(format!("Invalid header value for {key}: {e}"))
        })?;
        headers.insert(header_name, header_value);
    }

    Ok(headers)
}

#[async_trait]
impl NotificationEmitter for WebhookEmitter {
    async fn send(&self, request: NotificationRequest) -> Result<(), EmitterError> {
        let payload = serde_json::to_value(&request).map_err(|e| {
            EmitterError::DeliveryFailure(format!("Failed to serialize notification: {e}"))
        })?;

        let mut headers = self.headers.clone();
        if let Some(secret) = &self.secret {
            let timestamp = Utc::now().timestamp_millis();
            let signature = Self::sign_payload(secret, &payload, timestamp)?;
            let as_header = |value: String| {
                HeaderValue::from_str(&value)
                    .map_err(|e| EmitterError::DeliveryFailure(format!("Invalid header: {e}")))
            };
            headers.insert(HeaderName::from_static("x-signature"), as_header(signature)?);
            headers.insert(HeaderName::from_static("x-timestamp"), as_header(timestamp.to_string())?);
        }

        let response =
            self.client.post(self.url.as_str()).headers(headers).json(&payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(EmitterError::DeliveryFailure(format!(
                "Webhook request for account {} failed with status: {status}",
                request.recipient_account_id
            )));
        }

        tracing::debug!(
            account_id = request.recipient_account_id,
            "Spike notification delivered to webhook."
        );
        Ok(())
    }
}
