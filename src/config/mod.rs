//! Configuration module for spikeguard.

mod app_config;
mod emitter;
mod helpers;
mod http_retry;
mod loader;

pub use app_config::AppConfig;
pub use emitter::{EmitterConfig, WebhookEmitterConfig};
pub use helpers::{
    deserialize_duration_from_ms, deserialize_duration_from_seconds, serialize_duration_to_ms,
    serialize_duration_to_seconds,
};
pub use http_retry::{HttpRetryConfig, JitterSetting};
pub use loader::{ConfigLoader, LoaderError};
