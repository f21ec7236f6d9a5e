//! # Notifications
//!
//! Composition and delivery of spike notifications.
//!
//! - **`MessageComposer`** renders the subject and body of a spike message
//!   for one recipient from configurable minijinja templates.
//! - **`NotificationEmitter`** is the delivery seam. `StdoutEmitter` prints,
//!   `WebhookEmitter` posts JSON to an endpoint, and `QueuedEmitter` hands
//!   requests to a background `DeliveryWorker` so the caller never waits on
//!   delivery.
//!
//! Delivery failures stay inside this module: they are logged by whoever
//! performs the delivery and never reach the episode controller's state.

mod composer;
pub mod error;
mod factory;
mod http;
mod queue;
mod stdout;
pub mod template;
mod traits;
mod webhook;

pub use composer::{MessageComposer, MessageTemplates};
pub use error::EmitterError;
pub use factory::create_emitter;
pub use http::create_retryable_http_client;
pub use queue::{DeliveryWorker, QueuedEmitter};
pub use stdout::StdoutEmitter;
#[cfg(test)]
pub use traits::MockNotificationEmitter;
pub use traits::NotificationEmitter;
pub use webhook::WebhookEmitter;
