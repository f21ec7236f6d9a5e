use async_trait::async_trait;

use crate::{
    models::NotificationRequest,
    notification::{error::EmitterError, traits::NotificationEmitter},
};

/// An emitter that prints every notification to standard output.
#[derive(Debug, Default)]
pub struct StdoutEmitter;

impl StdoutEmitter {
    /// Creates a new `StdoutEmitter`.
    pub fn new() -> Self {
        Self
    }

    fn format(request: &NotificationRequest) -> String {
        format!(
            "=== Spike notification for account {} ===\n{}\n\n{}\n",
            request.recipient_account_id, request.subject, request.body
        )
    }
}

#[async_trait]
impl NotificationEmitter for StdoutEmitter {
    async fn send(&self, request: NotificationRequest) -> Result<(), EmitterError> {
        println!("{}", Self::format(&request));
        Ok(())
    }
}
