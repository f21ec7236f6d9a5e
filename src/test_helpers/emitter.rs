use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    models::NotificationRequest,
    notification::{EmitterError, NotificationEmitter},
};

/// An emitter that keeps every request it is given.
#[derive(Debug, Default)]
pub struct RecordingEmitter {
    requests: Mutex<Vec<NotificationRequest>>,
}

impl RecordingEmitter {
    /// Creates a new, empty recording emitter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every request received so far, in order.
    pub async fn requests(&self) -> Vec<NotificationRequest> {
        self.requests.lock().await.clone()
    }

    /// The recipients of every request received so far, sorted.
    pub async fn recipients(&self) -> Vec<i64> {
        let mut recipients: Vec<i64> =
            self.requests.lock().await.iter().map(|r| r.recipient_account_id).collect();
        recipients.sort_unstable();
        recipients
    }
}

#[async_trait]
impl NotificationEmitter for RecordingEmitter {
    async fn send(&self, request: NotificationRequest) -> Result<(), EmitterError> {
        self.requests.lock().await.push(request);
        Ok(())
    }
}
