//! Asynchronous delivery: the controller enqueues, a worker delivers.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    models::NotificationRequest,
    notification::{error::EmitterError, traits::NotificationEmitter},
};

/// A fire-and-forget emitter backed by a bounded channel.
pub struct QueuedEmitter {
    sender: mpsc::Sender<NotificationRequest>,
}

/// Drains a [`QueuedEmitter`] into the emitter that performs the delivery.
pub struct DeliveryWorker {
    receiver: mpsc::Receiver<NotificationRequest>,
    inner: Arc<dyn NotificationEmitter>,
}

impl QueuedEmitter {
    /// Creates the queue and the worker that must be spawned to drain it.
    pub fn new(capacity: usize, inner: Arc<dyn NotificationEmitter>) -> (Self, DeliveryWorker) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, DeliveryWorker { receiver, inner })
    }
}

#[async_trait]
impl NotificationEmitter for QueuedEmitter {
    async fn send(&self, request: NotificationRequest) -> Result<(), EmitterError> {
        self.sender.send(request).await.map_err(|_| EmitterError::QueueClosed)
    }
}

impl DeliveryWorker {
    /// Delivers queued notifications until cancelled or until every sender
    /// is gone. On cancellation, whatever is already queued is still
    /// delivered.
    pub async fn run(mut self, cancellation_token: CancellationToken) {
        loop {
            tokio::select! {
                biased;
                maybe_request = self.receiver.recv() => match maybe_request {
                    Some(request) => self.deliver(request).await,
                    None => break,
                },
                _ = cancellation_token.cancelled() => {
                    self.receiver.close();
                    while let Some(request) = self.receiver.recv().await {
                        self.deliver(request).await;
                    }
                    break;
                }
            }
        }

        if let Err(e) = self.inner.shutdown().await {
            tracing::warn!(error = %e, "Emitter shutdown reported an error.");
        }
        tracing::info!("Notification delivery worker stopped.");
    }

    async fn deliver(&self, request: NotificationRequest) {
        let account_id = request.recipient_account_id;
        if let Err(e) = self.inner.send(request).await {
            tracing::error!(account_id, error = %e, "Failed to deliver spike notification.");
        }
    }
}
