//! Fans inbound events out to their handlers with bounded concurrency.

use std::sync::Arc;

use tokio::{
    sync::{Semaphore, mpsc},
    task::{JoinError, JoinSet},
};
use tokio_util::sync::CancellationToken;

use crate::{
    engine::{SpikeControllerError, SpikeOutcome},
    events::handler::ReportAddedHandler,
    models::ApplicationEvent,
};

/// Totals of a dispatcher run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Events taken from the channel.
    pub received: usize,
    /// Events that were recorded as part of a spike episode.
    pub spikes: usize,
    /// Notifications submitted for those spikes.
    pub notifications: usize,
    /// Events skipped because a source was unavailable.
    pub skipped: usize,
    /// Events whose handling failed.
    pub failed: usize,
}

impl DispatchSummary {
    fn record(&mut self, result: Result<Result<SpikeOutcome, SpikeControllerError>, JoinError>) {
        match result {
            Ok(Ok(SpikeOutcome::Notified { notified, .. })) => {
                self.spikes += 1;
                self.notifications += notified.len();
            }
            Ok(Ok(SpikeOutcome::Skipped { .. })) => self.skipped += 1,
            Ok(Ok(_)) => {}
            Ok(Err(_)) => self.failed += 1,
            Err(e) => {
                tracing::error!(error = %e, "Event handler task failed.");
                self.failed += 1;
            }
        }
    }
}

/// Routes every inbound event to its handler, one task per event.
pub struct EventDispatcher {
    report_added: Arc<dyn ReportAddedHandler>,
    concurrency: usize,
}

impl EventDispatcher {
    /// Creates a dispatcher running at most `concurrency` handlers at once.
    pub fn new(report_added: Arc<dyn ReportAddedHandler>, concurrency: usize) -> Self {
        Self { report_added, concurrency: concurrency.max(1) }
    }

    /// Dispatches events until the channel closes or `cancellation_token`
    /// fires, then waits for the handlers already running.
    pub async fn run(
        &self,
        mut events: mpsc::Receiver<ApplicationEvent>,
        cancellation_token: CancellationToken,
    ) -> DispatchSummary {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        let mut summary = DispatchSummary::default();

        loop {
            tokio::select! {
                biased;
                _ = cancellation_token.cancelled() => {
                    tracing::info!("Event dispatcher received shutdown signal.");
                    break;
                }
                Some(result) = tasks.join_next(), if !tasks.is_empty() => summary.record(result),
                maybe_event = events.recv() => {
                    let Some(event) = maybe_event else {
                        tracing::debug!("Event channel closed.");
                        break;
                    };
                    let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                        break;
                    };

                    summary.received += 1;
                    let handler = Arc::clone(&self.report_added);
                    tasks.spawn(async move {
                        let _permit = permit;
                        dispatch(handler.as_ref(), event).await
                    });
                }
            }
        }

        while let Some(result) = tasks.join_next().await {
            summary.record(result);
        }

        tracing::info!(
            received = summary.received,
            spikes = summary.spikes,
            notifications = summary.notifications,
            skipped = summary.skipped,
            failed = summary.failed,
            "Event dispatcher stopped."
        );
        summary
    }
}

async fn dispatch(
    report_added: &dyn ReportAddedHandler,
    event: ApplicationEvent,
) -> Result<SpikeOutcome, SpikeControllerError> {
    match event {
        ApplicationEvent::ReportAddedToIncident(event) => {
            let result = report_added.handle(&event).await;
            if let Err(e) = &result {
                tracing::error!(
                    application_id = event.application_id,
                    incident_id = event.incident_id,
                    error = %e,
                    "Failed to handle report event."
                );
            }
            result
        }
    }
}
