//! Handlers bound to inbound event types.

use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::{
    engine::{SpikeController, SpikeControllerError, SpikeOutcome},
    models::ReportAddedToIncident,
    sources::ReportRecorder,
};

/// Handles `ReportAddedToIncident` events.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ReportAddedHandler: Send + Sync {
    /// Handles one event.
    async fn handle(
        &self,
        event: &ReportAddedToIncident,
    ) -> Result<SpikeOutcome, SpikeControllerError>;
}

#[async_trait]
impl ReportAddedHandler for SpikeController {
    async fn handle(
        &self,
        event: &ReportAddedToIncident,
    ) -> Result<SpikeOutcome, SpikeControllerError> {
        self.on_report_added(event).await
    }
}

/// Counts every valid report before passing it on, so that the baseline
/// sees the reports the engine is asked about.
pub struct CountingHandler {
    recorder: Arc<dyn ReportRecorder>,
    inner: Arc<dyn ReportAddedHandler>,
}

impl CountingHandler {
    /// Creates a new counting handler in front of `inner`.
    pub fn new(recorder: Arc<dyn ReportRecorder>, inner: Arc<dyn ReportAddedHandler>) -> Self {
        Self { recorder, inner }
    }
}

#[async_trait]
impl ReportAddedHandler for CountingHandler {
    async fn handle(
        &self,
        event: &ReportAddedToIncident,
    ) -> Result<SpikeOutcome, SpikeControllerError> {
        event.validate()?;

        // A missed count only makes today's figure lag; the event is still
        // evaluated.
        match self.recorder.record_report(event.application_id, event.report_timestamp).await {
            Ok(total) => {
                tracing::trace!(application_id = event.application_id, total, "Report counted.")
            }
            Err(e) => tracing::error!(
                application_id = event.application_id,
                error = %e,
                "Failed to count report."
            ),
        }

        self.inner.handle(event).await
    }
}
