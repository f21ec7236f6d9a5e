//! Spike episode management

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::{
    engine::{reset_policy::EpisodeResetPolicy, threshold::ThresholdEvaluator},
    models::{EventError, NotificationRequest, ReportAddedToIncident, SpikeDecision, SpikeEpisode},
    notification::{MessageComposer, NotificationEmitter, template::TemplateServiceError},
    persistence::{error::PersistenceError, traits::EpisodeStore},
    sources::{BaselineSource, PreferenceLookup, SourceError},
};

/// What handling a single event amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpikeOutcome {
    /// No account of the application has spike notifications enabled.
    NoSubscribers,
    /// Today's volume is below the threshold, or there is no baseline.
    NoSpike,
    /// A source was unavailable; nothing was changed.
    Skipped {
        /// Why the event was skipped.
        reason: String,
    },
    /// The spike was recorded in the application's episode.
    Notified {
        /// The episode's spike count after this event.
        spike_count: u32,
        /// Accounts that were notified by this event. Empty when every
        /// subscriber already knew about the episode.
        notified: Vec<i64>,
    },
}

/// Errors that abort the handling of a single event.
#[derive(Debug, Error)]
pub enum SpikeControllerError {
    /// The event is missing required data.
    #[error("Invalid event: {0}")]
    InvalidInput(#[from] EventError),

    /// The episode could not be read or written.
    #[error("Episode store error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Another writer kept changing the episode, even after a retry.
    #[error("Concurrent update of the spike episode for application {application_id}: {source}")]
    Conflict {
        /// The contended application.
        application_id: i64,
        /// The last store error.
        source: PersistenceError,
    },

    /// A notification could not be composed.
    #[error("Failed to compose notification: {0}")]
    Template(#[from] TemplateServiceError),
}

/// Reacts to new reports: detects spikes, keeps the application's spike
/// episode up to date and notifies every subscriber at most once per
/// episode.
pub struct SpikeController {
    /// Who wants to hear about spikes.
    preferences: Arc<dyn PreferenceLookup>,

    /// Decides whether today's volume is a spike.
    evaluator: ThresholdEvaluator,

    /// Durable home of the episodes.
    store: Arc<dyn EpisodeStore>,

    /// Receives the composed notifications.
    emitter: Arc<dyn NotificationEmitter>,

    /// Renders the notification text.
    composer: MessageComposer,

    /// When an active episode ends.
    reset_policy: EpisodeResetPolicy,

    /// Serializes episode read-modify-write cycles per application.
    application_locks: DashMap<i64, Arc<Mutex<()>>>,

    /// Notifications handed to the emitter, by application id.
    submitted_notifications: DashMap<i64, usize>,
}

/// Internal result of one read-modify-write cycle.
struct RecordedSpike {
    episode: SpikeEpisode,
    requests: Vec<NotificationRequest>,
}

impl SpikeController {
    /// Creates a new controller.
    pub fn new(
        preferences: Arc<dyn PreferenceLookup>,
        baseline: Arc<dyn BaselineSource>,
        store: Arc<dyn EpisodeStore>,
        emitter: Arc<dyn NotificationEmitter>,
        composer: MessageComposer,
        reset_policy: EpisodeResetPolicy,
    ) -> Self {
        Self {
            preferences,
            evaluator: ThresholdEvaluator::new(baseline),
            store,
            emitter,
            composer,
            reset_policy,
            application_locks: DashMap::new(),
            submitted_notifications: DashMap::new(),
        }
    }

    /// Handles a report added to an incident.
    pub async fn on_report_added(
        &self,
        event: &ReportAddedToIncident,
    ) -> Result<SpikeOutcome, SpikeControllerError> {
        self.on_report_added_at(event, Utc::now()).await
    }

    /// Handles a report added to an incident as of `now`.
    #[tracing::instrument(
        skip(self, event, now),
        fields(application_id = event.application_id, incident_id = event.incident_id)
    )]
    pub async fn on_report_added_at(
        &self,
        event: &ReportAddedToIncident,
        now: DateTime<Utc>,
    ) -> Result<SpikeOutcome, SpikeControllerError> {
        event.validate()?;
        let application_id = event.application_id;

        let settings = match self.preferences.get_all(application_id).await {
            Ok(settings) => settings,
            Err(e) => return Ok(Self::skipped("notification preferences", e)),
        };
        let subscribers: Vec<i64> = settings
            .iter()
            .filter(|s| s.application_spike.is_enabled())
            .map(|s| s.account_id)
            .collect();
        if subscribers.is_empty() {
            tracing::debug!("No account wants spike notifications.");
            return Ok(SpikeOutcome::NoSubscribers);
        }

        let decision = match self.evaluator.evaluate(application_id).await {
            Ok(Some(decision)) => decision,
            Ok(None) => return Ok(SpikeOutcome::NoSpike),
            Err(e) => return Ok(Self::skipped("report baseline", e)),
        };
        tracing::info!(
            todays_count = decision.spike_count,
            day_average = decision.day_average,
            "Report spike detected."
        );

        let recorded = {
            let lock = self.get_application_lock(application_id);
            let _guard = lock.lock().await;
            self.record_spike_with_retry(event, &decision, &subscribers, now).await?
        };

        let Some(RecordedSpike { episode, requests }) = recorded else {
            return Ok(SpikeOutcome::NoSubscribers);
        };

        let notified: Vec<i64> = requests.iter().map(|r| r.recipient_account_id).collect();
        self.submit(application_id, requests).await;

        Ok(SpikeOutcome::Notified { spike_count: episode.spike_count, notified })
    }

    /// Runs the read-modify-write cycle, retrying once if the store reports
    /// that a concurrent writer got there first.
    async fn record_spike_with_retry(
        &self,
        event: &ReportAddedToIncident,
        decision: &SpikeDecision,
        subscribers: &[i64],
        now: DateTime<Utc>,
    ) -> Result<Option<RecordedSpike>, SpikeControllerError> {
        match self.record_spike(event, decision, subscribers, now).await {
            Err(SpikeControllerError::Persistence(e)) if e.is_conflict() => {
                tracing::warn!(error = %e, "Spike episode changed concurrently, retrying once.");
            }
            other => return other,
        }

        match self.record_spike(event, decision, subscribers, now).await {
            Err(SpikeControllerError::Persistence(source)) if source.is_conflict() => {
                Err(SpikeControllerError::Conflict { application_id: event.application_id, source })
            }
            other => other,
        }
    }

    /// Loads the episode, applies the spike and persists the result. Nothing
    /// is written when no episode exists and nobody needs notifying.
    async fn record_spike(
        &self,
        event: &ReportAddedToIncident,
        decision: &SpikeDecision,
        subscribers: &[i64],
        now: DateTime<Utc>,
    ) -> Result<Option<RecordedSpike>, SpikeControllerError> {
        let application_id = event.application_id;

        let mut episode = self.load_active_episode(application_id, now).await?;
        let existed = episode.is_some();
        if let Some(episode) = episode.as_mut() {
            episode.increase_spike_count(now);
        }

        let mut requests = Vec::new();
        for &account_id in subscribers {
            if episode.as_ref().is_some_and(|e| e.has_account(account_id)) {
                continue;
            }

            let episode = episode.get_or_insert_with(|| SpikeEpisode::new(application_id, now));
            episode.add_notified_account(account_id);
            requests.push(self.composer.compose(event, decision, account_id)?);
        }

        let Some(episode) = episode else {
            return Ok(None);
        };

        if existed {
            self.store.update(&episode).await?;
        } else {
            self.store.create(&episode).await?;
        }
        tracing::debug!(
            spike_count = episode.spike_count,
            new_recipients = requests.len(),
            created = !existed,
            "Spike episode persisted."
        );

        Ok(Some(RecordedSpike { episode, requests }))
    }

    /// The application's episode, unless it has expired, in which case it is
    /// retired first. Retiring an episode that changed since it was read
    /// fails as a conflict.
    async fn load_active_episode(
        &self,
        application_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<SpikeEpisode>, PersistenceError> {
        match self.store.get_active(application_id).await? {
            Some(episode) if self.reset_policy.is_expired(&episode, now) => {
                tracing::info!(
                    spike_count = episode.spike_count,
                    created_at = %episode.created_at,
                    "Retiring expired spike episode."
                );
                self.store.retire(&episode).await?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    /// Hands notifications to the emitter. Failures are logged only: the
    /// accounts stay marked as notified.
    async fn submit(&self, application_id: i64, requests: Vec<NotificationRequest>) {
        for request in requests {
            let account_id = request.recipient_account_id;
            match self.emitter.send(request).await {
                Ok(()) => {
                    *self.submitted_notifications.entry(application_id).or_insert(0) += 1;
                    tracing::info!(account_id, "Spike notification submitted.");
                }
                Err(e) => {
                    tracing::error!(account_id, error = %e, "Failed to submit spike notification.");
                }
            }
        }
    }

    fn skipped(what: &str, error: SourceError) -> SpikeOutcome {
        tracing::warn!(error = %error, "Skipping event, {} unavailable.", what);
        SpikeOutcome::Skipped { reason: format!("{what}: {error}") }
    }

    /// Gets or creates the lock guarding an application's episode.
    fn get_application_lock(&self, application_id: i64) -> Arc<Mutex<()>> {
        self.application_locks
            .entry(application_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Retires every episode that the reset policy considers expired at
    /// `now`. Returns how many were retired.
    pub async fn retire_expired(&self, now: DateTime<Utc>) -> Result<usize, PersistenceError> {
        let mut retired = 0;
        for episode in self.store.list_active().await? {
            if !self.reset_policy.is_expired(&episode, now) {
                continue;
            }

            let lock = self.get_application_lock(episode.application_id);
            let _guard = lock.lock().await;

            // The episode may have been replaced while we waited for the lock.
            match self.store.get_active(episode.application_id).await? {
                Some(current) if self.reset_policy.is_expired(&current, now) => {
                    match self.store.retire(&current).await {
                        Ok(()) => {
                            tracing::info!(
                                application_id = current.application_id,
                                spike_count = current.spike_count,
                                notified = current.notified_account_ids.len(),
                                "Retired expired spike episode."
                            );
                            retired += 1;
                        }
                        Err(e) if e.is_conflict() => {
                            tracing::debug!(
                                application_id = current.application_id,
                                error = %e,
                                "Expired spike episode changed concurrently, leaving it."
                            );
                        }
                        Err(e) => return Err(e),
                    }
                }
                _ => {}
            }
        }
        Ok(retired)
    }

    /// Periodically retires expired episodes until cancelled.
    pub async fn run_retirement_sweeper(
        &self,
        check_interval: Duration,
        cancellation_token: CancellationToken,
    ) {
        // A zero period would make the interval panic.
        let mut interval = tokio::time::interval(check_interval.max(Duration::from_secs(1)));

        loop {
            tokio::select! {
                _ = cancellation_token.cancelled() => break,
                _ = interval.tick() => {
                    tracing::debug!("Running spike episode retirement check...");
                    if let Err(e) = self.retire_expired(Utc::now()).await {
                        tracing::error!("Error in episode retirement cycle: {}", e);
                    }
                }
            }
        }
        tracing::info!("Episode retirement sweeper stopped.");
    }

    /// Notifications handed to the emitter so far, by application id.
    pub fn get_submitted_notifications(&self) -> &DashMap<i64, usize> {
        &self.submitted_notifications
    }
}
