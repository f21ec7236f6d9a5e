use chrono::{DateTime, Utc};

use crate::models::SpikeEpisode;

/// A builder for creating `SpikeEpisode` instances for testing.
pub struct EpisodeBuilder {
    episode: SpikeEpisode,
}

impl EpisodeBuilder {
    /// Creates a new builder for a fresh episode of `application_id`.
    pub fn new(application_id: i64) -> Self {
        Self { episode: SpikeEpisode::new(application_id, Utc::now()) }
    }

    /// Sets the creation time, which is also the last trigger time.
    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.episode.created_at = at;
        self.episode.last_triggered_at = at;
        self
    }

    /// Sets the last trigger time.
    pub fn last_triggered_at(mut self, at: DateTime<Utc>) -> Self {
        self.episode.last_triggered_at = at;
        self
    }

    /// Sets the spike count.
    pub fn spike_count(mut self, count: u32) -> Self {
        self.episode.spike_count = count;
        self
    }

    /// Marks the accounts as notified.
    pub fn notified(mut self, account_ids: &[i64]) -> Self {
        self.episode.notified_account_ids.extend(account_ids.iter().copied());
        self
    }

    /// Sets the stored version.
    pub fn version(mut self, version: i64) -> Self {
        self.episode.version = version;
        self
    }

    /// Builds the episode.
    pub fn build(self) -> SpikeEpisode {
        self.episode
    }
}
