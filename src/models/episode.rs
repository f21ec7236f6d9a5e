//! The persisted spike episode entity.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The active spike of one application and the accounts already told about
/// it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpikeEpisode {
    /// The monitored application. Immutable after creation.
    pub application_id: i64,

    /// How many confirmed spike evaluations this episode has absorbed.
    pub spike_count: u32,

    /// Accounts that have already received a spike notification for this
    /// episode.
    pub notified_account_ids: BTreeSet<i64>,

    /// When the episode was first confirmed.
    pub created_at: DateTime<Utc>,

    /// When the episode was last confirmed.
    pub last_triggered_at: DateTime<Utc>,

    /// Optimistic concurrency token, bumped by every successful update.
    #[serde(default)]
    pub version: i64,
}

impl SpikeEpisode {
    /// Starts a new episode for the given application with a count of one.
    pub fn new(application_id: i64, now: DateTime<Utc>) -> Self {
        Self {
            application_id,
            spike_count: 1,
            notified_account_ids: BTreeSet::new(),
            created_at: now,
            last_triggered_at: now,
            version: 0,
        }
    }

    /// Records another confirmed spike for this episode.
    pub fn increase_spike_count(&mut self, now: DateTime<Utc>) {
        self.spike_count = self.spike_count.saturating_add(1);
        self.last_triggered_at = now;
    }

    /// Returns `true` if the account was already notified for this episode.
    pub fn has_account(&self, account_id: i64) -> bool {
        self.notified_account_ids.contains(&account_id)
    }

    /// Marks an account as notified. Returns `false` if it was already
    /// present.
    pub fn add_notified_account(&mut self, account_id: i64) -> bool {
        self.notified_account_ids.insert(account_id)
    }
}
