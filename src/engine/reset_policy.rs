//! Decides when an active spike episode is over.

use std::time::Duration;

use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    config::{deserialize_duration_from_seconds, serialize_duration_to_seconds},
    models::SpikeEpisode,
};

/// Lifetime rule for spike episodes.
///
/// Once an episode is expired it is retired, and the next confirmed spike for
/// the application starts a fresh episode that may notify every subscriber
/// again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EpisodeResetPolicy {
    /// The episode ends when the calendar day it started on ends.
    CalendarDay {
        /// Offset from UTC of the day boundary, in minutes.
        #[serde(default, deserialize_with = "deserialize_utc_offset_minutes")]
        utc_offset_minutes: i32,
    },
    /// The episode ends after a period without confirmed spikes.
    Inactivity {
        /// How long the episode may stay quiet.
        #[serde(
            deserialize_with = "deserialize_duration_from_seconds",
            serialize_with = "serialize_duration_to_seconds"
        )]
        idle_secs: Duration,
    },
    /// Episodes are never retired automatically.
    Never,
}

/// Offsets must stay strictly within a day.
const MAX_UTC_OFFSET_MINUTES: u32 = 24 * 60 - 1;

fn deserialize_utc_offset_minutes<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    let minutes = i32::deserialize(deserializer)?;
    if minutes.unsigned_abs() > MAX_UTC_OFFSET_MINUTES {
        return Err(serde::de::Error::custom(format!(
            "utc_offset_minutes must be within ±{MAX_UTC_OFFSET_MINUTES}, got {minutes}"
        )));
    }
    Ok(minutes)
}

impl Default for EpisodeResetPolicy {
    fn default() -> Self {
        EpisodeResetPolicy::CalendarDay { utc_offset_minutes: 0 }
    }
}

impl EpisodeResetPolicy {
    /// Returns `true` if `episode` should be retired at `now`.
    pub fn is_expired(&self, episode: &SpikeEpisode, now: DateTime<Utc>) -> bool {
        match self {
            EpisodeResetPolicy::CalendarDay { utc_offset_minutes } => {
                let offset = FixedOffset::east_opt(utc_offset_minutes.saturating_mul(60))
                    .unwrap_or_else(|| Utc.fix());
                now.with_timezone(&offset).date_naive()
                    > episode.created_at.with_timezone(&offset).date_naive()
            }
            EpisodeResetPolicy::Inactivity { idle_secs } => {
                match chrono::Duration::from_std(*idle_secs) {
                    Ok(idle) => now - episode.last_triggered_at >= idle,
                    // An idle period too large to represent never elapses.
                    Err(_) => false,
                }
            }
            EpisodeResetPolicy::Never => false,
        }
    }
}
