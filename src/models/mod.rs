//! This module contains the data models for the spike detection engine.

pub mod decision;
pub mod episode;
pub mod event;
pub mod notification;
pub mod preference;

pub use decision::SpikeDecision;
pub use episode::SpikeEpisode;
pub use event::{ApplicationEvent, EventError, ReportAddedToIncident};
pub use notification::NotificationRequest;
pub use preference::{ApplicationPreferences, NotificationSetting, NotificationState};
