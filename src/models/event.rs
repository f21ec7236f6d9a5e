//! Inbound application events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raised by the incident pipeline whenever a new error report has been
/// attached to an incident.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportAddedToIncident {
    /// The incident that received the report.
    pub incident_id: i64,
    /// The application the incident belongs to.
    pub application_id: i64,
    /// Display name of the application, used in message text.
    pub application_name: String,
    /// When the report was received.
    pub report_timestamp: DateTime<Utc>,
}

/// Errors produced while decoding or validating an inbound event.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventError {
    /// The payload could not be decoded.
    #[error("Malformed event payload: {0}")]
    Malformed(String),

    /// The event was decoded but carries invalid values.
    #[error("Invalid event: {0}")]
    Invalid(String),
}

impl ReportAddedToIncident {
    /// Checks the fields the spike engine relies on.
    pub fn validate(&self) -> Result<(), EventError> {
        if self.application_id <= 0 {
            return Err(EventError::Invalid(format!(
                "application_id must be positive, got {}",
                self.application_id
            )));
        }
        if self.application_name.trim().is_empty() {
            return Err(EventError::Invalid(format!(
                "application_name is empty for application {}",
                self.application_id
            )));
        }
        Ok(())
    }
}

/// Envelope for every event the dispatcher knows how to route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApplicationEvent {
    /// A report was added to an incident.
    ReportAddedToIncident(ReportAddedToIncident),
}

impl ApplicationEvent {
    /// Decodes an event from its JSON representation.
    pub fn from_json(payload: &str) -> Result<Self, EventError> {
        serde_json::from_str(payload).map_err(|e| EventError::Malformed(e.to_string()))
    }

    /// The application the event concerns.
    pub fn application_id(&self) -> i64 {
        match self {
            ApplicationEvent::ReportAddedToIncident(e) => e.application_id,
        }
    }
}
