use chrono::{DateTime, Utc};

use crate::models::{ApplicationEvent, ReportAddedToIncident};

/// A builder for creating `ReportAddedToIncident` instances for testing.
pub struct EventBuilder {
    event: ReportAddedToIncident,
}

impl EventBuilder {
    /// Creates a new builder for an event of `application_id`.
    pub fn new(application_id: i64) -> Self {
        Self {
            event: ReportAddedToIncident {
                incident_id: 1,
                application_id,
                application_name: format!("Application {application_id}"),
                report_timestamp: Utc::now(),
            },
        }
    }

    /// Sets the incident id.
    pub fn incident_id(mut self, incident_id: i64) -> Self {
        self.event.incident_id = incident_id;
        self
    }

    /// Sets the application name.
    pub fn application_name(mut self, name: &str) -> Self {
        self.event.application_name = name.to_string();
        self
    }

    /// Sets the report timestamp.
    pub fn report_timestamp(mut self, at: DateTime<Utc>) -> Self {
        self.event.report_timestamp = at;
        self
    }

    /// Builds the event.
    pub fn build(self) -> ReportAddedToIncident {
        self.event
    }

    /// Builds the event wrapped in its envelope.
    pub fn build_envelope(self) -> ApplicationEvent {
        ApplicationEvent::ReportAddedToIncident(self.event)
    }

    /// Builds the event as one line of newline-delimited JSON.
    pub fn build_json_line(self) -> String {
        let mut line = serde_json::to_string(&self.build_envelope()).unwrap();
        line.push('\n');
        line
    }
}
