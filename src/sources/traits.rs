//! Read-side seams the spike controller depends on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

use crate::models::NotificationSetting;

/// Errors returned by the baseline and preference sources.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The source could not be reached. The event may succeed on redelivery.
    #[error("Source unavailable: {0}")]
    Unavailable(String),

    /// The source rejected the request.
    #[error("Invalid source request: {0}")]
    InvalidInput(String),
}

/// Supplies the historical baseline and today's running count of reports.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BaselineSource: Send + Sync {
    /// The average number of reports per day for the application.
    async fn average_report_count(&self, application_id: i64) -> Result<f64, SourceError>;

    /// The number of reports received today for the application.
    async fn todays_count(&self, application_id: i64) -> Result<u64, SourceError>;
}

/// Looks up which accounts want spike notifications for an application.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PreferenceLookup: Send + Sync {
    /// Returns every account setting recorded for the application.
    async fn get_all(&self, application_id: i64) -> Result<Vec<NotificationSetting>, SourceError>;
}

/// Counts incoming reports so the baseline source can see them.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ReportRecorder: Send + Sync {
    /// Counts one report received at `at`, returning the day's new total.
    async fn record_report(
        &self,
        application_id: i64,
        at: DateTime<Utc>,
    ) -> Result<u64, SourceError>;
}
