//! Daily report counters, and the BaselineSource and ReportRecorder built on
//! top of them.

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, Utc};

use crate::{
    persistence::{error::PersistenceError, sqlite::SqliteStateRepository},
    sources::{BaselineSource, ReportRecorder, SourceError},
};

mod report_sql {
    pub const UPSERT_COUNT: &str = "INSERT INTO report_counts (application_id, day, count) VALUES (?, ?, ?) ON CONFLICT (application_id, day) DO UPDATE SET count = count + excluded.count RETURNING count";

    pub const SELECT_COUNT: &str =
        "SELECT count FROM report_counts WHERE application_id = ? AND day = ?";

    pub const SELECT_AVERAGE: &str = "SELECT AVG(count) FROM report_counts WHERE application_id = ? AND day >= ? AND day < ?";
}

fn day_key(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

impl SqliteStateRepository {
    /// Counts `count` new reports for the application on the UTC day of `at`.
    /// Returns the day's new total.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn record_reports(
        &self,
        application_id: i64,
        at: DateTime<Utc>,
        count: u64,
    ) -> Result<u64, PersistenceError> {
        if application_id <= 0 {
            return Err(PersistenceError::InvalidInput(format!(
                "Application id must be positive, got {application_id}"
            )));
        }
        let increment = i64::try_from(count)
            .map_err(|_| PersistenceError::InvalidInput(format!("Report count too large: {count}")))?;

        let total: i64 = self
            .execute_query_with_error_handling(
                "record reports",
                sqlx::query_scalar(report_sql::UPSERT_COUNT)
                    .bind(application_id)
                    .bind(day_key(at.date_naive()))
                    .bind(increment)
                    .fetch_one(&self.pool),
            )
            .await?;

        Ok(total.max(0) as u64)
    }

    /// Counts a single report.
    pub async fn record_report(
        &self,
        application_id: i64,
        at: DateTime<Utc>,
    ) -> Result<u64, PersistenceError> {
        self.record_reports(application_id, at, 1).await
    }

    /// The number of reports recorded for the application on `day`.
    pub async fn count_on(&self, application_id: i64, day: NaiveDate) -> Result<u64, PersistenceError> {
        let count: Option<i64> = self
            .execute_query_with_error_handling(
                "count reports",
                sqlx::query_scalar(report_sql::SELECT_COUNT)
                    .bind(application_id)
                    .bind(day_key(day))
                    .fetch_optional(&self.pool),
            )
            .await?;

        Ok(count.unwrap_or(0).max(0) as u64)
    }

    /// The mean daily count over the configured window of complete days
    /// before `today`. Days without any report are not recorded and do not
    /// take part in the mean; `0.0` means there is no history yet.
    pub async fn average_on(
        &self,
        application_id: i64,
        today: NaiveDate,
    ) -> Result<f64, PersistenceError> {
        let window_start = today
            .checked_sub_days(Days::new(u64::from(self.baseline_window_days)))
            .unwrap_or(NaiveDate::MIN);

        let average: Option<f64> = self
            .execute_query_with_error_handling(
                "average reports",
                sqlx::query_scalar(report_sql::SELECT_AVERAGE)
                    .bind(application_id)
                    .bind(day_key(window_start))
                    .bind(day_key(today))
                    .fetch_one(&self.pool),
            )
            .await?;

        Ok(average.unwrap_or(0.0))
    }
}

#[async_trait]
impl BaselineSource for SqliteStateRepository {
    async fn average_report_count(&self, application_id: i64) -> Result<f64, SourceError> {
        self.average_on(application_id, Utc::now().date_naive())
            .await
            .map_err(|e| SourceError::Unavailable(e.to_string()))
    }

    async fn todays_count(&self, application_id: i64) -> Result<u64, SourceError> {
        self.count_on(application_id, Utc::now().date_naive())
            .await
            .map_err(|e| SourceError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl ReportRecorder for SqliteStateRepository {
    async fn record_report(
        &self,
        application_id: i64,
        at: DateTime<Utc>,
    ) -> Result<u64, SourceError> {
        self.record_reports(application_id, at, 1)
            .await
            .map_err(|e| SourceError::Unavailable(e.to_string()))
    }
}
