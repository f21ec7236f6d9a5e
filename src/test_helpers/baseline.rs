use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::sources::{BaselineSource, SourceError};

/// A baseline with a fixed average and an adjustable count for today, shared
/// by every application.
#[derive(Debug)]
pub struct FixedBaseline {
    average: f64,
    today: AtomicU64,
}

impl FixedBaseline {
    /// Creates a new baseline.
    pub fn new(average: f64, today: u64) -> Self {
        Self { average, today: AtomicU64::new(today) }
    }

    /// Changes today's count.
    pub fn set_today(&self, today: u64) {
        self.today.store(today, Ordering::SeqCst);
    }
}

#[async_trait]
impl BaselineSource for FixedBaseline {
    async fn average_report_count(&self, _application_id: i64) -> Result<f64, SourceError> {
        Ok(self.average)
    }

    async fn todays_count(&self, _application_id: i64) -> Result<u64, SourceError> {
        Ok(self.today.load(Ordering::SeqCst))
    }
}
