//! Classifies today's report count against the historical baseline.

use std::sync::Arc;

use crate::{
    models::SpikeDecision,
    sources::{BaselineSource, SourceError},
};

/// Averages above this value are used as the threshold as-is; lower
/// averages are doubled.
pub const HIGH_TRAFFIC_AVERAGE: f64 = 20.0;

/// The report count at which `average` becomes a spike, or `None` when there
/// is no usable baseline.
pub fn threshold_for(average: f64) -> Option<f64> {
    if !average.is_finite() || average <= 0.0 {
        return None;
    }
    Some(if average > HIGH_TRAFFIC_AVERAGE { average } else { average * 2.0 })
}

/// Decides whether `today` reports constitute a spike given the daily
/// `average`.
pub fn evaluate(today: u64, average: f64) -> Option<SpikeDecision> {
    let threshold = threshold_for(average)?;
    if (today as f64) < threshold {
        return None;
    }
    Some(SpikeDecision { spike_count: today, day_average: average })
}

/// Fetches the baseline of an application and evaluates it.
pub struct ThresholdEvaluator {
    baseline: Arc<dyn BaselineSource>,
}

impl ThresholdEvaluator {
    /// Creates a new evaluator reading from `baseline`.
    pub fn new(baseline: Arc<dyn BaselineSource>) -> Self {
        Self { baseline }
    }

    /// Evaluates the application's current report volume.
    ///
    /// Today's count is not fetched when the application has no baseline
    /// yet.
    pub async fn evaluate(&self, application_id: i64) -> Result<Option<SpikeDecision>, SourceError> {
        let average = self.baseline.average_report_count(application_id).await?;
        if threshold_for(average).is_none() {
            tracing::debug!(application_id, average, "No baseline yet, skipping spike check.");
            return Ok(None);
        }

        let today = self.baseline.todays_count(application_id).await?;
        let decision = evaluate(today, average);
        tracing::debug!(application_id, today, average, spike = decision.is_some(), "Evaluated report volume.");
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::MockBaselineSource;

    #[test]
    fn test_cold_start_never_spikes() {
        for today in [0, 1, 20, 1_000_000] {
            assert_eq!(evaluate(today, 0.0), None);
        }
    }

    #[test]
    fn test_invalid_average_never_spikes() {
        assert_eq!(evaluate(100, -3.0), None);
        assert_eq!(evaluate(100, f64::NAN), None);
        assert_eq!(evaluate(100, f64::INFINITY), None);
    }

    #[test]
    fn test_low_baseline_doubles_threshold() {
        assert_eq!(threshold_for(10.0), Some(20.0));
        assert_eq!(evaluate(19, 10.0), None);
        assert_eq!(evaluate(20, 10.0), Some(SpikeDecision { spike_count: 20, day_average: 10.0 }));
    }

    #[test]
    fn test_average_of_exactly_twenty_is_still_doubled() {
        assert_eq!(threshold_for(20.0), Some(40.0));
        assert_eq!(evaluate(39, 20.0), None);
        assert!(evaluate(40, 20.0).is_some());
    }

    #[test]
    fn test_high_baseline_uses_average() {
        assert_eq!(threshold_for(25.0), Some(25.0));
        assert_eq!(evaluate(24, 25.0), None);
        assert_eq!(evaluate(25, 25.0), Some(SpikeDecision { spike_count: 25, day_average: 25.0 }));
    }

    #[test]
    fn test_fractional_average() {
        // 2.5 * 2 = 5
        assert_eq!(evaluate(4, 2.5), None);
        assert!(evaluate(5, 2.5).is_some());
    }

    #[tokio::test]
    async fn test_evaluator_skips_todays_count_without_baseline() {
        let mut baseline = MockBaselineSource::new();
        baseline.expect_average_report_count().returning(|_| Ok(0.0));
        baseline.expect_todays_count().never();

        let evaluator = ThresholdEvaluator::new(Arc::new(baseline));
        assert_eq!(evaluator.evaluate(1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_evaluator_returns_decision() {
        let mut baseline = MockBaselineSource::new();
        baseline.expect_average_report_count().withf(|id| *id == 3).returning(|_| Ok(10.0));
        baseline.expect_todays_count().withf(|id| *id == 3).returning(|_| Ok(31));

        let evaluator = ThresholdEvaluator::new(Arc::new(baseline));
        let decision = evaluator.evaluate(3).await.unwrap();
        assert_eq!(decision, Some(SpikeDecision { spike_count: 31, day_average: 10.0 }));
    }

    #[tokio::test]
    async fn test_evaluator_propagates_unavailable() {
        let mut baseline = MockBaselineSource::new();
        baseline.expect_average_report_count().returning(|_| Ok(10.0));
        baseline
            .expect_todays_count()
            .returning(|_| Err(SourceError::Unavailable("counter offline".to_string())));

        let evaluator = ThresholdEvaluator::new(Arc::new(baseline));
        assert!(matches!(evaluator.evaluate(3).await, Err(SourceError::Unavailable(_))));
    }
}
