//! The outcome of a positive threshold evaluation.

use serde::{Deserialize, Serialize};

/// A confirmed spike for a single application.
///
/// Produced by the threshold evaluator and consumed immediately by the
/// episode controller. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpikeDecision {
    /// Number of reports received so far today.
    pub spike_count: u64,
    /// The historical daily average the count was compared against.
    pub day_average: f64,
}
