//! Spike detection and episode bookkeeping.

pub mod reset_policy;
pub mod spike_controller;
pub mod threshold;

pub use reset_policy::EpisodeResetPolicy;
pub use spike_controller::{SpikeController, SpikeControllerError, SpikeOutcome};
pub use threshold::ThresholdEvaluator;
