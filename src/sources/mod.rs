//! Collaborators consulted by the spike engine: the report baseline, the
//! report counter feeding it and the subscribers' notification preferences.

mod preferences;
mod traits;

pub use preferences::StaticPreferenceLookup;
#[cfg(test)]
pub use traits::{MockBaselineSource, MockPreferenceLookup, MockReportRecorder};
pub use traits::{BaselineSource, PreferenceLookup, ReportRecorder, SourceError};
