//! Error types for the event intake.

use thiserror::Error;

/// Errors that stop an event source.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The event input could not be read.
    #[error("Failed to read events: {0}")]
    Io(#[from] std::io::Error),

    /// The dispatcher stopped accepting events.
    #[error("Event channel closed")]
    ChannelClosed,
}
