//! # Events
//!
//! Inbound events reach the spike engine through a single typed path: an
//! event source decodes `ApplicationEvent`s and sends them over a channel,
//! and the `EventDispatcher` hands each one to the handler bound to its
//! variant as an independent task.
//!
//! - **`read_json_lines`** turns newline-delimited JSON into events.
//! - **`EventDispatcher`** runs a bounded number of handlers concurrently;
//!   an event that fails never affects the others.
//! - **`ReportAddedHandler`** is implemented by the `SpikeController`, and
//!   by `CountingHandler`, which counts the report before passing it on.

mod dispatcher;
mod error;
mod handler;
mod reader;

pub use dispatcher::{DispatchSummary, EventDispatcher};
pub use error::DispatchError;
#[cfg(test)]
pub use handler::MockReportAddedHandler;
pub use handler::{CountingHandler, ReportAddedHandler};
pub use reader::read_json_lines;
