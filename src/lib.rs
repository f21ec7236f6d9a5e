#![warn(missing_docs)]
//! Spikeguard watches the volume of error reports per application and
//! notifies subscribed accounts once per spike episode when the volume
//! jumps above the application's usual daily level.

pub mod config;
pub mod context;
pub mod engine;
pub mod events;
pub mod models;
pub mod notification;
pub mod persistence;
pub mod sources;
pub mod supervisor;
pub mod test_helpers;
