//! A set of helpers for testing

mod baseline;
mod emitter;
mod episode;
mod event;
mod preferences;
mod store;

pub use baseline::FixedBaseline;
pub use emitter::RecordingEmitter;
pub use episode::EpisodeBuilder;
pub use event::EventBuilder;
pub use preferences::create_test_preferences;
pub use store::InMemoryEpisodeStore;
