//! Storage contracts for the spike engine.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::{models::SpikeEpisode, persistence::error::PersistenceError};

/// Persists at most one active spike episode per application.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EpisodeStore: Send + Sync {
    /// Retrieves the active episode of an application, if any.
    async fn get_active(
        &self,
        application_id: i64,
    ) -> Result<Option<SpikeEpisode>, PersistenceError>;

    /// Inserts a new episode.
    ///
    /// Fails with [`PersistenceError::AlreadyExists`] if the application
    /// already has an active episode.
    async fn create(&self, episode: &SpikeEpisode) -> Result<(), PersistenceError>;

    /// Replaces a previously loaded episode.
    ///
    /// Fails with [`PersistenceError::NotFound`] if the episode was retired
    /// or modified by someone else since `episode.version` was read.
    async fn update(&self, episode: &SpikeEpisode) -> Result<(), PersistenceError>;

    /// Retires a previously loaded episode.
    ///
    /// Fails with [`PersistenceError::NotFound`] if the episode was retired,
    /// replaced or modified by someone else since it was read.
    async fn retire(&self, episode: &SpikeEpisode) -> Result<(), PersistenceError>;

    /// Lists every active episode.
    async fn list_active(&self) -> Result<Vec<SpikeEpisode>, PersistenceError>;
}
