use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    models::SpikeEpisode,
    persistence::{error::PersistenceError, traits::EpisodeStore},
};

/// An `EpisodeStore` kept in memory, with the same versioning rules as the
/// SQLite store.
#[derive(Debug, Default)]
pub struct InMemoryEpisodeStore {
    episodes: Mutex<BTreeMap<i64, SpikeEpisode>>,
}

impl InMemoryEpisodeStore {
    /// Creates a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `episode` as-is, replacing any existing one.
    pub async fn insert(&self, episode: SpikeEpisode) {
        self.episodes.lock().await.insert(episode.application_id, episode);
    }
}

#[async_trait]
impl EpisodeStore for InMemoryEpisodeStore {
    async fn get_active(&self, application_id: i64) -> Result<Option<SpikeEpisode>, PersistenceError> {
        Ok(self.episodes.lock().await.get(&application_id).cloned())
    }

    async fn create(&self, episode: &SpikeEpisode) -> Result<(), PersistenceError> {
        let mut episodes = self.episodes.lock().await;
        if episodes.contains_key(&episode.application_id) {
            return Err(PersistenceError::AlreadyExists(format!(
                "Spike episode for application {}",
                episode.application_id
            )));
        }
        let mut stored = episode.clone();
        stored.version = 0;
        episodes.insert(stored.application_id, stored);
        Ok(())
    }

    async fn update(&self, episode: &SpikeEpisode) -> Result<(), PersistenceError> {
        let mut episodes = self.episodes.lock().await;
        match episodes.get_mut(&episode.application_id) {
            Some(stored) if stored.version == episode.version => {
                *stored = episode.clone();
                stored.version += 1;
                Ok(())
            }
            _ => Err(PersistenceError::NotFound(format!(
                "Spike episode for application {} at version {}",
                episode.application_id, episode.version
            ))),
        }
    }

    async fn retire(&self, episode: &SpikeEpisode) -> Result<(), PersistenceError> {
        let mut episodes = self.episodes.lock().await;
        match episodes.get(&episode.application_id) {
            Some(stored)
                if stored.version == episode.version && stored.created_at == episode.created_at =>
            {
                episodes.remove(&episode.application_id);
                Ok(())
            }
            _ => Err(PersistenceError::NotFound(format!(
                "Spike episode for application {} at version {}",
                episode.application_id, episode.version
            ))),
        }
    }

    async fn list_active(&self) -> Result<Vec<SpikeEpisode>, PersistenceError> {
        Ok(self.episodes.lock().await.values().cloned().collect())
    }
}
