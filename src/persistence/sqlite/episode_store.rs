//! Implementation of the EpisodeStore trait for SqliteStateRepository

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, sqlite::SqliteRow};

use crate::{
    models::SpikeEpisode,
    persistence::{error::PersistenceError, sqlite::SqliteStateRepository, traits::EpisodeStore},
};

/// SQL used by the episode store.
mod episode_sql {
    pub const SELECT_BY_APPLICATION: &str = "SELECT application_id, spike_count, notified_account_ids, created_at, last_triggered_at, version FROM spike_episodes WHERE application_id = ?";

    pub const SELECT_ALL: &str = "SELECT application_id, spike_count, notified_account_ids, created_at, last_triggered_at, version FROM spike_episodes ORDER BY application_id";

    pub const INSERT: &str = "INSERT INTO spike_episodes (application_id, spike_count, notified_account_ids, created_at, last_triggered_at, version) VALUES (?, ?, ?, ?, ?, 0)";

    pub const UPDATE_IF_VERSION: &str = "UPDATE spike_episodes SET spike_count = ?, notified_account_ids = ?, last_triggered_at = ?, version = version + 1 WHERE application_id = ? AND version = ?";

    pub const DELETE_IF_VERSION: &str = "DELETE FROM spike_episodes WHERE application_id = ? AND version = ? AND created_at = ?";
}

fn encode_accounts(accounts: &BTreeSet<i64>) -> Result<String, PersistenceError> {
    serde_json::to_string(accounts).map_err(|e| PersistenceError::SerializationError(e.to_string()))
}

fn episode_from_row(row: &SqliteRow) -> Result<SpikeEpisode, PersistenceError> {
    let read_err = |e: sqlx::Error| PersistenceError::OperationFailed(e.to_string());

    let accounts_json: String = row.try_get("notified_account_ids").map_err(read_err)?;
    let notified_account_ids: BTreeSet<i64> = serde_json::from_str(&accounts_json)
        .map_err(|e| PersistenceError::SerializationError(e.to_string()))?;
    let spike_count: i64 = row.try_get("spike_count").map_err(read_err)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(read_err)?;
    let last_triggered_at: DateTime<Utc> = row.try_get("last_triggered_at").map_err(read_err)?;

    Ok(SpikeEpisode {
        application_id: row.try_get("application_id").map_err(read_err)?,
        spike_count: u32::try_from(spike_count).map_err(|_| {
            PersistenceError::SerializationError(format!("Invalid spike_count: {spike_count}"))
        })?,
        notified_account_ids,
        created_at,
        last_triggered_at,
        version: row.try_get("version").map_err(read_err)?,
    })
}

#[async_trait]
impl EpisodeStore for SqliteStateRepository {
    #[tracing::instrument(skip(self), level = "debug")]
    async fn get_active(
        &self,
        application_id: i64,
    ) -> Result<Option<SpikeEpisode>, PersistenceError> {
        tracing::debug!(application_id, "Querying active spike episode.");
        let row = self
            .execute_query_with_error_handling(
                "get active episode",
                sqlx::query(episode_sql::SELECT_BY_APPLICATION)
                    .bind(application_id)
                    .fetch_optional(&self.pool),
            )
            .await?;

        row.as_ref().map(episode_from_row).transpose()
    }

    #[tracing::instrument(skip(self, episode), fields(application_id = episode.application_id), level = "debug")]
    async fn create(&self, episode: &SpikeEpisode) -> Result<(), PersistenceError> {
        let accounts = encode_accounts(&episode.notified_account_ids)?;

        let result = sqlx::query(episode_sql::INSERT)
            .bind(episode.application_id)
            .bind(i64::from(episode.spike_count))
            .bind(accounts)
            .bind(episode.created_at)
            .bind(episode.last_triggered_at)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => {
                tracing::debug!(
                    notified = episode.notified_account_ids.len(),
                    "Spike episode created."
                );
                Ok(())
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                tracing::debug!("Spike episode already exists.");
                Err(PersistenceError::AlreadyExists(format!(
                    "spike episode for application {}",
                    episode.application_id
                )))
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to create spike episode.");
                Err(PersistenceError::OperationFailed(e.to_string()))
            }
        }
    }

    #[tracing::instrument(skip(self, episode), fields(application_id = episode.application_id, version = episode.version), level = "debug")]
    async fn update(&self, episode: &SpikeEpisode) -> Result<(), PersistenceError> {
        let accounts = encode_accounts(&episode.notified_account_ids)?;

        let result = self
            .execute_query_with_error_handling(
                "update episode",
                sqlx::query(episode_sql::UPDATE_IF_VERSION)
                    .bind(i64::from(episode.spike_count))
                    .bind(accounts)
                    .bind(episode.last_triggered_at)
                    .bind(episode.application_id)
                    .bind(episode.version)
                    .execute(&self.pool),
            )
            .await?;

        if result.rows_affected() == 0 {
            tracing::debug!("Spike episode was retired or changed concurrently.");
            return Err(PersistenceError::NotFound(format!(
                "spike episode for application {} at version {}",
                episode.application_id, episode.version
            )));
        }

        tracing::debug!(spike_count = episode.spike_count, "Spike episode updated.");
        Ok(())
    }

    #[tracing::instrument(skip(self, episode), fields(application_id = episode.application_id, version = episode.version), level = "debug")]
    async fn retire(&self, episode: &SpikeEpisode) -> Result<(), PersistenceError> {
        // Versions restart with every episode, so the creation time tells a
        // replacement apart from the episode that was read.
        let result = self
            .execute_query_with_error_handling(
                "retire episode",
                sqlx::query(episode_sql::DELETE_IF_VERSION)
                    .bind(episode.application_id)
                    .bind(episode.version)
                    .bind(episode.created_at)
                    .execute(&self.pool),
            )
            .await?;

        if result.rows_affected() == 0 {
            tracing::debug!("Spike episode was already retired or changed concurrently.");
            return Err(PersistenceError::NotFound(format!(
                "spike episode for application {} at version {}",
                episode.application_id, episode.version
            )));
        }

        tracing::debug!("Spike episode retired.");
        Ok(())
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn list_active(&self) -> Result<Vec<SpikeEpisode>, PersistenceError> {
        let rows = self
            .execute_query_with_error_handling(
                "list active episodes",
                sqlx::query(episode_sql::SELECT_ALL).fetch_all(&self.pool),
            )
            .await?;

        rows.iter().map(episode_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    async fn setup_test_db() -> SqliteStateRepository {
        let repo = SqliteStateRepository::new("sqlite::memory:")
            .await
            .expect("Failed to connect to in-memory db");
        repo.run_migrations().await.expect("Failed to run migrations");
        repo
    }

    fn episode(application_id: i64) -> SpikeEpisode {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 15, 0).unwrap();
        let mut episode = SpikeEpisode::new(application_id, now);
        episode.add_notified_account(10);
        episode.add_notified_account(20);
        episode
    }

    #[tokio::test]
    async fn test_create_and_get_active() {
        let repo = setup_test_db().await;

        assert!(repo.get_active(1).await.unwrap().is_none());

        let original = episode(1);
        repo.create(&original).await.unwrap();

        let stored = repo.get_active(1).await.unwrap().unwrap();
        assert_eq!(stored, original);
    }

    #[tokio::test]
    async fn test_create_twice_fails_with_already_exists() {
        let repo = setup_test_db().await;
        repo.create(&episode(1)).await.unwrap();

        let result = repo.create(&episode(1)).await;
        assert!(matches!(result, Err(PersistenceError::AlreadyExists(_))));

        // Other applications are unaffected.
        repo.create(&episode(2)).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_bumps_version() {
        let repo = setup_test_db().await;
        repo.create(&episode(1)).await.unwrap();

        let mut loaded = repo.get_active(1).await.unwrap().unwrap();
        let later = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        loaded.increase_spike_count(later);
        loaded.add_notified_account(30);
        repo.update(&loaded).await.unwrap();

        let stored = repo.get_active(1).await.unwrap().unwrap();
        assert_eq!(stored.spike_count, 2);
        assert_eq!(stored.version, 1);
        assert_eq!(stored.last_triggered_at, later);
        assert_eq!(stored.notified_account_ids, BTreeSet::from([10, 20, 30]));
    }

    #[tokio::test]
    async fn test_update_with_stale_version_fails() {
        let repo = setup_test_db().await;
        repo.create(&episode(1)).await.unwrap();

        let first = repo.get_active(1).await.unwrap().unwrap();
        let mut second = first.clone();

        repo.update(&first).await.unwrap();

        second.add_notified_account(99);
        let result = repo.update(&second).await;
        assert!(matches!(result, Err(PersistenceError::NotFound(_))));

        let stored = repo.get_active(1).await.unwrap().unwrap();
        assert!(!stored.has_account(99));
    }

    #[tokio::test]
    async fn test_update_after_retire_fails() {
        let repo = setup_test_db().await;
        repo.create(&episode(1)).await.unwrap();
        let loaded = repo.get_active(1).await.unwrap().unwrap();

        repo.retire(&loaded).await.unwrap();
        assert!(matches!(repo.retire(&loaded).await, Err(PersistenceError::NotFound(_))));

        let result = repo.update(&loaded).await;
        assert!(matches!(result, Err(PersistenceError::NotFound(_))));
        assert!(repo.get_active(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_retire_allows_a_new_episode() {
        let repo = setup_test_db().await;
        repo.create(&episode(1)).await.unwrap();
        let loaded = repo.get_active(1).await.unwrap().unwrap();
        repo.retire(&loaded).await.unwrap();

        let fresh = SpikeEpisode::new(1, Utc::now());
        repo.create(&fresh).await.unwrap();

        let stored = repo.get_active(1).await.unwrap().unwrap();
        assert_eq!(stored.spike_count, 1);
        assert!(stored.notified_account_ids.is_empty());
    }

    #[tokio::test]
    async fn test_retire_with_stale_version_fails() {
        let repo = setup_test_db().await;
        repo.create(&episode(1)).await.unwrap();

        let stale = repo.get_active(1).await.unwrap().unwrap();
        let mut current = stale.clone();
        current.add_notified_account(30);
        repo.update(&current).await.unwrap();

        let result = repo.retire(&stale).await;
        assert!(matches!(result, Err(PersistenceError::NotFound(_))));
        assert!(repo.get_active(1).await.unwrap().unwrap().has_account(30));
    }

    #[tokio::test]
    async fn test_retire_does_not_touch_a_replacement_episode() {
        let repo = setup_test_db().await;
        repo.create(&episode(1)).await.unwrap();
        let old = repo.get_active(1).await.unwrap().unwrap();

        // Someone else retires the episode and starts a new one. Both are at
        // version 0.
        repo.retire(&old).await.unwrap();
        let later = Utc.with_ymd_and_hms(2024, 3, 2, 8, 0, 0).unwrap();
        let mut replacement = SpikeEpisode::new(1, later);
        replacement.add_notified_account(10);
        repo.create(&replacement).await.unwrap();

        let result = repo.retire(&old).await;
        assert!(matches!(result, Err(PersistenceError::NotFound(_))));
        assert_eq!(repo.get_active(1).await.unwrap().unwrap().created_at, later);
    }

    #[tokio::test]
    async fn test_list_active() {
        let repo = setup_test_db().await;
        repo.create(&episode(3)).await.unwrap();
        repo.create(&episode(1)).await.unwrap();

        let all = repo.list_active().await.unwrap();
        let ids: Vec<i64> = all.iter().map(|e| e.application_id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_corrupt_account_list_is_reported() {
        let repo = setup_test_db().await;
        repo.create(&episode(1)).await.unwrap();
        sqlx::query("UPDATE spike_episodes SET notified_account_ids = 'not json'")
            .execute(repo.pool())
            .await
            .unwrap();

        let result = repo.get_active(1).await;
        assert!(matches!(result, Err(PersistenceError::SerializationError(_))));
    }
}
