use std::{collections::HashMap, path::PathBuf};

use async_trait::async_trait;

use crate::{
    config::{ConfigLoader, LoaderError},
    models::{ApplicationPreferences, NotificationSetting},
    sources::traits::{PreferenceLookup, SourceError},
};

/// Preferences loaded once at startup and kept in memory.
#[derive(Debug, Default, Clone)]
pub struct StaticPreferenceLookup {
    by_application: HashMap<i64, Vec<NotificationSetting>>,
}

impl StaticPreferenceLookup {
    /// Builds the lookup from a list of per-application preferences.
    /// Entries for the same application are merged.
    pub fn new(applications: Vec<ApplicationPreferences>) -> Self {
        let mut by_application: HashMap<i64, Vec<NotificationSetting>> = HashMap::new();
        for application in applications {
            by_application.entry(application.application_id).or_default().extend(application.settings);
        }
        Self { by_application }
    }

    /// Loads the `applications` list of a preferences YAML file.
    pub fn from_file(path: PathBuf) -> Result<Self, LoaderError> {
        let applications: Vec<ApplicationPreferences> = ConfigLoader::new(path).load("applications")?;
        tracing::debug!(applications = applications.len(), "Loaded notification preferences.");
        Ok(Self::new(applications))
    }

    /// Number of applications with at least one entry.
    pub fn len(&self) -> usize {
        self.by_application.len()
    }

    /// Whether no preferences were loaded.
    pub fn is_empty(&self) -> bool {
        self.by_application.is_empty()
    }
}

#[async_trait]
impl PreferenceLookup for StaticPreferenceLookup {
    async fn get_all(&self, application_id: i64) -> Result<Vec<NotificationSetting>, SourceError> {
        if application_id <= 0 {
            return Err(SourceError::InvalidInput(format!(
                "application id must be positive, got {application_id}"
            )));
        }
        Ok(self.by_application.get(&application_id).cloned().unwrap_or_default())
    }
}
