//! Notification preferences as seen by the spike engine.

use serde::{Deserialize, Serialize};

/// Whether an account wants application spike notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationState {
    /// The account never made a choice.
    #[default]
    Unset,
    /// The account opted in.
    Enabled,
    /// The account opted out.
    Disabled,
}

impl NotificationState {
    /// Only an explicit opt-in makes an account eligible.
    pub fn is_enabled(self) -> bool {
        matches!(self, NotificationState::Enabled)
    }
}

/// The spike preference of one account for one application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSetting {
    /// The subscribed account.
    pub account_id: i64,
    /// The account's spike notification state.
    #[serde(default)]
    pub application_spike: NotificationState,
}

impl NotificationSetting {
    /// Creates a new setting.
    pub fn new(account_id: i64, application_spike: NotificationState) -> Self {
        Self { account_id, application_spike }
    }
}

/// All spike preferences of one application, as listed in the preferences
/// file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationPreferences {
    /// The application these settings apply to.
    pub application_id: i64,
    /// Per-account settings.
    #[serde(default)]
    pub settings: Vec<NotificationSetting>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_enabled_is_eligible() {
        assert!(NotificationState::Enabled.is_enabled());
        assert!(!NotificationState::Disabled.is_enabled());
        assert!(!NotificationState::Unset.is_enabled());
    }

    #[test]
    fn test_missing_state_defaults_to_unset() {
        let setting: NotificationSetting = serde_json::from_str(r#"{"account_id": 4}"#).unwrap();
        assert_eq!(setting.application_spike, NotificationState::Unset);
    }
}
