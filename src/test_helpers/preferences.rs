use crate::{
    models::{ApplicationPreferences, NotificationSetting, NotificationState},
    sources::StaticPreferenceLookup,
};

/// Creates a lookup holding the given `(account_id, state)` settings for one
/// application.
pub fn create_test_preferences(
    application_id: i64,
    settings: &[(i64, NotificationState)],
) -> StaticPreferenceLookup {
    StaticPreferenceLookup::new(vec![ApplicationPreferences {
        application_id,
        settings: settings
            .iter()
            .map(|&(account_id, state)| NotificationSetting::new(account_id, state))
            .collect(),
    }])
}
