//! Data models for outbound notifications.

use serde::{Deserialize, Serialize};

/// A composed notification addressed to a single account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
    /// The account that should receive the message.
    pub recipient_account_id: i64,
    /// The subject line of the message.
    pub subject: String,
    /// The body of the message.
    pub body: String,
}
