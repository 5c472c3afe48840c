//! Notification events pushed to live channels.
//!
//! Events flow **server → client** only. Each variant has a fixed JSON
//! shape, tagged by the `event` field:
//!
//! ```json
//! {"event": "new_message", "message": {"id": 1, "title": "Hi", ...}}
//! {"event": "unread_count_updated", "unread_count": 0}
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{CoreError, CoreResult};
use crate::store::Message;

/// Summary of a freshly delivered message, as seen by its recipient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageNotice {
    pub id: i64,
    pub sender_id: i64,
    pub sender_username: String,
    pub title: String,
    pub timestamp: DateTime<Utc>,
    /// Recipient's unread count, including this message.
    pub unread_count: u64,
}

impl MessageNotice {
    pub fn from_message(message: &Message, sender_username: &str, unread_count: u64) -> Self {
        Self {
            id: message.id,
            sender_id: message.sender_id,
            sender_username: sender_username.to_string(),
            title: message.title.clone(),
            timestamp: message.timestamp,
            unread_count,
        }
    }
}

/// A notification the dispatcher fans out to a user's live channels.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NotificationEvent {
    /// Someone sent the user a message.
    NewMessage { message: MessageNotice },
    /// The user's unread count changed (e.g. after marking a message read).
    UnreadCountUpdated { unread_count: u64 },
}

impl NotificationEvent {
    /// Wire name of the event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            NotificationEvent::NewMessage { .. } => "new_message",
            NotificationEvent::UnreadCountUpdated { .. } => "unread_count_updated",
        }
    }

    /// Serializes the event to its JSON wire form.
    pub fn to_json(&self) -> CoreResult<String> {
        serde_json::to_string(self)
            .map_err(|e| CoreError::DispatchFailure(format!("failed to serialize event: {e}")))
    }
}
