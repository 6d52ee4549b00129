//! Push event types and the frame format of the push channel.
//!
//! The server sends one JSON frame per event:
//!
//! ```text
//! {"event":"notification.created","eventId":"0195...","payload":{"id":7,"isRead":false,...}}
//! ```
//!
//! The channel handle peeks at `event` to find listeners before decoding the
//! payload, so frames nobody listens for cost a single parse. Each known event
//! type maps to one [`PushEvent`] variant carrying a strongly typed entry.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{ActivityLogEntry, EntryId, FeedKey, Notification};

/// Event type of a newly created notification.
pub const NOTIFICATION_CREATED: &str = "notification.created";

/// Event type of a newly recorded activity-log entry.
pub const ACTIVITY_LOG_CREATED: &str = "activity_log.created";

/// Raw frame as it travels over the channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushFrame {
    /// Namespaced event type (e.g. `"notification.created"`).
    pub event: String,
    /// Optional server-side event id, only used for log correlation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<Uuid>,
    #[serde(default)]
    pub payload: JsonValue,
}

impl PushFrame {
    /// Parse a text frame.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Build the frame for a typed event.
    pub fn from_event(event: &PushEvent) -> Result<Self> {
        let payload = match event {
            PushEvent::NotificationCreated(n) => serde_json::to_value(n)?,
            PushEvent::ActivityLogCreated(entry) => serde_json::to_value(entry)?,
        };
        Ok(Self {
            event: event.event_type().to_string(),
            event_id: Some(Uuid::now_v7()),
            payload,
        })
    }

    /// Serialize to the wire text form.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A server-originated event, tagged by its event type.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    NotificationCreated(Notification),
    ActivityLogCreated(ActivityLogEntry),
}

impl PushEvent {
    /// Namespaced event type string.
    pub fn event_type(&self) -> &'static str {
        match self {
            PushEvent::NotificationCreated(_) => NOTIFICATION_CREATED,
            PushEvent::ActivityLogCreated(_) => ACTIVITY_LOG_CREATED,
        }
    }

    /// Feed this event belongs to.
    pub fn feed_key(&self) -> FeedKey {
        match self {
            PushEvent::NotificationCreated(_) => FeedKey::Notifications,
            PushEvent::ActivityLogCreated(_) => FeedKey::ActivityLogs,
        }
    }

    /// Id of the carried entry.
    pub fn entry_id(&self) -> EntryId {
        match self {
            PushEvent::NotificationCreated(n) => n.id,
            PushEvent::ActivityLogCreated(entry) => entry.id,
        }
    }
}

impl TryFrom<PushFrame> for PushEvent {
    type Error = Error;

    fn try_from(frame: PushFrame) -> Result<Self> {
        match frame.event.as_str() {
            NOTIFICATION_CREATED => Ok(PushEvent::NotificationCreated(serde_json::from_value(
                frame.payload,
            )?)),
            ACTIVITY_LOG_CREATED => Ok(PushEvent::ActivityLogCreated(serde_json::from_value(
                frame.payload,
            )?)),
            other => Err(Error::UnknownEvent(other.to_string())),
        }
    }
}
