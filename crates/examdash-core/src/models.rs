//! Core data models for examdash feeds.
//!
//! A feed holds one of two interchangeable entry shapes, [`Notification`] and
//! [`ActivityLogEntry`]. The synchronization core only cares about the
//! [`FeedEntry`] surface (id, read flag, creation time); everything else is
//! payload for the UI.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::events::PushEvent;

/// Server-assigned entry id, unique within its feed.
pub type EntryId = i64;

// =============================================================================
// FEED IDENTITY
// =============================================================================

/// Which feed an entry, listener or store belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedKey {
    Notifications,
    ActivityLogs,
}

impl FeedKey {
    /// All feeds, in mount order.
    pub const ALL: [FeedKey; 2] = [FeedKey::Notifications, FeedKey::ActivityLogs];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Notifications => "notifications",
            Self::ActivityLogs => "activity_logs",
        }
    }

    /// Push event type that feeds this key.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Notifications => crate::events::NOTIFICATION_CREATED,
            Self::ActivityLogs => crate::events::ACTIVITY_LOG_CREATED,
        }
    }
}

impl std::fmt::Display for FeedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Load status of a feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedStatus {
    #[default]
    Idle,
    Loading,
    Error,
}

impl std::fmt::Display for FeedStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Loading => write!(f, "loading"),
            Self::Error => write!(f, "error"),
        }
    }
}

// =============================================================================
// ENTRY TRAIT
// =============================================================================

/// The surface of an entry that the list synchronizer depends on.
///
/// `id` and `created_at` are immutable once the server assigns them. Only
/// `set_read` mutates an entry, and only the feed operations call it.
pub trait FeedEntry: Clone + Send + Sync + 'static {
    /// Feed this entry shape belongs to.
    const FEED: FeedKey;

    fn id(&self) -> EntryId;
    fn is_read(&self) -> bool;
    fn set_read(&mut self, read: bool);
    fn created_at(&self) -> DateTime<Utc>;

    /// Short line for toasts and list rows.
    fn headline(&self) -> String;

    /// Longer description for toasts and detail panes.
    fn detail(&self) -> String;

    /// Extract this entry shape from a push event, if the event carries one.
    fn from_event(event: &PushEvent) -> Option<Self>;

    /// Whether the entry is recent enough to carry a "new" badge.
    fn is_new(&self, now: DateTime<Utc>, window: Duration) -> bool {
        let age = now - self.created_at();
        age >= Duration::zero() && age < window
    }
}

/// Default age below which an entry counts as new.
pub fn new_entry_window() -> Duration {
    Duration::seconds(crate::defaults::NEW_ENTRY_WINDOW_SECS)
}

// =============================================================================
// NOTIFICATION
// =============================================================================

/// Category of a notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Exam,
    Schedule,
    Result,
    System,
    #[default]
    #[serde(other)]
    Other,
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exam => write!(f, "exam"),
            Self::Schedule => write!(f, "schedule"),
            Self::Result => write!(f, "result"),
            Self::System => write!(f, "system"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// A user-facing notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: EntryId,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub kind: NotificationKind,
    /// Route the UI navigates to when the notification is opened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl Notification {
    /// Unread notification with an empty body, mostly for tests and demos.
    pub fn new(id: EntryId, title: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            is_read: false,
            created_at,
            title: title.into(),
            message: String::new(),
            kind: NotificationKind::Other,
            link: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_kind(mut self, kind: NotificationKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_read(mut self, read: bool) -> Self {
        self.is_read = read;
        self
    }
}

impl FeedEntry for Notification {
    const FEED: FeedKey = FeedKey::Notifications;

    fn id(&self) -> EntryId {
        self.id
    }

    fn is_read(&self) -> bool {
        self.is_read
    }

    fn set_read(&mut self, read: bool) {
        self.is_read = read;
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn headline(&self) -> String {
        self.title.clone()
    }

    fn detail(&self) -> String {
        self.message.clone()
    }

    fn from_event(event: &PushEvent) -> Option<Self> {
        match event {
            PushEvent::NotificationCreated(n) => Some(n.clone()),
            _ => None,
        }
    }
}

// =============================================================================
// ACTIVITY LOG
// =============================================================================

/// What an actor did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityAction {
    Create,
    Update,
    Delete,
    Login,
    Logout,
    #[default]
    #[serde(other)]
    Other,
}

impl ActivityAction {
    fn verb(&self) -> &'static str {
        match self {
            Self::Create => "created",
            Self::Update => "updated",
            Self::Delete => "deleted",
            Self::Login => "logged in",
            Self::Logout => "logged out",
            Self::Other => "touched",
        }
    }
}

impl std::fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
            Self::Login => write!(f, "login"),
            Self::Logout => write!(f, "logout"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// One audit-trail record (who did what to which object).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLogEntry {
    pub id: EntryId,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    /// Display name of the account that performed the action.
    pub actor: String,
    #[serde(default)]
    pub action: ActivityAction,
    /// Object kind, e.g. "exam", "class", "schedule".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    #[serde(default)]
    pub description: String,
}

impl ActivityLogEntry {
    pub fn new(
        id: EntryId,
        actor: impl Into<String>,
        action: ActivityAction,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            is_read: false,
            created_at,
            actor: actor.into(),
            action,
            target_type: None,
            target_id: None,
            description: String::new(),
        }
    }

    pub fn with_target(mut self, target_type: impl Into<String>, target_id: impl Into<String>) -> Self {
        self.target_type = Some(target_type.into());
        self.target_id = Some(target_id.into());
        self
    }

    pub fn with_read(mut self, read: bool) -> Self {
        self.is_read = read;
        self
    }
}

impl FeedEntry for ActivityLogEntry {
    const FEED: FeedKey = FeedKey::ActivityLogs;

    fn id(&self) -> EntryId {
        self.id
    }

    fn is_read(&self) -> bool {
        self.is_read
    }

    fn set_read(&mut self, read: bool) {
        self.is_read = read;
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn headline(&self) -> String {
        match &self.target_type {
            Some(target) => format!("{} {} {}", self.actor, self.action.verb(), target),
            None => format!("{} {}", self.actor, self.action.verb()),
        }
    }

    fn detail(&self) -> String {
        self.description.clone()
    }

    fn from_event(event: &PushEvent) -> Option<Self> {
        match event {
            PushEvent::ActivityLogCreated(entry) => Some(entry.clone()),
            _ => None,
        }
    }
}
