//! Centralized default constants for examdash.
//!
//! **This module is the single source of truth** for shared default values.
//! Config structs in every crate fall back to these when an environment
//! variable is unset or unparsable.

// =============================================================================
// FEEDS
// =============================================================================

/// Maximum entries kept by the "recent notifications" feed.
pub const RECENT_NOTIFICATIONS_LIMIT: usize = 50;

/// Entries younger than this are rendered with a "new" badge (24 hours).
pub const NEW_ENTRY_WINDOW_SECS: i64 = 24 * 60 * 60;

// =============================================================================
// FAN-OUT
// =============================================================================

/// Maximum toasts waiting to be shown; older toasts are dropped first.
pub const TOAST_QUEUE_CAPACITY: usize = 5;

/// Default page size for the paginated list view.
pub const LIST_PAGE_SIZE: usize = 10;

/// Unread counts above this are rendered as "99+".
pub const BADGE_DISPLAY_MAX: usize = 99;

// =============================================================================
// CHANNEL
// =============================================================================

/// Default push channel URL.
pub const CHANNEL_URL: &str = "ws://127.0.0.1:8080/ws";

/// First reconnect delay in milliseconds.
pub const RECONNECT_INITIAL_DELAY_MS: u64 = 500;

/// Reconnect delay ceiling in milliseconds.
pub const RECONNECT_MAX_DELAY_MS: u64 = 30_000;

/// Consecutive failed connects before the channel gives up.
pub const RECONNECT_MAX_ATTEMPTS: u32 = 10;

/// Fraction of the backoff delay added as random jitter.
pub const RECONNECT_JITTER_RATIO: f64 = 0.2;

/// Broadcast capacity of the in-process transport.
pub const TRANSPORT_BUFFER_CAPACITY: usize = 256;

// =============================================================================
// REST
// =============================================================================

/// Default REST base URL.
pub const API_URL: &str = "http://127.0.0.1:8080/api";

/// Timeout for REST requests in seconds.
pub const HTTP_TIMEOUT_SECS: u64 = 15;

/// REST path of the notification feed.
pub const NOTIFICATIONS_PATH: &str = "notifications";

/// REST path of the activity-log feed.
pub const ACTIVITY_LOGS_PATH: &str = "activity-logs";
