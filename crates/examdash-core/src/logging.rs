//! Structured logging schema for examdash.
//!
//! All crates log with the same field names, so a log pipeline can filter a
//! single feed or connection across the channel, store and controller layers.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Channel gave up reconnecting, session can no longer receive pushes |
//! | WARN  | Recoverable issue: failed fetch, rejected mutation, bad frame, reconnect |
//! | INFO  | Lifecycle events (session start/end, connect, mount/unmount, role change) |
//! | DEBUG | Decision points (duplicate dropped, event queued while loading, stale load) |
//! | TRACE | Per-frame traffic and per-subscriber notification |
//!
//! ## Field names
//!
//! Event macros spell these out literally:
//!
//! | Field | Meaning |
//! |-------|---------|
//! | `session_id` | Session identifier (UUIDv7) |
//! | `subsystem` | "channel", "client" |
//! | `component` | "reconnect", "controller", "resync" |
//! | `op` | Logical operation, e.g. "refresh" |
//! | `feed` | "notifications", "activity_logs" |
//! | `entry_id` | Server-assigned entry id |
//! | `event_type` | Push event type, e.g. "notification.created" |
//! | `listener_id` | Channel listener registration id |
//! | `role` | Session role fed to the role gate |
//! | `unread_count` | Unread count after a mutation |
//! | `pending` | Push events queued behind an in-flight load |
//! | `generation` | Store generation stamped on load tickets |
//! | `revision` | Snapshot revision delivered to subscribers |
//! | `delay_ms` | Backoff delay before the next connect attempt |
//! | `error` | Error message when an operation fails |
//!
//! Fields declared `Empty` on a span and filled in later with
//! [`tracing::Span::record`] use the constants below.

/// Channel connection state ("disconnected", "connecting", "connected").
pub const CONNECTION_STATE: &str = "connection_state";

/// Consecutive failed connect attempts.
pub const ATTEMPT: &str = "attempt";

/// Number of entries in a feed after a load.
pub const ENTRY_COUNT: &str = "entry_count";

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";
