//! # examdash-core
//!
//! Real-time feed synchronization for the examdash dashboard.
//!
//! This crate holds everything that does not touch the network:
//! - the entry model shared by the notification and activity-log feeds
//! - the push event union and its wire frame
//! - the subscription guard and role gate
//! - the list synchronizer ([`FeedState`]) and reactive store ([`FeedStore`])
//! - the fan-out subscribers (badge, toasts, paginated list)

pub mod defaults;
pub mod error;
pub mod events;
pub mod fanout;
pub mod guard;
pub mod logging;
pub mod models;
pub mod role;
pub mod store;
pub mod sync;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use events::{PushEvent, PushFrame, ACTIVITY_LOG_CREATED, NOTIFICATION_CREATED};
pub use fanout::{BadgeCounter, ListView, Toast, ToastPresenter};
pub use guard::SubscriptionGuard;
pub use models::*;
pub use role::{Role, RoleGate};
pub use store::{
    ChangeKind, FeedChange, FeedSnapshot, FeedStore, FeedSubscriber, LoadOutcome, LoadTicket,
    SubscriberId,
};
pub use sync::{FeedState, RemovedEntry};
pub use traits::FeedSource;
