//! Subscription guard: at most one live listener per feed per session.
//!
//! Each feed key is a two-state latch (`inactive` → `active` via
//! [`SubscriptionGuard::activate`], back via [`SubscriptionGuard::deactivate`]).
//! A surface that re-runs its setup logic gets `false` from `activate` and
//! must not register another listener.

use std::collections::HashSet;
use std::sync::Mutex;

use tracing::debug;

use crate::models::FeedKey;

/// Per-feed activation latch shared by everything in one session.
#[derive(Debug, Default)]
pub struct SubscriptionGuard {
    active: Mutex<HashSet<FeedKey>>,
}

impl SubscriptionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the latch for `feed`. Returns `true` only for the caller that
    /// performed the transition.
    pub fn activate(&self, feed: FeedKey) -> bool {
        let activated = self.lock().insert(feed);
        debug!(feed = %feed, activated, "Subscription guard activate");
        activated
    }

    /// Clear the latch for `feed`. Idempotent; returns whether it was set.
    pub fn deactivate(&self, feed: FeedKey) -> bool {
        let was_active = self.lock().remove(&feed);
        debug!(feed = %feed, was_active, "Subscription guard deactivate");
        was_active
    }

    pub fn is_active(&self, feed: FeedKey) -> bool {
        self.lock().contains(&feed)
    }

    /// Feeds currently latched.
    pub fn active_feeds(&self) -> Vec<FeedKey> {
        let active = self.lock();
        FeedKey::ALL
            .into_iter()
            .filter(|key| active.contains(key))
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<FeedKey>> {
        // A panic while holding this lock cannot leave the set half-updated.
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
