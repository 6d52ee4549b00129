//! Reactive store: one feed, its load status, and the subscribers watching it.
//!
//! The store is the only write path into a [`FeedState`]. Each mutation runs
//! under the store lock and produces zero or more [`FeedChange`]s, each with a
//! snapshot taken right after that step. Changes are delivered after the lock
//! is released, synchronously, in subscriber registration order. A subscriber
//! may therefore call back into the store without deadlocking; snapshots carry
//! a monotonically increasing `revision` so late deliveries can be recognised.
//!
//! ## Loads and the pending queue
//!
//! [`FeedStore::begin_load`] moves the feed to `loading` and hands out a
//! [`LoadTicket`]. Pushes that arrive while loading are queued, and
//! [`FeedStore::complete_load`] replaces the list, then drains the queue
//! through `merge` in receipt order. A ticket is void once the store is
//! deactivated or a newer load begins, so a late fetch never overwrites
//! fresher state.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::models::{EntryId, FeedEntry, FeedKey, FeedStatus};
use crate::sync::{FeedState, RemovedEntry};

/// Immutable view of a feed handed to subscribers and readers.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSnapshot<E> {
    pub feed: FeedKey,
    pub entries: Vec<E>,
    pub unread_count: usize,
    pub status: FeedStatus,
    pub revision: u64,
}

/// What a mutation did.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeKind<E> {
    /// A pushed entry was merged (duplicates never produce this).
    Merged(E),
    /// The list was replaced by a fetch.
    Replaced,
    MarkedRead(EntryId),
    MarkedUnread(EntryId),
    MarkedAllRead,
    Removed(EntryId),
    Restored(EntryId),
    StatusChanged(FeedStatus),
    /// Everything was dropped (role change, session end).
    Reset,
}

/// One delivered change: what happened and the state right after it.
#[derive(Debug, Clone)]
pub struct FeedChange<E> {
    pub kind: ChangeKind<E>,
    pub snapshot: Arc<FeedSnapshot<E>>,
}

/// Observer of a feed store.
pub trait FeedSubscriber<E>: Send + Sync {
    fn on_change(&self, change: &FeedChange<E>);
}

impl<E, F> FeedSubscriber<E> for F
where
    F: Fn(&FeedChange<E>) + Send + Sync,
{
    fn on_change(&self, change: &FeedChange<E>) {
        self(change)
    }
}

/// Handle returned by [`FeedStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// Proof that a load was started, checked when the load completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a load ticket must be passed to complete_load"]
pub struct LoadTicket {
    feed: FeedKey,
    generation: u64,
}

impl LoadTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// How a completed load was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Entries replaced; `drained` queued pushes merged afterwards.
    Applied { drained: usize },
    /// Load failed; entries kept, `drained` queued pushes merged into them.
    Failed { drained: usize },
    /// Ticket was stale (store deactivated or a newer load started).
    Discarded,
}

struct StoreInner<E> {
    state: FeedState<E>,
    status: FeedStatus,
    active: bool,
    generation: u64,
    revision: u64,
    pending: VecDeque<E>,
}

impl<E: FeedEntry> StoreInner<E> {
    fn snapshot(&mut self, feed: FeedKey) -> Arc<FeedSnapshot<E>> {
        self.revision += 1;
        Arc::new(FeedSnapshot {
            feed,
            entries: self.state.entries().to_vec(),
            unread_count: self.state.unread_count(),
            status: self.status,
            revision: self.revision,
        })
    }

    fn change(&mut self, feed: FeedKey, kind: ChangeKind<E>) -> FeedChange<E> {
        FeedChange {
            kind,
            snapshot: self.snapshot(feed),
        }
    }

    fn set_status(&mut self, feed: FeedKey, status: FeedStatus, changes: &mut Vec<FeedChange<E>>) {
        if self.status != status {
            self.status = status;
            changes.push(self.change(feed, ChangeKind::StatusChanged(status)));
        }
    }

    fn drain_pending(&mut self, feed: FeedKey, changes: &mut Vec<FeedChange<E>>) -> usize {
        let mut drained = 0;
        while let Some(entry) = self.pending.pop_front() {
            drained += 1;
            if self.state.merge(entry.clone()) {
                changes.push(self.change(feed, ChangeKind::Merged(entry)));
            }
        }
        drained
    }
}

type Subscribers<E> = Vec<(SubscriberId, Arc<dyn FeedSubscriber<E>>)>;

/// Observable wrapper around one feed.
pub struct FeedStore<E> {
    feed: FeedKey,
    inner: Mutex<StoreInner<E>>,
    subscribers: Mutex<Subscribers<E>>,
    next_subscriber: AtomicU64,
}

impl<E: FeedEntry> FeedStore<E> {
    /// Inactive, empty store for `E::FEED` with an optional size limit.
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            feed: E::FEED,
            inner: Mutex::new(StoreInner {
                state: FeedState::new(limit),
                status: FeedStatus::Idle,
                active: false,
                generation: 0,
                revision: 0,
                pending: VecDeque::new(),
            }),
            subscribers: Mutex::new(Vec::new()),
            next_subscriber: AtomicU64::new(1),
        }
    }

    pub fn feed(&self) -> FeedKey {
        self.feed
    }

    // -- Reads ----------------------------------------------------------------

    /// Current state. Does not advance the revision seen by subscribers.
    pub fn snapshot(&self) -> FeedSnapshot<E> {
        let inner = self.lock();
        FeedSnapshot {
            feed: self.feed,
            entries: inner.state.entries().to_vec(),
            unread_count: inner.state.unread_count(),
            status: inner.status,
            revision: inner.revision,
        }
    }

    pub fn unread_count(&self) -> usize {
        self.lock().state.unread_count()
    }

    pub fn status(&self) -> FeedStatus {
        self.lock().status
    }

    pub fn len(&self) -> usize {
        self.lock().state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().state.is_empty()
    }

    pub fn is_active(&self) -> bool {
        self.lock().active
    }

    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn get(&self, id: EntryId) -> Option<E> {
        self.lock().state.get(id).cloned()
    }

    // -- Subscribers ----------------------------------------------------------

    /// Register a subscriber. Delivery order is registration order.
    pub fn subscribe(&self, subscriber: Arc<dyn FeedSubscriber<E>>) -> SubscriberId {
        let id = SubscriberId(self.next_subscriber.fetch_add(1, Ordering::Relaxed));
        self.lock_subscribers().push((id, subscriber));
        id
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.lock_subscribers();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock_subscribers().len()
    }

    // -- Lifecycle ------------------------------------------------------------

    /// Start accepting pushes and loads.
    pub fn activate(&self) {
        let mut inner = self.lock();
        inner.active = true;
        debug!(feed = %self.feed, generation = inner.generation, "Feed store activated");
    }

    /// Stop accepting pushes, void outstanding load tickets and drop the
    /// pending queue. Entries are kept. Safe to call repeatedly.
    pub fn deactivate(&self) {
        let changes = {
            let mut inner = self.lock();
            let mut changes = Vec::new();
            inner.active = false;
            inner.generation += 1;
            let dropped = inner.pending.len();
            inner.pending.clear();
            if inner.status == FeedStatus::Loading {
                inner.set_status(self.feed, FeedStatus::Idle, &mut changes);
            }
            debug!(
                feed = %self.feed,
                generation = inner.generation,
                pending = dropped,
                "Feed store deactivated"
            );
            changes
        };
        self.notify(changes);
    }

    /// Drop all entries and return to idle (role change, session end).
    pub fn reset(&self) {
        let changes = {
            let mut inner = self.lock();
            inner.state.clear();
            inner.pending.clear();
            inner.status = FeedStatus::Idle;
            inner.generation += 1;
            vec![inner.change(self.feed, ChangeKind::Reset)]
        };
        self.notify(changes);
    }

    // -- Loads ----------------------------------------------------------------

    /// Mark the feed as loading. Returns `None` if the store is inactive.
    pub fn begin_load(&self) -> Option<LoadTicket> {
        let (ticket, changes) = {
            let mut inner = self.lock();
            if !inner.active {
                debug!(feed = %self.feed, "Load not started, feed inactive");
                return None;
            }
            inner.generation += 1;
            let mut changes = Vec::new();
            inner.set_status(self.feed, FeedStatus::Loading, &mut changes);
            let ticket = LoadTicket {
                feed: self.feed,
                generation: inner.generation,
            };
            (ticket, changes)
        };
        self.notify(changes);
        Some(ticket)
    }

    /// Apply the result of a load started with `ticket`.
    pub fn complete_load(&self, ticket: LoadTicket, result: Result<Vec<E>>) -> LoadOutcome {
        let (outcome, changes) = {
            let mut inner = self.lock();
            if ticket.feed != self.feed || !inner.active || ticket.generation != inner.generation {
                debug!(
                    feed = %self.feed,
                    generation = ticket.generation,
                    current = inner.generation,
                    active = inner.active,
                    "Discarding stale load result"
                );
                return LoadOutcome::Discarded;
            }

            let mut changes = Vec::new();
            match result {
                Ok(entries) => {
                    inner.state.replace_all(entries);
                    inner.status = FeedStatus::Idle;
                    changes.push(inner.change(self.feed, ChangeKind::Replaced));
                    let drained = inner.drain_pending(self.feed, &mut changes);
                    debug!(
                        feed = %self.feed,
                        entry_count = inner.state.len(),
                        unread_count = inner.state.unread_count(),
                        pending = drained,
                        "Load applied"
                    );
                    (LoadOutcome::Applied { drained }, changes)
                }
                Err(e) => {
                    warn!(feed = %self.feed, error = %e, "Load failed, keeping last entries");
                    inner.set_status(self.feed, FeedStatus::Error, &mut changes);
                    let drained = inner.drain_pending(self.feed, &mut changes);
                    (LoadOutcome::Failed { drained }, changes)
                }
            }
        };
        self.notify(changes);
        outcome
    }

    // -- Mutations ------------------------------------------------------------

    /// Fold a pushed entry into the feed, or queue it behind an in-flight load.
    ///
    /// Returns `true` if the entry was merged or queued.
    pub fn push(&self, entry: E) -> bool {
        let changes = {
            let mut inner = self.lock();
            if !inner.active {
                debug!(feed = %self.feed, entry_id = entry.id(), "Push ignored, feed inactive");
                return false;
            }
            if inner.status == FeedStatus::Loading {
                inner.pending.push_back(entry);
                debug!(
                    feed = %self.feed,
                    pending = inner.pending.len(),
                    "Push queued behind in-flight load"
                );
                return true;
            }
            let id = entry.id();
            if !inner.state.merge(entry.clone()) {
                debug!(feed = %self.feed, entry_id = id, "Duplicate push dropped");
                return false;
            }
            vec![inner.change(self.feed, ChangeKind::Merged(entry))]
        };
        self.notify(changes);
        true
    }

    pub fn mark_read(&self, id: EntryId) -> bool {
        self.mutate(|state| state.mark_read(id), ChangeKind::MarkedRead(id))
    }

    pub fn mark_unread(&self, id: EntryId) -> bool {
        self.mutate(|state| state.mark_unread(id), ChangeKind::MarkedUnread(id))
    }

    /// Mark everything read; returns the ids that were unread before.
    pub fn mark_all_read(&self) -> Vec<EntryId> {
        let (previously_unread, changes) = {
            let mut inner = self.lock();
            let previously_unread = inner.state.mark_all_read();
            if previously_unread.is_empty() {
                return previously_unread;
            }
            let changes = vec![inner.change(self.feed, ChangeKind::MarkedAllRead)];
            (previously_unread, changes)
        };
        self.notify(changes);
        previously_unread
    }

    pub fn remove(&self, id: EntryId) -> Option<RemovedEntry<E>> {
        let (removed, changes) = {
            let mut inner = self.lock();
            let removed = inner.state.remove(id)?;
            let changes = vec![inner.change(self.feed, ChangeKind::Removed(id))];
            (removed, changes)
        };
        self.notify(changes);
        Some(removed)
    }

    pub fn restore(&self, removed: RemovedEntry<E>) -> bool {
        let id = removed.entry.id();
        self.mutate(|state| state.restore(removed), ChangeKind::Restored(id))
    }

    fn mutate(&self, op: impl FnOnce(&mut FeedState<E>) -> bool, kind: ChangeKind<E>) -> bool {
        let changes = {
            let mut inner = self.lock();
            if !op(&mut inner.state) {
                return false;
            }
            vec![inner.change(self.feed, kind)]
        };
        self.notify(changes);
        true
    }

    fn notify(&self, changes: Vec<FeedChange<E>>) {
        if changes.is_empty() {
            return;
        }
        let subscribers: Vec<Arc<dyn FeedSubscriber<E>>> = self
            .lock_subscribers()
            .iter()
            .map(|(_, s)| s.clone())
            .collect();
        for change in &changes {
            trace!(
                feed = %self.feed,
                revision = change.snapshot.revision,
                subscribers = subscribers.len(),
                "Notifying subscribers"
            );
            for subscriber in &subscribers {
                subscriber.on_change(change);
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner<E>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_subscribers(&self) -> MutexGuard<'_, Subscribers<E>> {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
