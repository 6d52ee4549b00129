//! Fan-out subscribers: the UI surfaces that observe a feed store.
//!
//! Each surface derives its own presentation from [`FeedChange`]s and never
//! writes to the feed. Changes older than the last one a surface applied are
//! ignored, so out-of-order delivery from concurrent mutations cannot roll a
//! surface back.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::trace;

use crate::defaults;
use crate::models::{EntryId, FeedEntry, FeedKey};
use crate::store::{ChangeKind, FeedChange, FeedSubscriber};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// =============================================================================
// BADGE COUNTER
// =============================================================================

#[derive(Debug, Default)]
struct BadgeState {
    count: usize,
    revision: u64,
}

/// Unread-count badge.
#[derive(Debug, Default)]
pub struct BadgeCounter {
    state: Mutex<BadgeState>,
}

impl BadgeCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        lock(&self.state).count
    }

    /// Text shown on the badge: empty when zero, capped at "99+".
    pub fn label(&self) -> String {
        match self.count() {
            0 => String::new(),
            n if n > defaults::BADGE_DISPLAY_MAX => format!("{}+", defaults::BADGE_DISPLAY_MAX),
            n => n.to_string(),
        }
    }
}

impl<E: FeedEntry> FeedSubscriber<E> for BadgeCounter {
    fn on_change(&self, change: &FeedChange<E>) {
        let mut state = lock(&self.state);
        if change.snapshot.revision <= state.revision {
            return;
        }
        state.revision = change.snapshot.revision;
        state.count = change.snapshot.unread_count;
    }
}

// =============================================================================
// TOAST PRESENTER
// =============================================================================

/// A transient pop-up for one newly pushed entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub feed: FeedKey,
    pub entry_id: EntryId,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct ToastState {
    queue: VecDeque<Toast>,
    revision: u64,
}

/// Shows a toast for each unread entry that arrives by push.
///
/// Fetches, read-state changes and duplicate deliveries never raise a toast.
/// The queue is bounded; when full the oldest toast is dropped. A toast is
/// also dropped once its entry leaves the feed (removed, evicted by the cap
/// or gone after a reload).
#[derive(Debug)]
pub struct ToastPresenter {
    state: Mutex<ToastState>,
    capacity: usize,
}

impl Default for ToastPresenter {
    fn default() -> Self {
        Self::new(defaults::TOAST_QUEUE_CAPACITY)
    }
}

impl ToastPresenter {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(ToastState::default()),
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.state).queue.len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.state).queue.is_empty()
    }

    /// Toasts waiting to be shown, oldest first.
    pub fn pending(&self) -> Vec<Toast> {
        lock(&self.state).queue.iter().cloned().collect()
    }

    /// Take every waiting toast, oldest first.
    pub fn drain(&self) -> Vec<Toast> {
        lock(&self.state).queue.drain(..).collect()
    }

    /// Dismiss the toast for one entry (e.g. the user opened it).
    pub fn dismiss(&self, entry_id: EntryId) -> bool {
        let mut state = lock(&self.state);
        let before = state.queue.len();
        state.queue.retain(|t| t.entry_id != entry_id);
        state.queue.len() != before
    }
}

impl<E: FeedEntry> FeedSubscriber<E> for ToastPresenter {
    fn on_change(&self, change: &FeedChange<E>) {
        let mut state = lock(&self.state);
        if change.snapshot.revision <= state.revision {
            return;
        }
        state.revision = change.snapshot.revision;
        match &change.kind {
            ChangeKind::Merged(entry) => {
                // A capped feed may have evicted entries that still have a toast.
                retain_present(&mut state.queue, change);
                if entry.is_read() || state.queue.iter().any(|t| t.entry_id == entry.id()) {
                    return;
                }
                if state.queue.len() == self.capacity {
                    state.queue.pop_front();
                }
                trace!(feed = %change.snapshot.feed, entry_id = entry.id(), "Toast queued");
                state.queue.push_back(Toast {
                    feed: change.snapshot.feed,
                    entry_id: entry.id(),
                    title: entry.headline(),
                    body: entry.detail(),
                    created_at: entry.created_at(),
                });
            }
            ChangeKind::MarkedRead(id) | ChangeKind::Removed(id) => {
                state.queue.retain(|t| t.entry_id != *id);
            }
            ChangeKind::Replaced => retain_present(&mut state.queue, change),
            ChangeKind::MarkedAllRead | ChangeKind::Reset => state.queue.clear(),
            _ => {}
        }
    }
}

fn retain_present<E: FeedEntry>(queue: &mut VecDeque<Toast>, change: &FeedChange<E>) {
    let feed = change.snapshot.feed;
    queue.retain(|t| t.feed != feed || change.snapshot.entries.iter().any(|e| e.id() == t.entry_id));
}

// =============================================================================
// LIST VIEW
// =============================================================================

#[derive(Debug)]
struct ListState<E> {
    entries: Vec<E>,
    unread_count: usize,
    page: usize,
    revision: u64,
}

/// Client-side paginated list over the latest snapshot.
#[derive(Debug)]
pub struct ListView<E> {
    state: Mutex<ListState<E>>,
    page_size: usize,
}

impl<E: FeedEntry> Default for ListView<E> {
    fn default() -> Self {
        Self::new(defaults::LIST_PAGE_SIZE)
    }
}

impl<E: FeedEntry> ListView<E> {
    pub fn new(page_size: usize) -> Self {
        Self {
            state: Mutex::new(ListState {
                entries: Vec::new(),
                unread_count: 0,
                page: 0,
                revision: 0,
            }),
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn len(&self) -> usize {
        lock(&self.state).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.state).entries.is_empty()
    }

    pub fn unread_count(&self) -> usize {
        lock(&self.state).unread_count
    }

    /// At least one page, even when empty.
    pub fn page_count(&self) -> usize {
        let len = lock(&self.state).entries.len();
        len.div_ceil(self.page_size).max(1)
    }

    pub fn current_page(&self) -> usize {
        lock(&self.state).page
    }

    /// Jump to `page`, clamped to the last page. Returns the page selected.
    pub fn set_page(&self, page: usize) -> usize {
        let last = self.page_count() - 1;
        let mut state = lock(&self.state);
        state.page = page.min(last);
        state.page
    }

    pub fn next_page(&self) -> usize {
        let page = self.current_page();
        self.set_page(page + 1)
    }

    pub fn prev_page(&self) -> usize {
        let page = self.current_page();
        self.set_page(page.saturating_sub(1))
    }

    /// Rows of the current page.
    pub fn page_entries(&self) -> Vec<E> {
        let state = lock(&self.state);
        state
            .entries
            .iter()
            .skip(state.page * self.page_size)
            .take(self.page_size)
            .cloned()
            .collect()
    }
}

impl<E: FeedEntry> FeedSubscriber<E> for ListView<E> {
    fn on_change(&self, change: &FeedChange<E>) {
        let mut state = lock(&self.state);
        if change.snapshot.revision <= state.revision {
            return;
        }
        state.revision = change.snapshot.revision;
        state.entries = change.snapshot.entries.clone();
        state.unread_count = change.snapshot.unread_count;
        let last = state.entries.len().div_ceil(self.page_size).max(1) - 1;
        state.page = state.page.min(last);
    }
}
