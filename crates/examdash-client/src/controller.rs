//! Feed controller: ties one feed store to its REST source and the push channel.
//!
//! Mount order matters. The guard latch and the store are activated and the
//! channel listener is registered *before* the initial fetch, so pushes that
//! arrive during the fetch queue behind it instead of being lost.
//!
//! User actions are optimistic. The store changes first, then the server is
//! asked to confirm. On failure the inverse mutation is applied and the error
//! is returned to the caller.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use examdash_channel::{ChannelHandle, ListenerId};
use examdash_core::{
    logging, EntryId, Error, FeedEntry, FeedKey, FeedSnapshot, FeedSource, FeedStore, LoadOutcome,
    Result, SubscriptionGuard,
};
use tracing::{debug, debug_span, field, info, warn, Instrument};

pub struct FeedController<E: FeedEntry> {
    store: Arc<FeedStore<E>>,
    source: Arc<dyn FeedSource<E>>,
    channel: Arc<ChannelHandle>,
    guard: Arc<SubscriptionGuard>,
    listener: Mutex<Option<ListenerId>>,
}

impl<E: FeedEntry> FeedController<E> {
    pub fn new(
        store: Arc<FeedStore<E>>,
        source: Arc<dyn FeedSource<E>>,
        channel: Arc<ChannelHandle>,
        guard: Arc<SubscriptionGuard>,
    ) -> Self {
        Self {
            store,
            source,
            channel,
            guard,
            listener: Mutex::new(None),
        }
    }

    pub fn feed(&self) -> FeedKey {
        E::FEED
    }

    pub fn store(&self) -> &Arc<FeedStore<E>> {
        &self.store
    }

    pub fn snapshot(&self) -> FeedSnapshot<E> {
        self.store.snapshot()
    }

    pub fn is_mounted(&self) -> bool {
        self.guard.is_active(E::FEED)
    }

    /// Activate the feed, register its push listener and run the initial
    /// fetch. Returns `false` without side effects if the feed is already
    /// mounted in this session.
    pub async fn mount(&self) -> bool {
        {
            // Held until the listener id is stored; unmount takes it first.
            let mut listener = self.lock_listener();
            if !self.guard.activate(E::FEED) {
                debug!(feed = %E::FEED, "Feed already mounted, skipping listener registration");
                return false;
            }
            self.store.activate();

            let store = Arc::clone(&self.store);
            let id = self.channel.on(E::FEED.event_type(), move |event| {
                if let Some(entry) = E::from_event(event) {
                    store.push(entry);
                }
            });
            *listener = Some(id);
            info!(feed = %E::FEED, listener_id = %id, "Feed mounted");
        }

        self.refresh().await;
        true
    }

    /// Remove the listener and deactivate. A fetch still in flight is
    /// discarded when it lands. Safe to call when not mounted.
    pub fn unmount(&self) -> bool {
        let was_mounted = {
            let mut listener = self.lock_listener();
            if let Some(id) = listener.take() {
                self.channel.off(E::FEED.event_type(), id);
            }
            self.store.deactivate();
            self.guard.deactivate(E::FEED)
        };
        if was_mounted {
            info!(feed = %E::FEED, "Feed unmounted");
        }
        was_mounted
    }

    /// Full resync from the server. Pushes received meanwhile are merged
    /// after the replacement.
    pub async fn refresh(&self) -> LoadOutcome {
        let Some(ticket) = self.store.begin_load() else {
            return LoadOutcome::Discarded;
        };
        let span = debug_span!(
            "feed_refresh",
            subsystem = "client",
            component = "controller",
            op = "refresh",
            feed = %E::FEED,
            generation = ticket.generation(),
            entry_count = field::Empty,
            duration_ms = field::Empty
        );
        let start = Instant::now();
        let result = self
            .source
            .list()
            .instrument(span.clone())
            .await
            .map_err(|e| match e {
                Error::Fetch(_) | Error::Unauthorized(_) | Error::Decode(_) => e,
                other => Error::Fetch(other.to_string()),
            });
        let outcome = self.store.complete_load(ticket, result);
        span.record(logging::DURATION_MS, start.elapsed().as_millis() as u64);
        span.record(logging::ENTRY_COUNT, self.store.len() as u64);
        span.in_scope(|| debug!(outcome = ?outcome, "Refresh finished"));
        outcome
    }

    /// Optimistically mark one entry read. `Ok(false)` if nothing changed
    /// (unknown id or already read); no request is sent then.
    pub async fn mark_read(&self, id: EntryId) -> Result<bool> {
        if !self.store.mark_read(id) {
            return Ok(false);
        }
        if let Err(e) = self.source.mark_read(id).await {
            self.store.mark_unread(id);
            warn!(feed = %E::FEED, entry_id = id, error = %e, "Mark read rejected, reverted");
            return Err(Error::Mutation(format!("mark {} read: {}", id, e)));
        }
        Ok(true)
    }

    /// Optimistically mark everything read. Returns how many entries changed.
    pub async fn mark_all_read(&self) -> Result<usize> {
        let previously_unread = self.store.mark_all_read();
        if previously_unread.is_empty() {
            return Ok(0);
        }
        if let Err(e) = self.source.mark_all_read().await {
            for id in &previously_unread {
                self.store.mark_unread(*id);
            }
            warn!(
                feed = %E::FEED,
                entry_count = previously_unread.len(),
                error = %e,
                "Mark all read rejected, reverted"
            );
            return Err(Error::Mutation(format!("mark all read: {}", e)));
        }
        Ok(previously_unread.len())
    }

    /// Optimistically remove an entry. `Ok(false)` if it was not present.
    pub async fn remove(&self, id: EntryId) -> Result<bool> {
        let Some(removed) = self.store.remove(id) else {
            return Ok(false);
        };
        if let Err(e) = self.source.remove(id).await {
            self.store.restore(removed);
            warn!(feed = %E::FEED, entry_id = id, error = %e, "Remove rejected, restored");
            return Err(Error::Mutation(format!("remove {}: {}", id, e)));
        }
        Ok(true)
    }

    fn lock_listener(&self) -> MutexGuard<'_, Option<ListenerId>> {
        self.listener.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl<E: FeedEntry> Drop for FeedController<E> {
    fn drop(&mut self) {
        if let Some(id) = self.lock_listener().take() {
            self.channel.off(E::FEED.event_type(), id);
            self.guard.deactivate(E::FEED);
        }
    }
}
