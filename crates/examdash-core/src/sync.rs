//! List synchronizer: the pure state transitions of one feed.
//!
//! [`FeedState`] keeps entries most-recent-first, unique by id, optionally
//! capped, and maintains `unread_count` incrementally. Every operation leaves
//! `unread_count` equal to the number of unread entries; debug builds assert
//! this after each call.
//!
//! None of these methods log, notify or touch the network. The reactive store
//! wraps them with fan-out; the feed controller wraps them with remote calls.

use std::collections::HashSet;

use crate::models::{EntryId, FeedEntry};

/// An entry taken out of a feed, with the position it occupied.
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedEntry<E> {
    pub index: usize,
    pub entry: E,
}

/// Ordered, deduplicated entry list with an incrementally maintained unread count.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedState<E> {
    entries: Vec<E>,
    ids: HashSet<EntryId>,
    unread_count: usize,
    limit: Option<usize>,
}

impl<E: FeedEntry> Default for FeedState<E> {
    fn default() -> Self {
        Self::new(None)
    }
}

impl<E: FeedEntry> FeedState<E> {
    /// Empty feed. `limit` caps the entry count ("recent N" views).
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            entries: Vec::new(),
            ids: HashSet::new(),
            unread_count: 0,
            limit,
        }
    }

    pub fn entries(&self) -> &[E] {
        &self.entries
    }

    pub fn unread_count(&self) -> usize {
        self.unread_count
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: EntryId) -> bool {
        self.ids.contains(&id)
    }

    pub fn get(&self, id: EntryId) -> Option<&E> {
        self.position(id).map(|i| &self.entries[i])
    }

    /// Full recount of unread entries.
    pub fn scan_unread(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_read()).count()
    }

    /// Fold one pushed entry into the feed.
    ///
    /// Returns `false` (and changes nothing) if an entry with the same id is
    /// already present. Otherwise prepends, trims the tail to the limit and
    /// counts the entry if it is unread.
    pub fn merge(&mut self, entry: E) -> bool {
        if self.ids.contains(&entry.id()) {
            return false;
        }
        if !entry.is_read() {
            self.unread_count += 1;
        }
        self.ids.insert(entry.id());
        self.entries.insert(0, entry);
        self.enforce_limit();
        self.check_invariant();
        true
    }

    /// Mark one entry read. Returns `false` if it is missing or already read.
    pub fn mark_read(&mut self, id: EntryId) -> bool {
        let changed = self.set_read(id, true);
        self.check_invariant();
        changed
    }

    /// Mark one entry unread again (compensates a failed remote mark-read).
    /// Returns `false` if it is missing or already unread.
    pub fn mark_unread(&mut self, id: EntryId) -> bool {
        let changed = self.set_read(id, false);
        self.check_invariant();
        changed
    }

    /// Mark every entry read and return the ids that were unread, in list
    /// order, so a failed remote call can re-mark exactly those.
    pub fn mark_all_read(&mut self) -> Vec<EntryId> {
        let previously_unread: Vec<EntryId> = self
            .entries
            .iter_mut()
            .filter(|e| !e.is_read())
            .map(|e| {
                e.set_read(true);
                e.id()
            })
            .collect();
        self.unread_count = 0;
        self.check_invariant();
        previously_unread
    }

    /// Remove one entry. Returns it with its former index so it can be restored.
    pub fn remove(&mut self, id: EntryId) -> Option<RemovedEntry<E>> {
        let index = self.position(id)?;
        let entry = self.entries.remove(index);
        self.ids.remove(&id);
        if !entry.is_read() {
            self.unread_count -= 1;
        }
        self.check_invariant();
        Some(RemovedEntry { index, entry })
    }

    /// Put a removed entry back at (or near) its former position.
    ///
    /// No-op if an entry with that id has reappeared meanwhile (for example
    /// via a push or a refresh). Returns whether the entry was inserted and
    /// survived the limit.
    pub fn restore(&mut self, removed: RemovedEntry<E>) -> bool {
        let RemovedEntry { index, entry } = removed;
        let id = entry.id();
        if self.ids.contains(&id) {
            return false;
        }
        if !entry.is_read() {
            self.unread_count += 1;
        }
        let index = index.min(self.entries.len());
        self.ids.insert(id);
        self.entries.insert(index, entry);
        self.enforce_limit();
        self.check_invariant();
        self.ids.contains(&id)
    }

    /// Replace the whole list with a fresh server snapshot.
    ///
    /// The count is recomputed from scratch. Duplicate ids in the input keep
    /// their first occurrence; the limit applies to the result.
    pub fn replace_all(&mut self, entries: Vec<E>) {
        self.entries.clear();
        self.ids.clear();
        for entry in entries {
            if self.ids.insert(entry.id()) {
                self.entries.push(entry);
            }
        }
        if let Some(limit) = self.limit {
            self.entries.truncate(limit);
            self.ids = self.entries.iter().map(|e| e.id()).collect();
        }
        self.unread_count = self.scan_unread();
    }

    /// Drop everything (session ended or role changed).
    pub fn clear(&mut self) {
        self.entries.clear();
        self.ids.clear();
        self.unread_count = 0;
    }

    fn set_read(&mut self, id: EntryId, read: bool) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };
        let entry = &mut self.entries[index];
        if entry.is_read() == read {
            return false;
        }
        entry.set_read(read);
        if read {
            self.unread_count -= 1;
        } else {
            self.unread_count += 1;
        }
        true
    }

    fn position(&self, id: EntryId) -> Option<usize> {
        if !self.ids.contains(&id) {
            return None;
        }
        self.entries.iter().position(|e| e.id() == id)
    }

    // Evicted unread entries leave the count too, or it would drift from the list.
    fn enforce_limit(&mut self) {
        let Some(limit) = self.limit else {
            return;
        };
        while self.entries.len() > limit {
            if let Some(evicted) = self.entries.pop() {
                self.ids.remove(&evicted.id());
                if !evicted.is_read() {
                    self.unread_count -= 1;
                }
            }
        }
    }

    fn check_invariant(&self) {
        debug_assert_eq!(self.unread_count, self.scan_unread());
        debug_assert_eq!(self.ids.len(), self.entries.len());
    }
}
