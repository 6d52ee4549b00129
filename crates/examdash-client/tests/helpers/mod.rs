//! Shared fakes for client integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use examdash_core::{
    ActivityAction, ActivityLogEntry, EntryId, Error, FeedEntry, FeedSource, Notification, Result,
};
use tokio::sync::Semaphore;

pub fn notification(id: EntryId) -> Notification {
    Notification::new(
        id,
        format!("Notification {id}"),
        Utc.timestamp_opt(1_760_000_000 + id, 0).unwrap(),
    )
}

pub fn activity(id: EntryId) -> ActivityLogEntry {
    ActivityLogEntry::new(
        id,
        "admin",
        ActivityAction::Update,
        Utc.timestamp_opt(1_760_000_000 + id, 0).unwrap(),
    )
}

pub fn ids<E: FeedEntry>(entries: &[E]) -> Vec<EntryId> {
    entries.iter().map(|e| e.id()).collect()
}

/// Poll `cond` on a short interval until it holds.
pub async fn eventually(mut cond: impl FnMut() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

/// In-memory feed source with switchable failures and a list gate.
pub struct FakeSource<E> {
    entries: Mutex<Vec<E>>,
    hold: AtomicBool,
    gate: Semaphore,
    fail_list: AtomicBool,
    fail_mutations: AtomicBool,
    list_calls: AtomicUsize,
    mutations: Mutex<Vec<String>>,
}

impl<E: FeedEntry> FakeSource<E> {
    pub fn new(entries: Vec<E>) -> Self {
        Self {
            entries: Mutex::new(entries),
            hold: AtomicBool::new(false),
            gate: Semaphore::new(0),
            fail_list: AtomicBool::new(false),
            fail_mutations: AtomicBool::new(false),
            list_calls: AtomicUsize::new(0),
            mutations: Mutex::new(Vec::new()),
        }
    }

    pub fn set_entries(&self, entries: Vec<E>) {
        *self.entries.lock().unwrap() = entries;
    }

    /// Make `list` wait until [`FakeSource::release`] is called.
    pub fn hold_lists(&self) {
        self.hold.store(true, Ordering::SeqCst);
    }

    /// Let one held `list` call finish.
    pub fn release(&self) {
        self.gate.add_permits(1);
    }

    pub fn fail_lists(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    pub fn fail_mutations(&self, fail: bool) {
        self.fail_mutations.store(fail, Ordering::SeqCst);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn mutations(&self) -> Vec<String> {
        self.mutations.lock().unwrap().clone()
    }

    fn record(&self, call: String) -> Result<()> {
        self.mutations.lock().unwrap().push(call.clone());
        if self.fail_mutations.load(Ordering::SeqCst) {
            return Err(Error::Request(format!("{call} rejected")));
        }
        Ok(())
    }
}

#[async_trait]
impl<E: FeedEntry> FeedSource<E> for FakeSource<E> {
    async fn list(&self) -> Result<Vec<E>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.hold.load(Ordering::SeqCst) {
            self.gate.acquire().await.unwrap().forget();
        }
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(Error::Fetch("server unavailable".to_string()));
        }
        Ok(self.entries.lock().unwrap().clone())
    }

    async fn mark_read(&self, id: EntryId) -> Result<()> {
        self.record(format!("mark_read {id}"))
    }

    async fn mark_all_read(&self) -> Result<()> {
        self.record("mark_all_read".to_string())
    }

    async fn remove(&self, id: EntryId) -> Result<()> {
        self.record(format!("remove {id}"))
    }
}
