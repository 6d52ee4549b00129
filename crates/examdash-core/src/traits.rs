//! Collaborator interfaces the synchronization core depends on.
//!
//! These traits keep the REST backend out of the core so feed controllers can
//! be exercised against in-memory fakes.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{EntryId, FeedEntry};

/// Request/response backend of one feed.
///
/// Success of a mutating call only confirms a mutation the caller has already
/// applied locally; failures are reported back so the caller can compensate.
#[async_trait]
pub trait FeedSource<E: FeedEntry>: Send + Sync {
    /// Full list, most recent first.
    async fn list(&self) -> Result<Vec<E>>;

    async fn mark_read(&self, id: EntryId) -> Result<()>;

    async fn mark_all_read(&self) -> Result<()>;

    async fn remove(&self, id: EntryId) -> Result<()>;
}
