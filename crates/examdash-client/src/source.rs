//! REST feed source over `reqwest`.
//!
//! Routes, relative to the API base URL:
//!
//! | Operation | Request |
//! |-----------|---------|
//! | list | `GET {base}/{path}` |
//! | mark read | `PATCH {base}/{path}/{id}/read` |
//! | mark all read | `PATCH {base}/{path}/read-all` |
//! | remove | `DELETE {base}/{path}/{id}` |
//!
//! List responses are either a bare JSON array or `{"data": [...]}`.

use std::marker::PhantomData;
use std::time::Instant;

use async_trait::async_trait;
use examdash_core::{defaults, EntryId, Error, FeedEntry, FeedKey, FeedSource, Result};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::ClientConfig;

/// URL path segment of a feed's REST resource.
pub fn default_path(feed: FeedKey) -> &'static str {
    match feed {
        FeedKey::Notifications => defaults::NOTIFICATIONS_PATH,
        FeedKey::ActivityLogs => defaults::ACTIVITY_LOGS_PATH,
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListBody<E> {
    Bare(Vec<E>),
    Wrapped { data: Vec<E> },
}

impl<E> ListBody<E> {
    fn into_entries(self) -> Vec<E> {
        match self {
            ListBody::Bare(entries) | ListBody::Wrapped { data: entries } => entries,
        }
    }
}

/// Feed source backed by the dashboard's REST API.
pub struct HttpFeedSource<E> {
    client: Client,
    base_url: String,
    path: String,
    token: Option<String>,
    _entry: PhantomData<fn() -> E>,
}

impl<E: FeedEntry + DeserializeOwned> HttpFeedSource<E> {
    /// Source for `E`'s feed at its default path.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;
        let mut source = Self::with_client(client, &config.api_url, default_path(E::FEED));
        source.token = config.token.clone();
        Ok(source)
    }

    pub fn with_client(client: Client, base_url: &str, path: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            path: path.trim_matches('/').to_string(),
            token: None,
            _entry: PhantomData,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn list_url(&self) -> String {
        format!("{}/{}", self.base_url, self.path)
    }

    pub fn item_url(&self, id: EntryId) -> String {
        format!("{}/{}/{}", self.base_url, self.path, id)
    }

    pub fn read_url(&self, id: EntryId) -> String {
        format!("{}/read", self.item_url(id))
    }

    pub fn read_all_url(&self) -> String {
        format!("{}/read-all", self.list_url())
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send a mutating request; any non-2xx is a mutation error.
    async fn confirm(&self, op: &'static str, request: RequestBuilder) -> Result<()> {
        let start = Instant::now();
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| Error::Mutation(format!("{} request failed: {}", op, e)))?;
        let response = check_status(response, Error::Mutation).await?;
        debug!(
            feed = %E::FEED,
            op,
            status = %response.status(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Mutation confirmed"
        );
        Ok(())
    }
}

async fn check_status(response: Response, wrap: fn(String) -> Error) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(Error::Unauthorized(format!("server returned {}", status)));
    }
    Err(wrap(format!("server returned {}: {}", status, body)))
}

#[async_trait]
impl<E> FeedSource<E> for HttpFeedSource<E>
where
    E: FeedEntry + DeserializeOwned,
{
    async fn list(&self) -> Result<Vec<E>> {
        let start = Instant::now();
        let url = self.list_url();
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|e| Error::Fetch(format!("GET {} failed: {}", url, e)))?;
        let response = check_status(response, Error::Fetch).await?;
        let body: ListBody<E> = response.json().await.map_err(|e| {
            warn!(feed = %E::FEED, error = %e, "Undecodable list response");
            Error::Decode(format!("Failed to parse {} list: {}", E::FEED, e))
        })?;
        let entries = body.into_entries();
        debug!(
            feed = %E::FEED,
            entry_count = entries.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Feed list fetched"
        );
        Ok(entries)
    }

    async fn mark_read(&self, id: EntryId) -> Result<()> {
        self.confirm("mark_read", self.client.patch(self.read_url(id)))
            .await
    }

    async fn mark_all_read(&self) -> Result<()> {
        self.confirm("mark_all_read", self.client.patch(self.read_all_url()))
            .await
    }

    async fn remove(&self, id: EntryId) -> Result<()> {
        self.confirm("remove", self.client.delete(self.item_url(id)))
            .await
    }
}
