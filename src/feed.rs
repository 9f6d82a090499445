//! Event feed access and the proposal board built on top of it.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use tracing::{debug, warn};

use crate::errors::CliError;
use crate::proposals::{self, Classification, EventFeed};

pub const DEFAULT_FEED_URL: &str = "http://localhost:8080/serveEvents";

// =============================================================================
// SOURCES
// =============================================================================

#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self) -> Result<EventFeed>;
}

/// The indexer's HTTP endpoint.
pub struct HttpFeed {
    client: Client,
    url: String,
}

impl HttpFeed {
    pub fn new(url: &str) -> Self {
        Self {
            client: Client::new(),
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl FeedSource for HttpFeed {
    async fn fetch(&self) -> Result<EventFeed> {
        debug!("GET {}", self.url);
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| CliError::FeedError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CliError::FeedError(format!("{} returned {}", self.url, response.status())).into());
        }

        let feed = response
            .json::<EventFeed>()
            .await
            .map_err(|e| CliError::FeedError(format!("malformed feed: {}", e)))?;
        Ok(feed)
    }
}

/// A fixed feed, for tests and offline use.
#[derive(Debug, Clone, Default)]
pub struct StaticFeed(pub EventFeed);

#[async_trait]
impl FeedSource for StaticFeed {
    async fn fetch(&self) -> Result<EventFeed> {
        Ok(self.0.clone())
    }
}

// =============================================================================
// BOARD
// =============================================================================

/// Last good feed plus the outcome of the most recent fetch.
///
/// A failed fetch never replaces data that loaded earlier; the error is kept
/// alongside it until the next successful fetch.
#[derive(Debug, Default)]
pub struct ProposalBoard {
    feed: Option<EventFeed>,
    last_error: Option<String>,
    loading: bool,
}

impl ProposalBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_load(&mut self) {
        self.loading = true;
    }

    pub fn apply(&mut self, fetched: Result<EventFeed>) {
        self.loading = false;
        match fetched {
            Ok(feed) => {
                debug!(
                    "feed loaded: {} proposals, {} votes, {} executions",
                    feed.proposals_created.len(),
                    feed.proposals_voted.len(),
                    feed.proposals_executed.len()
                );
                self.feed = Some(feed);
                self.last_error = None;
            }
            Err(e) => {
                warn!("feed fetch failed: {:#}", e);
                self.last_error = Some(format!("{:#}", e));
            }
        }
    }

    pub async fn load<F: FeedSource + ?Sized>(&mut self, source: &F) {
        self.begin_load();
        let fetched = source.fetch().await;
        self.apply(fetched);
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn feed(&self) -> Option<&EventFeed> {
        self.feed.as_ref()
    }

    /// True when the shown data is older than a failed fetch.
    pub fn is_stale(&self) -> bool {
        self.feed.is_some() && self.last_error.is_some()
    }

    /// Classify whatever data is held. Empty when nothing ever loaded.
    pub fn classify(&self, now: DateTime<Utc>) -> Classification<'_> {
        self.feed
            .as_ref()
            .map(|feed| proposals::classify(feed, now))
            .unwrap_or_default()
    }
}
