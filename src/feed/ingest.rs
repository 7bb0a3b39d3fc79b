//! Subscription and refresh orchestration.
//!
//! Ties the fetcher, normalizer, and storage layers together: `add_feed`
//! subscribes (fetch-before-persist), `refresh_feed` ingests new items for
//! one feed, and `refresh_all` runs the whole subscription list with
//! bounded concurrency.

use anyhow::{anyhow, Result};
use futures::stream::{self, StreamExt};
use thiserror::Error;
use tracing::{info, warn};

use crate::storage::{Database, Feed, NewArticle};
use crate::util::{validate_feed_url, UrlValidationError};

use super::fetcher::{fetch_feed, FetchError, RawFeed};
use super::normalizer::normalize_item;
use super::opml::OpmlFeed;

/// How many feeds refresh concurrently during a batch refresh
const MAX_CONCURRENT_REFRESHES: usize = 10;
/// Update interval (minutes) recorded for new subscriptions
const DEFAULT_UPDATE_INTERVAL: i64 = 30;

#[derive(Debug, Error)]
pub enum AddFeedError {
    #[error(transparent)]
    InvalidUrl(#[from] UrlValidationError),
    #[error("already subscribed to {0}")]
    AlreadySubscribed(String),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Database(#[from] anyhow::Error),
}

/// Subscribe to a feed.
///
/// The document is fetched and parsed before anything is persisted, so a
/// dead URL never leaves a feed row behind. On success the feed row, its
/// initial articles, and `last_update` are all in place, and the returned
/// feed reflects them.
pub async fn add_feed(
    db: &Database,
    client: &reqwest::Client,
    url: &str,
    category: &str,
) -> Result<Feed, AddFeedError> {
    validate_feed_url(url)?;

    if db.get_feed_by_url(url).await?.is_some() {
        return Err(AddFeedError::AlreadySubscribed(url.to_string()));
    }

    let raw = fetch_feed(client, url).await?;
    let title = feed_title(&raw, url);

    let feed = db
        .insert_feed(url, &title, category, DEFAULT_UPDATE_INTERVAL)
        .await?;
    let items = normalize_all(raw);
    let new_articles = db.ingest_articles(feed.id, &items).await?;

    info!(feed_id = feed.id, url, new_articles, "subscribed to feed");

    db.get_feed(feed.id)
        .await?
        .ok_or_else(|| AddFeedError::Database(anyhow!("feed {} missing after insert", feed.id)))
}

/// Refresh one feed, returning how many new articles were stored.
///
/// Failures never propagate: they are logged and reported as zero progress,
/// so one dead feed cannot abort a batch refresh.
pub async fn refresh_feed(db: &Database, client: &reqwest::Client, feed: &Feed) -> usize {
    match try_refresh(db, client, feed).await {
        Ok(new_articles) => {
            if new_articles > 0 {
                info!(feed_id = feed.id, new_articles, "feed refreshed");
            }
            new_articles
        }
        Err(e) => {
            warn!(feed_id = feed.id, url = %feed.url, error = %e, "feed refresh failed");
            0
        }
    }
}

async fn try_refresh(
    db: &Database,
    client: &reqwest::Client,
    feed: &Feed,
) -> Result<usize, FetchError> {
    let raw = fetch_feed(client, &feed.url).await?;

    // Feeds occasionally rename themselves; keep the stored title current
    if let Some(title) = raw.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        if title != feed.title {
            db.update_feed_title(feed.id, title)
                .await
                .map_err(|e| FetchError::Database(e.to_string()))?;
        }
    }

    let items = normalize_all(raw);
    db.ingest_articles(feed.id, &items)
        .await
        .map_err(|e| FetchError::Database(e.to_string()))
}

/// Outcome of refreshing a single feed during a batch refresh
#[derive(Debug)]
pub struct RefreshOutcome {
    pub feed_id: i64,
    pub title: String,
    pub new_articles: usize,
}

/// Refresh every subscribed feed with bounded concurrency.
///
/// Always yields one outcome per feed; failed feeds report zero new
/// articles. Only the initial subscription query can fail.
pub async fn refresh_all(db: &Database, client: &reqwest::Client) -> Result<Vec<RefreshOutcome>> {
    let feeds = db.get_feeds().await?;
    if feeds.is_empty() {
        return Ok(Vec::new());
    }

    info!(feed_count = feeds.len(), "refreshing all feeds");

    let outcomes: Vec<RefreshOutcome> = stream::iter(feeds)
        .map(|feed| {
            let db = db.clone();
            let client = client.clone();
            async move {
                let new_articles = refresh_feed(&db, &client, &feed).await;
                RefreshOutcome {
                    feed_id: feed.id,
                    title: feed.title,
                    new_articles,
                }
            }
        })
        .buffer_unordered(MAX_CONCURRENT_REFRESHES)
        .collect()
        .await;

    Ok(outcomes)
}

/// Outcome of an OPML import
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportOutcome {
    pub imported: usize,
    pub skipped: usize,
}

/// Import parsed OPML subscriptions into the database.
///
/// Entries are inserted without a validation fetch, so importing a large
/// subscription list completes offline; the next refresh populates
/// articles. URLs already subscribed are skipped and counted.
pub async fn import_feeds(db: &Database, feeds: &[OpmlFeed]) -> Result<ImportOutcome> {
    let mut outcome = ImportOutcome::default();

    for entry in feeds {
        if db.get_feed_by_url(&entry.xml_url).await?.is_some() {
            outcome.skipped += 1;
            continue;
        }
        db.insert_feed(
            &entry.xml_url,
            &entry.title,
            &entry.category,
            DEFAULT_UPDATE_INTERVAL,
        )
        .await?;
        outcome.imported += 1;
    }

    info!(
        imported = outcome.imported,
        skipped = outcome.skipped,
        "imported OPML subscriptions"
    );
    Ok(outcome)
}

fn feed_title(raw: &RawFeed, url: &str) -> String {
    raw.title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| url.to_string())
}

fn normalize_all(raw: RawFeed) -> Vec<NewArticle> {
    raw.items.into_iter().map(normalize_item).collect()
}
