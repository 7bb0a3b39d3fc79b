use std::time::Duration;

use futures::StreamExt;
use thiserror::Error;

use super::normalizer::RawItem;

/// Per-request timeout for a feed fetch
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Response body cap (memory protection)
const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while retrieving and parsing a feed document.
///
/// Feed-level by design: batch refresh converts these to a zero-progress
/// result per feed instead of propagating.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the 30-second timeout
    #[error("Request timed out")]
    Timeout,
    /// Document could not be parsed as RSS or Atom
    #[error("Parse error: {0}")]
    Parse(String),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Database operation failed while storing the ingested articles
    #[error("Database error: {0}")]
    Database(String),
}

/// Raw feed document: the channel title plus its items, before normalization
#[derive(Debug, Clone, Default)]
pub struct RawFeed {
    pub title: Option<String>,
    pub items: Vec<RawItem>,
}

/// Fetch a feed document by URL and parse it into a [`RawFeed`].
///
/// The request is bounded by [`REQUEST_TIMEOUT`] and the body by
/// [`MAX_FEED_SIZE`]. No retry here: per-feed failure policy belongs to the
/// caller.
pub async fn fetch_feed(client: &reqwest::Client, url: &str) -> Result<RawFeed, FetchError> {
    let response = tokio::time::timeout(REQUEST_TIMEOUT, client.get(url).send())
        .await
        .map_err(|_| FetchError::Timeout)?
        .map_err(FetchError::Network)?;

    if !response.status().is_success() {
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    let bytes = read_limited_bytes(response, MAX_FEED_SIZE).await?;
    parse_document(&bytes)
}

/// Parse feed XML into the raw item representation the normalizer consumes.
pub fn parse_document(bytes: &[u8]) -> Result<RawFeed, FetchError> {
    let feed = feed_rs::parser::parse(bytes).map_err(|e| FetchError::Parse(e.to_string()))?;

    let title = feed.title.map(|t| t.content);
    let items = feed.entries.into_iter().map(raw_item_from_entry).collect();

    Ok(RawFeed { title, items })
}

/// Flatten a feed-rs entry into the optional-field record the normalizer
/// expects.
///
/// feed-rs already unifies most format differences: RSS `description` lands
/// in `summary`, `content:encoded` in `content`, `dc:creator` in `authors`,
/// and both media-RSS objects and plain enclosures in `media`. The media
/// scan keeps the first image-typed url separate from the first generic
/// enclosure so the normalizer can apply its priority order.
fn raw_item_from_entry(entry: feed_rs::model::Entry) -> RawItem {
    let link = entry.links.first().map(|l| l.href.clone());
    let creator = entry.authors.first().map(|p| p.name.clone());
    let guid = {
        let id = entry.id.trim();
        (!id.is_empty()).then(|| id.to_string())
    };

    let thumbnail_url = entry
        .media
        .iter()
        .flat_map(|m| m.thumbnails.iter())
        .map(|t| t.image.uri.clone())
        .next();

    let mut media_url = None;
    let mut enclosure_url = None;
    let mut enclosure_mime = None;
    for mc in entry.media.iter().flat_map(|m| m.content.iter()) {
        let Some(url) = mc.url.as_ref() else { continue };
        let mime = mc.content_type.as_ref().map(|m| m.to_string());
        if mime.as_deref().is_some_and(|m| m.starts_with("image/")) {
            if media_url.is_none() {
                media_url = Some(url.to_string());
            }
        } else if enclosure_url.is_none() {
            enclosure_url = Some(url.to_string());
            enclosure_mime = mime;
        }
    }

    RawItem {
        title: entry.title.map(|t| t.content),
        link,
        content: None,
        content_encoded: entry.content.and_then(|c| c.body),
        summary: entry.summary.map(|t| t.content),
        creator,
        author: None,
        published: entry.published.or(entry.updated),
        guid,
        thumbnail_url,
        media_url,
        enclosure_url,
        enclosure_mime,
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: reject on Content-Length before reading anything
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
