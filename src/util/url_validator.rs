use thiserror::Error;
use url::Url;

/// Errors produced when validating a subscription URL.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL has no host component.
    #[error("URL has no host")]
    MissingHost,
}

/// Validate a URL string for use as a feed source.
///
/// Accepts only absolute http/https URLs with a host. Applied to both
/// user-supplied subscription URLs and every `xmlUrl` found in an OPML
/// import, so `file://` and friends never reach the fetcher.
///
/// # Examples
///
/// ```
/// use babelfeed::util::validate_feed_url;
///
/// let url = validate_feed_url("https://example.com/feed.xml").unwrap();
/// assert_eq!(url.host_str(), Some("example.com"));
///
/// assert!(validate_feed_url("file:///etc/passwd").is_err());
/// assert!(validate_feed_url("not a url").is_err());
/// ```
pub fn validate_feed_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str)?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    if url.host_str().is_none() {
        return Err(UrlValidationError::MissingHost);
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_urls() {
        assert!(validate_feed_url("https://example.com/feed.xml").is_ok());
        assert!(validate_feed_url("http://news.example.org").is_ok());
        assert!(validate_feed_url("https://example.com:8443/rss").is_ok());
        // Local addresses are legitimate feed sources for a personal reader
        assert!(validate_feed_url("http://127.0.0.1:8080/feed").is_ok());
    }

    #[test]
    fn test_invalid_schemes() {
        assert!(validate_feed_url("file:///etc/passwd").is_err());
        assert!(validate_feed_url("ftp://example.com").is_err());
        assert!(validate_feed_url("javascript:alert(1)").is_err());
    }

    #[test]
    fn test_unparseable_rejected() {
        assert!(validate_feed_url("not a url").is_err());
        assert!(validate_feed_url("").is_err());
    }
}
