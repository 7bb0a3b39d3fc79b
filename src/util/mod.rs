//! Utility functions for common operations.
//!
//! - **URL validation**: scheme checking for subscription and OPML input
//! - **Text processing**: HTML tag stripping and summary truncation
//!
//! # Examples
//!
//! ```
//! use babelfeed::util::{strip_tags, summarize, validate_feed_url};
//!
//! let url = validate_feed_url("https://example.com/feed.xml").unwrap();
//!
//! let text = strip_tags("<p>Hello <b>world</b></p>"); // "Hello world"
//! let short = summarize("<p>Hello world</p>", 5);     // "Hello..."
//! ```

mod text;
mod url_validator;

pub use text::{strip_tags, summarize};
pub use url_validator::{validate_feed_url, UrlValidationError};
