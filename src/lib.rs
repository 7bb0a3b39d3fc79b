//! babelfeed: an RSS reader that translates articles on demand.
//!
//! Feeds are fetched over HTTP, parsed with feed-rs, normalized into
//! stable article records, and stored in SQLite. Articles are translated
//! lazily through a pluggable provider registry (OpenAI, DeepL, Google),
//! with every successful translation cached so a given article/language
//! pair costs at most one provider call.
//!
//! Module map:
//!
//! - [`config`] - optional TOML configuration, seeds first-run settings
//! - [`feed`] - fetch/normalize/ingest pipeline plus OPML import/export
//! - [`storage`] - SQLite persistence for feeds, articles, translations,
//!   and the settings row
//! - [`translate`] - provider trait, backend implementations, and the
//!   cache-first translation service
//! - [`util`] - URL validation and HTML text helpers

pub mod config;
pub mod feed;
pub mod storage;
pub mod translate;
pub mod util;
