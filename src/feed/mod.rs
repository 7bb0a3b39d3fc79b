//! Feed acquisition: fetching, normalization, subscription management.
//!
//! The pipeline runs in three stages:
//!
//! - [`fetcher`] - bounded HTTP retrieval and RSS/Atom parsing into raw items
//! - [`normalizer`] - per-item normalization (stable identity, summary,
//!   thumbnail selection) into storable articles
//! - [`ingest`] - orchestration: subscribe, refresh one feed, refresh all
//!   with bounded concurrency
//!
//! [`opml`] handles subscription import/export at the edges.

pub mod fetcher;
pub mod ingest;
pub mod normalizer;
pub mod opml;

pub use fetcher::{fetch_feed, FetchError, RawFeed};
pub use ingest::{
    add_feed, import_feeds, refresh_all, refresh_feed, AddFeedError, ImportOutcome,
    RefreshOutcome,
};
pub use normalizer::{normalize_item, RawItem};
pub use opml::{export_to_file, parse, OpmlFeed};
