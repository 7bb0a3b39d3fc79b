use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another instance of the application has locked the database
    #[error("Another instance of babelfeed appears to be running. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5): database is locked
        // SQLITE_LOCKED (6): database table is locked
        // SQLITE_CANTOPEN (14): unable to open database file
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
            || error_string.contains("unable to open database file")
        {
            return DatabaseError::InstanceLocked;
        }

        DatabaseError::Other(err)
    }
}

// ============================================================================
// Constants
// ============================================================================

/// Category label assigned when a feed has none (also used on OPML import)
pub const DEFAULT_CATEGORY: &str = "Uncategorized";

// ============================================================================
// Data Structures
// ============================================================================

/// Feed subscription as stored in the database.
///
/// `unread_count` is a cached derivation: it is recomputed and persisted by
/// every operation that changes article read state or article membership,
/// so reads never need the aggregate join.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Feed {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub category: String,
    /// Desired refresh cadence in minutes (informational; refresh is driven
    /// by the CLI, not a scheduler)
    pub update_interval: i64,
    /// Unix seconds of the last successful refresh
    pub last_update: Option<i64>,
    pub unread_count: i64,
}

/// Article as stored in the database
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Article {
    pub id: i64,
    pub feed_id: i64,
    /// Unique within the owning feed; explicit from the feed or derived
    pub guid: String,
    pub title: String,
    pub link: String,
    pub content: String,
    pub summary: String,
    pub author: Option<String>,
    /// Unix seconds
    pub published: i64,
    pub read: bool,
    pub starred: bool,
    pub thumbnail: Option<String>,
}

/// Canonical item produced by the content normalizer, ready for insertion
#[derive(Debug, Clone, PartialEq)]
pub struct NewArticle {
    pub guid: String,
    pub title: String,
    pub link: String,
    pub content: String,
    pub summary: String,
    pub author: Option<String>,
    /// Unix seconds
    pub published: i64,
    pub thumbnail: Option<String>,
}

/// Cached translation for one (article, target language) pair.
///
/// `source_digest` is a hex SHA-256 of the text that was sent to the
/// provider. It is bookkeeping only: nothing compares it on later reads, so
/// a cached translation survives edits to the underlying article content.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Translation {
    pub id: i64,
    pub article_id: i64,
    pub source_digest: String,
    pub target_lang: String,
    pub translated_text: String,
    /// Unix seconds
    pub created_at: i64,
}

// ============================================================================
// Settings
// ============================================================================

/// Singleton application settings row (id is always 1).
///
/// `api_key` is the provider credential. It is excluded from `Debug` output
/// so settings can be logged without leaking the secret.
#[derive(Clone, sqlx::FromRow)]
pub struct Settings {
    pub theme: String,
    pub font_size: i64,
    /// Registry name of the selected translation backend
    pub provider: String,
    pub api_key: String,
    pub auto_mark_read: bool,
    pub refresh_interval: i64,
    pub target_language: String,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("theme", &self.theme)
            .field("font_size", &self.font_size)
            .field("provider", &self.provider)
            .field("api_key", &"[REDACTED]")
            .field("auto_mark_read", &self.auto_mark_read)
            .field("refresh_interval", &self.refresh_interval)
            .field("target_language", &self.target_language)
            .finish()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: "light".to_string(),
            font_size: 16,
            provider: "openai".to_string(),
            api_key: String::new(),
            auto_mark_read: false,
            refresh_interval: 30,
            target_language: "zh-CN".to_string(),
        }
    }
}

/// Partial settings update: `None` fields keep their stored value
#[derive(Clone, Default)]
pub struct SettingsUpdate {
    pub theme: Option<String>,
    pub font_size: Option<i64>,
    pub provider: Option<String>,
    pub api_key: Option<String>,
    pub auto_mark_read: Option<bool>,
    pub refresh_interval: Option<i64>,
    pub target_language: Option<String>,
}

impl std::fmt::Debug for SettingsUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsUpdate")
            .field("theme", &self.theme)
            .field("font_size", &self.font_size)
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("auto_mark_read", &self.auto_mark_read)
            .field("refresh_interval", &self.refresh_interval)
            .field("target_language", &self.target_language)
            .finish()
    }
}

impl SettingsUpdate {
    pub fn is_empty(&self) -> bool {
        self.theme.is_none()
            && self.font_size.is_none()
            && self.provider.is_none()
            && self.api_key.is_none()
            && self.auto_mark_read.is_none()
            && self.refresh_interval.is_none()
            && self.target_language.is_none()
    }
}
