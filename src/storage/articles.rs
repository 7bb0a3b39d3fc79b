use anyhow::Result;
use sqlx::QueryBuilder;

use super::schema::Database;
use super::types::{Article, NewArticle};

// ============================================================================
// Query Limit Constants
// ============================================================================

/// Maximum number of articles to return from any single query (OOM protection)
const MAX_ARTICLES: i64 = 2000;

/// Retention horizon applied when the caller does not pick one
pub const DEFAULT_RETENTION_DAYS: i64 = 30;

const SELECT_ARTICLE: &str = "SELECT id, feed_id, guid, title, link, content, summary, \
                              author, published, read, starred, thumbnail FROM articles";

impl Database {
    // ========================================================================
    // Ingestion
    // ========================================================================

    /// Ingest normalized items for a feed, returning the number of articles
    /// actually inserted.
    ///
    /// Items whose (feed_id, guid) already exists are skipped entirely: no
    /// metadata is rewritten and read/starred state is untouched. The skip is
    /// enforced by `INSERT OR IGNORE` against the UNIQUE(feed_id, guid)
    /// constraint rather than a separate existence check, so two tasks
    /// ingesting overlapping item sets cannot race into duplicate rows.
    ///
    /// After the inserts, the feed's unread count is recomputed from its
    /// articles and persisted together with a fresh last_update timestamp.
    /// Everything happens in one transaction. Safe to call repeatedly with
    /// overlapping item sets.
    ///
    /// Batch size of 50 keeps bind parameters well under SQLite's 999 limit
    /// (9 columns * 50 = 450). Insert counts come from `changes()` instead of
    /// before/after COUNT scans.
    pub async fn ingest_articles(&self, feed_id: i64, items: &[NewArticle]) -> Result<usize> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        const BATCH_SIZE: usize = 50;
        let mut total_inserted: usize = 0;

        for chunk in items.chunks(BATCH_SIZE) {
            let mut builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(
                "INSERT OR IGNORE INTO articles \
                 (feed_id, guid, title, link, content, summary, author, published, thumbnail) ",
            );

            builder.push_values(chunk, |mut b, item| {
                b.push_bind(feed_id)
                    .push_bind(&item.guid)
                    .push_bind(&item.title)
                    .push_bind(&item.link)
                    .push_bind(&item.content)
                    .push_bind(&item.summary)
                    .push_bind(&item.author)
                    .push_bind(item.published)
                    .push_bind(&item.thumbnail);
            });

            builder.build().execute(&mut *tx).await?;

            let changes: (i64,) = sqlx::query_as("SELECT changes()")
                .fetch_one(&mut *tx)
                .await?;
            total_inserted += changes.0 as usize;
        }

        // A successful ingest always counts as a refresh, even when the feed
        // had nothing new
        recount_unread(&mut tx, feed_id).await?;
        sqlx::query("UPDATE feeds SET last_update = ? WHERE id = ?")
            .bind(now)
            .bind(feed_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(total_inserted)
    }

    // ========================================================================
    // Article Queries
    // ========================================================================

    /// Get articles for a specific feed, newest first, with an optional
    /// pagination limit (default 500, hard cap 2000)
    pub async fn get_articles_for_feed(
        &self,
        feed_id: i64,
        limit: Option<i64>,
    ) -> Result<Vec<Article>> {
        let limit = limit.unwrap_or(500).min(MAX_ARTICLES);

        let articles = sqlx::query_as::<_, Article>(&format!(
            "{SELECT_ARTICLE} WHERE feed_id = ? ORDER BY published DESC, id DESC LIMIT ?"
        ))
        .bind(feed_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(articles)
    }

    /// Get the most recent articles across all feeds
    pub async fn get_recent_articles(&self, limit: i64) -> Result<Vec<Article>> {
        let limit = limit.min(MAX_ARTICLES);

        let articles = sqlx::query_as::<_, Article>(&format!(
            "{SELECT_ARTICLE} ORDER BY published DESC, id DESC LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(articles)
    }

    /// Get a single article by its ID
    pub async fn get_article(&self, article_id: i64) -> Result<Option<Article>> {
        let article = sqlx::query_as::<_, Article>(&format!("{SELECT_ARTICLE} WHERE id = ?"))
            .bind(article_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(article)
    }

    /// Look up an article by its dedup key
    pub async fn get_article_by_guid(&self, feed_id: i64, guid: &str) -> Result<Option<Article>> {
        let article =
            sqlx::query_as::<_, Article>(&format!("{SELECT_ARTICLE} WHERE feed_id = ? AND guid = ?"))
                .bind(feed_id)
                .bind(guid)
                .fetch_optional(&self.pool)
                .await?;

        Ok(article)
    }

    // ========================================================================
    // Article Mutations
    // ========================================================================

    /// Mark an article as read (idempotent), returning whether it changed.
    ///
    /// `WHERE read = 0` makes repeated calls no-ops; the owning feed's unread
    /// count is recomputed only when the flag actually flipped.
    pub async fn mark_article_read(&self, article_id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(i64,)> = sqlx::query_as(
            "UPDATE articles SET read = 1 WHERE id = ? AND read = 0 RETURNING feed_id",
        )
        .bind(article_id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some((feed_id,)) = row {
            recount_unread(&mut tx, feed_id).await?;
        }

        tx.commit().await?;
        Ok(row.is_some())
    }

    /// Mark every unread article in a feed as read, returning how many changed
    pub async fn mark_all_read(&self, feed_id: i64) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("UPDATE articles SET read = 1 WHERE feed_id = ? AND read = 0")
            .bind(feed_id)
            .execute(&mut *tx)
            .await?;
        recount_unread(&mut tx, feed_id).await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }

    /// Atomically toggle starred status, returning the new value.
    ///
    /// Uses SQLite's RETURNING clause so the toggle and the readback are one
    /// operation. `None` means the article does not exist.
    pub async fn toggle_article_starred(&self, article_id: i64) -> Result<Option<bool>> {
        let row: Option<(bool,)> = sqlx::query_as(
            "UPDATE articles SET starred = NOT starred WHERE id = ? RETURNING starred",
        )
        .bind(article_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(starred,)| starred))
    }

    /// Delete a single article, cascading to its translations.
    ///
    /// Returns whether a row was removed. The owning feed's unread count is
    /// recomputed in the same transaction.
    pub async fn delete_article(&self, article_id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(i64,)> =
            sqlx::query_as("DELETE FROM articles WHERE id = ? RETURNING feed_id")
                .bind(article_id)
                .fetch_optional(&mut *tx)
                .await?;

        if let Some((feed_id,)) = row {
            recount_unread(&mut tx, feed_id).await?;
        }

        tx.commit().await?;
        Ok(row.is_some())
    }

    // ========================================================================
    // Retention Sweep
    // ========================================================================

    /// Remove non-starred articles published more than `days` days ago.
    ///
    /// Starred articles are always retained regardless of age. Unread counts
    /// of the affected feeds are recomputed in the same transaction. Returns
    /// the number of articles removed.
    pub async fn prune_articles(&self, days: i64) -> Result<u64> {
        let cutoff = chrono::Utc::now().timestamp() - days * 86_400;
        let mut tx = self.pool.begin().await?;

        let affected: Vec<(i64,)> = sqlx::query_as(
            "SELECT DISTINCT feed_id FROM articles WHERE published < ? AND starred = 0",
        )
        .bind(cutoff)
        .fetch_all(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM articles WHERE published < ? AND starred = 0")
            .bind(cutoff)
            .execute(&mut *tx)
            .await?;

        for (feed_id,) in &affected {
            recount_unread(&mut tx, *feed_id).await?;
        }

        tx.commit().await?;
        Ok(result.rows_affected())
    }
}

/// Recompute a feed's cached unread count from its articles.
///
/// Runs inside the caller's transaction so the count commits atomically with
/// the mutation that changed it.
async fn recount_unread(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    feed_id: i64,
) -> Result<()> {
    sqlx::query(
        "UPDATE feeds SET unread_count = \
         (SELECT COUNT(*) FROM articles WHERE feed_id = ? AND read = 0) \
         WHERE id = ?",
    )
    .bind(feed_id)
    .bind(feed_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
