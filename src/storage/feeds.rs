use anyhow::Result;

use super::schema::Database;
use super::types::Feed;

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Insert a new feed subscription and return the persisted row.
    ///
    /// The unread count starts at 0; `last_update` stays NULL until the first
    /// successful ingest. Fails if the URL is already subscribed (UNIQUE).
    pub async fn insert_feed(
        &self,
        url: &str,
        title: &str,
        category: &str,
        update_interval: i64,
    ) -> Result<Feed> {
        let feed = sqlx::query_as::<_, Feed>(
            r#"
            INSERT INTO feeds (url, title, category, update_interval)
            VALUES (?, ?, ?, ?)
            RETURNING id, url, title, category, update_interval, last_update, unread_count
        "#,
        )
        .bind(url)
        .bind(title)
        .bind(category)
        .bind(update_interval)
        .fetch_one(&self.pool)
        .await?;

        Ok(feed)
    }

    /// Get all feeds ordered by title.
    ///
    /// `unread_count` comes straight from the cached column; every mutation
    /// that affects it recounts before committing, so no join is needed here.
    pub async fn get_feeds(&self) -> Result<Vec<Feed>> {
        let feeds = sqlx::query_as::<_, Feed>(
            r#"
            SELECT id, url, title, category, update_interval, last_update, unread_count
            FROM feeds
            ORDER BY title
        "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(feeds)
    }

    /// Get a single feed by its ID
    pub async fn get_feed(&self, feed_id: i64) -> Result<Option<Feed>> {
        let feed = sqlx::query_as::<_, Feed>(
            r#"
            SELECT id, url, title, category, update_interval, last_update, unread_count
            FROM feeds
            WHERE id = ?
        "#,
        )
        .bind(feed_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(feed)
    }

    /// Get a single feed by its subscription URL
    pub async fn get_feed_by_url(&self, url: &str) -> Result<Option<Feed>> {
        let feed = sqlx::query_as::<_, Feed>(
            r#"
            SELECT id, url, title, category, update_interval, last_update, unread_count
            FROM feeds
            WHERE url = ?
        "#,
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(feed)
    }

    /// Refresh a feed's display title (feeds occasionally rename themselves)
    pub async fn update_feed_title(&self, feed_id: i64, title: &str) -> Result<()> {
        sqlx::query("UPDATE feeds SET title = ? WHERE id = ?")
            .bind(title)
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete a feed, cascading to its articles and their translations.
    ///
    /// Returns whether a row was actually removed.
    pub async fn delete_feed(&self, feed_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM feeds WHERE id = ?")
            .bind(feed_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
