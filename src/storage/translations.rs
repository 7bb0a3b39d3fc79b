use anyhow::Result;
use sha2::{Digest, Sha256};

use super::schema::Database;
use super::types::Translation;

/// Hex SHA-256 of the text sent to a provider.
///
/// Stored alongside the translation for change detection bookkeeping. The
/// digest is never compared on the read path, so cached translations are not
/// invalidated when article content changes.
fn fingerprint(source_text: &str) -> String {
    format!("{:x}", Sha256::digest(source_text.as_bytes()))
}

impl Database {
    // ========================================================================
    // Translation Cache Operations
    // ========================================================================

    /// Retrieve the cached translation for one (article, target language)
    /// pair, if any
    pub async fn get_translation(
        &self,
        article_id: i64,
        target_lang: &str,
    ) -> Result<Option<Translation>> {
        let translation = sqlx::query_as::<_, Translation>(
            r#"
            SELECT id, article_id, source_digest, target_lang, translated_text, created_at
            FROM translations
            WHERE article_id = ? AND target_lang = ?
        "#,
        )
        .bind(article_id)
        .bind(target_lang)
        .fetch_optional(&self.pool)
        .await?;

        Ok(translation)
    }

    /// Store a translation under the (article, target language) key.
    ///
    /// Persists a fingerprint of `source_text`, never the text itself. The
    /// UNIQUE(article_id, target_lang) constraint guarantees at most one row
    /// per key; a write racing an identical key resolves last-write-wins,
    /// which is sound because callers consult `get_translation` first and the
    /// racing payloads come from the same source text.
    pub async fn put_translation(
        &self,
        article_id: i64,
        source_text: &str,
        target_lang: &str,
        translated_text: &str,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO translations (article_id, source_digest, target_lang, translated_text, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(article_id, target_lang) DO UPDATE SET
                source_digest = excluded.source_digest,
                translated_text = excluded.translated_text,
                created_at = excluded.created_at
        "#,
        )
        .bind(article_id)
        .bind(fingerprint(source_text))
        .bind(target_lang)
        .bind(translated_text)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// List every cached translation of an article, newest first
    pub async fn list_translations(&self, article_id: i64) -> Result<Vec<Translation>> {
        let translations = sqlx::query_as::<_, Translation>(
            r#"
            SELECT id, article_id, source_digest, target_lang, translated_text, created_at
            FROM translations
            WHERE article_id = ?
            ORDER BY created_at DESC, id DESC
        "#,
        )
        .bind(article_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(translations)
    }
}
