use anyhow::Result;

use super::schema::Database;
use super::types::{Settings, SettingsUpdate};

const SELECT_SETTINGS: &str = "SELECT theme, font_size, provider, api_key, auto_mark_read, \
                               refresh_interval, target_language FROM settings WHERE id = 1";

impl Database {
    // ========================================================================
    // Settings Operations
    // ========================================================================

    /// Get the settings row, creating it with defaults on first access.
    ///
    /// `INSERT OR IGNORE` makes the create-if-missing step race-free: two
    /// tasks calling this concurrently both end up reading the same row.
    pub async fn get_settings(&self) -> Result<Settings> {
        self.ensure_settings_row().await?;

        let settings = sqlx::query_as::<_, Settings>(SELECT_SETTINGS)
            .fetch_one(&self.pool)
            .await?;

        Ok(settings)
    }

    /// Apply a partial update to the settings row and return the result.
    ///
    /// `None` fields keep their stored value (COALESCE against the bound
    /// NULL), so callers never need a read-modify-write cycle.
    pub async fn update_settings(&self, update: &SettingsUpdate) -> Result<Settings> {
        self.ensure_settings_row().await?;

        if !update.is_empty() {
            sqlx::query(
                r#"
                UPDATE settings SET
                    theme = COALESCE(?, theme),
                    font_size = COALESCE(?, font_size),
                    provider = COALESCE(?, provider),
                    api_key = COALESCE(?, api_key),
                    auto_mark_read = COALESCE(?, auto_mark_read),
                    refresh_interval = COALESCE(?, refresh_interval),
                    target_language = COALESCE(?, target_language)
                WHERE id = 1
            "#,
            )
            .bind(&update.theme)
            .bind(update.font_size)
            .bind(&update.provider)
            .bind(&update.api_key)
            .bind(update.auto_mark_read)
            .bind(update.refresh_interval)
            .bind(&update.target_language)
            .execute(&self.pool)
            .await?;
        }

        let settings = sqlx::query_as::<_, Settings>(SELECT_SETTINGS)
            .fetch_one(&self.pool)
            .await?;

        Ok(settings)
    }

    /// Create the settings row from `seed` values if it does not exist yet.
    ///
    /// An existing row is left untouched, so values persisted by earlier
    /// runs always win over the configuration file that produced the seed.
    pub async fn seed_settings(&self, seed: &SettingsUpdate) -> Result<Settings> {
        let defaults = Settings::default();
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO settings
                (id, theme, font_size, provider, api_key, auto_mark_read, refresh_interval, target_language)
            VALUES (1, ?, ?, ?, ?, ?, ?, ?)
        "#,
        )
        .bind(seed.theme.as_deref().unwrap_or(&defaults.theme))
        .bind(seed.font_size.unwrap_or(defaults.font_size))
        .bind(seed.provider.as_deref().unwrap_or(&defaults.provider))
        .bind(seed.api_key.as_deref().unwrap_or(&defaults.api_key))
        .bind(seed.auto_mark_read.unwrap_or(defaults.auto_mark_read))
        .bind(seed.refresh_interval.unwrap_or(defaults.refresh_interval))
        .bind(
            seed.target_language
                .as_deref()
                .unwrap_or(&defaults.target_language),
        )
        .execute(&self.pool)
        .await?;

        let settings = sqlx::query_as::<_, Settings>(SELECT_SETTINGS)
            .fetch_one(&self.pool)
            .await?;

        Ok(settings)
    }

    async fn ensure_settings_row(&self) -> Result<()> {
        self.seed_settings(&SettingsUpdate::default()).await?;
        Ok(())
    }
}
