use secrecy::SecretString;
use thiserror::Error;
use tracing::debug;

use crate::storage::Database;

use super::provider::{ProviderError, ProviderRegistry};

/// Errors from the translation orchestrator.
#[derive(Debug, Error)]
pub enum TranslateError {
    /// Configuration names a provider that is not registered
    #[error("unknown translation provider '{0}'")]
    UnknownProvider(String),
    /// Translation was requested for an article that does not exist
    #[error("article {0} not found")]
    ArticleNotFound(i64),
    /// The backend rejected or failed the request
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Database(#[from] anyhow::Error),
}

/// Coordinates cache lookup, provider dispatch, and cache write-through.
///
/// Construct once at startup and pass by reference; holds the shared HTTP
/// client and the provider registry alongside the database handle.
pub struct Translator {
    db: Database,
    client: reqwest::Client,
    registry: ProviderRegistry,
}

impl Translator {
    pub fn new(db: Database, client: reqwest::Client, registry: ProviderRegistry) -> Self {
        Translator {
            db,
            client,
            registry,
        }
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.registry.names()
    }

    /// Translate a text span, consulting the cache when an article is named.
    ///
    /// With `article_id` set, a cached entry short-circuits the provider
    /// call entirely, and a fresh result is written through before
    /// returning. Without it, nothing is cached. Provider failures
    /// propagate unchanged; there is no retry.
    pub async fn translate(
        &self,
        text: &str,
        target_lang: &str,
        provider_name: &str,
        credential: &SecretString,
        article_id: Option<i64>,
    ) -> Result<String, TranslateError> {
        if let Some(article_id) = article_id {
            if let Some(cached) = self.db.get_translation(article_id, target_lang).await? {
                debug!(article_id, target_lang, "translation cache hit");
                return Ok(cached.translated_text);
            }
        }

        let provider = self
            .registry
            .get(provider_name)
            .ok_or_else(|| TranslateError::UnknownProvider(provider_name.to_string()))?;

        let translated = provider
            .translate(&self.client, text, target_lang, credential)
            .await?;

        if let Some(article_id) = article_id {
            self.db
                .put_translation(article_id, text, target_lang, &translated)
                .await?;
            debug!(article_id, target_lang, provider = provider_name, "translation cached");
        }

        Ok(translated)
    }

    /// Translate a stored article's text into `target_lang`.
    ///
    /// Source text is the article's content, or its summary when the
    /// content is empty. Combined with the cache in [`Self::translate`],
    /// an article reaches any given provider at most once per target
    /// language.
    pub async fn translate_article(
        &self,
        article_id: i64,
        target_lang: &str,
        provider_name: &str,
        credential: &SecretString,
    ) -> Result<String, TranslateError> {
        let article = self
            .db
            .get_article(article_id)
            .await?
            .ok_or(TranslateError::ArticleNotFound(article_id))?;

        let source = if article.content.trim().is_empty() {
            article.summary
        } else {
            article.content
        };

        self.translate(&source, target_lang, provider_name, credential, Some(article_id))
            .await
    }
}

/// Best-effort script classification of a text span.
///
/// Character ranges are checked in priority order: Han, then kana, then
/// hangul, then the default. Advisory only; nothing downstream gates on it.
pub fn detect_language(text: &str) -> &'static str {
    if text.chars().any(|c| matches!(c, '\u{4e00}'..='\u{9fa5}')) {
        "zh"
    } else if text
        .chars()
        .any(|c| matches!(c, '\u{3040}'..='\u{309f}' | '\u{30a0}'..='\u{30ff}'))
    {
        "ja"
    } else if text.chars().any(|c| matches!(c, '\u{ac00}'..='\u{d7af}')) {
        "ko"
    } else {
        "en"
    }
}
