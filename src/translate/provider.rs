use std::collections::HashMap;

use futures::future::BoxFuture;
use secrecy::SecretString;
use thiserror::Error;

use super::deepl::DeepLProvider;
use super::google::GoogleProvider;
use super::openai::OpenAiProvider;

/// Longest upstream error body kept in a [`ProviderError`]. Backends return
/// arbitrary HTML/JSON on failure; the detail is for operators, not parsing.
const MAX_ERROR_DETAIL: usize = 200;

/// Errors from a translation backend.
///
/// Surfaced to the caller unchanged: a user-initiated translation expects a
/// definitive outcome, so there is no retry layer above this.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Backend answered with a non-success HTTP status
    #[error("{provider} API error: status {status}: {detail}")]
    Api {
        provider: &'static str,
        status: u16,
        detail: String,
    },
    /// Transport-level failure before a usable response arrived
    #[error("{provider} request failed: {source}")]
    Request {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },
    /// Response body did not match the backend's documented shape
    #[error("{provider} returned an unexpected response shape")]
    MalformedResponse { provider: &'static str },
}

/// A translation backend.
///
/// Each implementation owns its own request/response marshaling; the shapes
/// differ enough (chat-completion JSON, form body, nested translation JSON)
/// that nothing is shared beyond this call signature. Credentials pass
/// through as [`SecretString`] and are only exposed at the wire boundary.
pub trait TranslationProvider: Send + Sync {
    /// Name the provider is registered and selected under
    fn name(&self) -> &'static str;

    fn translate<'a>(
        &'a self,
        client: &'a reqwest::Client,
        text: &'a str,
        target_lang: &'a str,
        credential: &'a SecretString,
    ) -> BoxFuture<'a, Result<String, ProviderError>>;
}

/// Name-to-backend mapping. Pure lookup: no retry, rate limiting, or
/// credential handling lives here.
pub struct ProviderRegistry {
    providers: HashMap<&'static str, Box<dyn TranslationProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        ProviderRegistry {
            providers: HashMap::new(),
        }
    }

    /// Registry holding the three built-in backends.
    pub fn with_default_providers() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(OpenAiProvider::default()));
        registry.register(Box::new(DeepLProvider::default()));
        registry.register(Box::new(GoogleProvider::default()));
        registry
    }

    /// Add a backend, replacing any previous one with the same name.
    pub fn register(&mut self, provider: Box<dyn TranslationProvider>) {
        self.providers.insert(provider.name(), provider);
    }

    pub fn get(&self, name: &str) -> Option<&dyn TranslationProvider> {
        self.providers.get(name).map(Box::as_ref)
    }

    /// Registered names, sorted for stable display in errors and help text.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.providers.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_default_providers()
    }
}

/// Bound an upstream error body for inclusion in a [`ProviderError::Api`].
pub(super) fn response_detail(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_ERROR_DETAIL {
        trimmed.to_string()
    } else {
        let mut detail: String = trimmed.chars().take(MAX_ERROR_DETAIL).collect();
        detail.push_str("...");
        detail
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_has_all_backends() {
        let registry = ProviderRegistry::with_default_providers();
        assert_eq!(registry.names(), vec!["deepl", "google", "openai"]);

        assert!(registry.get("openai").is_some());
        assert!(registry.get("deepl").is_some());
        assert!(registry.get("google").is_some());
        assert!(registry.get("babelfish").is_none());
    }

    #[test]
    fn test_response_detail_is_bounded() {
        let short = response_detail("  bad key  ");
        assert_eq!(short, "bad key");

        let long = response_detail(&"x".repeat(500));
        assert_eq!(long.chars().count(), MAX_ERROR_DETAIL + 3);
        assert!(long.ends_with("..."));
    }
}
