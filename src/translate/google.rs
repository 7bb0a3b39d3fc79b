use futures::future::BoxFuture;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::provider::{response_detail, ProviderError, TranslationProvider};

const NAME: &str = "google";

/// Google Cloud Translation v2 backend.
///
/// The API key travels in the query string per the API contract, so request
/// URLs must stay out of logs.
pub struct GoogleProvider {
    base_url: String,
}

impl Default for GoogleProvider {
    fn default() -> Self {
        GoogleProvider {
            base_url: "https://translation.googleapis.com".to_string(),
        }
    }
}

impl GoogleProvider {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        GoogleProvider {
            base_url: base_url.into(),
        }
    }
}

#[derive(Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    target: &'a str,
}

#[derive(Deserialize)]
struct TranslateResponse {
    data: TranslateData,
}

#[derive(Deserialize)]
struct TranslateData {
    translations: Vec<GoogleTranslation>,
}

#[derive(Deserialize)]
struct GoogleTranslation {
    #[serde(rename = "translatedText")]
    translated_text: String,
}

impl TranslationProvider for GoogleProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    fn translate<'a>(
        &'a self,
        client: &'a reqwest::Client,
        text: &'a str,
        target_lang: &'a str,
        credential: &'a SecretString,
    ) -> BoxFuture<'a, Result<String, ProviderError>> {
        Box::pin(async move {
            let response = client
                .post(format!("{}/language/translate/v2", self.base_url))
                .query(&[("key", credential.expose_secret())])
                .json(&TranslateRequest {
                    q: text,
                    target: target_lang,
                })
                .send()
                .await
                .map_err(|source| ProviderError::Request {
                    provider: NAME,
                    source,
                })?;

            let status = response.status();
            if !status.is_success() {
                let detail = response.text().await.unwrap_or_default();
                return Err(ProviderError::Api {
                    provider: NAME,
                    status: status.as_u16(),
                    detail: response_detail(&detail),
                });
            }

            let parsed: TranslateResponse =
                response
                    .json()
                    .await
                    .map_err(|source| ProviderError::Request {
                        provider: NAME,
                        source,
                    })?;

            parsed
                .data
                .translations
                .into_iter()
                .next()
                .map(|t| t.translated_text)
                .ok_or(ProviderError::MalformedResponse { provider: NAME })
        })
    }
}
