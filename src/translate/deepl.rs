use futures::future::BoxFuture;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::provider::{response_detail, ProviderError, TranslationProvider};

const NAME: &str = "deepl";

/// DeepL backend: form-encoded request against the free-tier host, target
/// language uppercased per the API convention.
pub struct DeepLProvider {
    base_url: String,
}

impl Default for DeepLProvider {
    fn default() -> Self {
        DeepLProvider {
            base_url: "https://api-free.deepl.com".to_string(),
        }
    }
}

impl DeepLProvider {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        DeepLProvider {
            base_url: base_url.into(),
        }
    }
}

#[derive(Deserialize)]
struct DeepLResponse {
    translations: Vec<DeepLTranslation>,
}

#[derive(Deserialize)]
struct DeepLTranslation {
    text: String,
}

impl TranslationProvider for DeepLProvider {
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
            let target = target_lang.to_uppercase();
            let params = [("text", text), ("target_lang", target.as_str())];

            let response = client
                .post(format!("{}/v2/translate", self.base_url))
                .header(
                    "Authorization",
                    format!("DeepL-Auth-Key {}", credential.expose_secret()),
                )
                .form(&params)
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

            let parsed: DeepLResponse =
                response
                    .json()
                    .await
                    .map_err(|source| ProviderError::Request {
                        provider: NAME,
                        source,
                    })?;

            parsed
                .translations
                .into_iter()
                .next()
                .map(|t| t.text)
                .ok_or(ProviderError::MalformedResponse { provider: NAME })
        })
    }
}
