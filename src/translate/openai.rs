use futures::future::BoxFuture;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::provider::{response_detail, ProviderError, TranslationProvider};

const NAME: &str = "openai";
const MODEL: &str = "gpt-3.5-turbo";

/// OpenAI chat-completion backend: translation phrased as a single user
/// message, low temperature to keep the output literal.
pub struct OpenAiProvider {
    base_url: String,
}

impl Default for OpenAiProvider {
    fn default() -> Self {
        OpenAiProvider {
            base_url: "https://api.openai.com".to_string(),
        }
    }
}

impl OpenAiProvider {
    /// Point the backend at a different host (local gateways, tests).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        OpenAiProvider {
            base_url: base_url.into(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

impl TranslationProvider for OpenAiProvider {
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
            let body = ChatRequest {
                model: MODEL,
                messages: vec![ChatMessage {
                    role: "user",
                    content: format!(
                        "Translate the following text to {}. \
                         Only return the translation, no explanations:\n\n{}",
                        target_lang, text
                    ),
                }],
                temperature: 0.3,
                max_tokens: 2000,
            };

            let response = client
                .post(format!("{}/v1/chat/completions", self.base_url))
                .bearer_auth(credential.expose_secret())
                .json(&body)
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

            let parsed: ChatResponse =
                response
                    .json()
                    .await
                    .map_err(|source| ProviderError::Request {
                        provider: NAME,
                        source,
                    })?;

            let content = parsed
                .choices
                .into_iter()
                .next()
                .map(|choice| choice.message.content)
                .ok_or(ProviderError::MalformedResponse { provider: NAME })?;

            Ok(content.trim().to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credential() -> SecretString {
        SecretString::from("sk-test-key")
    }

    #[tokio::test]
    async fn test_sends_chat_completion_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer sk-test-key"))
            .and(body_partial_json(json!({
                "model": "gpt-3.5-turbo",
                "temperature": 0.3,
                "max_tokens": 2000,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "  你好  "}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = OpenAiProvider::with_base_url(server.uri());
        let client = reqwest::Client::new();
        let translated = provider
            .translate(&client, "hello", "zh-CN", &credential())
            .await
            .unwrap();

        assert_eq!(translated, "你好", "reply is trimmed");
    }

    #[tokio::test]
    async fn test_prompt_names_the_target_language() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "messages": [{
                    "role": "user",
                    "content": "Translate the following text to fr. \
                                Only return the translation, no explanations:\n\nhello"
                }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "bonjour"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = OpenAiProvider::with_base_url(server.uri());
        let client = reqwest::Client::new();
        let translated = provider
            .translate(&client, "hello", "fr", &credential())
            .await
            .unwrap();

        assert_eq!(translated, "bonjour");
    }

    #[tokio::test]
    async fn test_non_success_status_carries_detail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::with_base_url(server.uri());
        let client = reqwest::Client::new();
        let err = provider
            .translate(&client, "hello", "zh-CN", &credential())
            .await
            .unwrap_err();

        match err {
            ProviderError::Api {
                provider, status, detail,
            } => {
                assert_eq!(provider, "openai");
                assert_eq!(status, 401);
                assert_eq!(detail, "invalid api key");
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_choices_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::with_base_url(server.uri());
        let client = reqwest::Client::new();
        let err = provider
            .translate(&client, "hello", "zh-CN", &credential())
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::MalformedResponse { .. }));
    }
}
