use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::provider::{LlmProvider, Message, Role};

const PROVIDER: &str = "openai";

/// OpenAI chat-completions and embeddings backend.
///
/// Works against any endpoint that speaks the same `/chat/completions` and
/// `/embeddings` protocol (set `base_url` accordingly).
#[derive(Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    embedding_model: String,
    max_tokens: u32,
    temperature: f32,
}

impl fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("embedding_model", &self.embedding_model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl OpenAiProvider {
    /// # Errors
    ///
    /// Returns [`LlmError::Http`] if the HTTP client cannot be constructed.
    pub fn new(
        api_key: String,
        mut base_url: String,
        model: String,
        embedding_model: String,
        max_tokens: u32,
        request_timeout: Duration,
    ) -> Result<Self, LlmError> {
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Ok(Self {
            client: crate::http::default_client(request_timeout)?,
            api_key,
            base_url,
            model,
            embedding_model,
            max_tokens,
            temperature: 0.0,
        })
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    async fn post<B: Serialize + ?Sized>(&self, route: &str, body: &B) -> Result<String, LlmError> {
        let response = self
            .client
            .post(format!("{}/{route}", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.map_err(LlmError::Http)?;

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited {
                provider: PROVIDER.into(),
            });
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(LlmError::Unauthorized {
                provider: PROVIDER.into(),
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            tracing::error!("OpenAI API error {status} on /{route}: {text}");
            return Err(LlmError::Status {
                provider: PROVIDER.into(),
                status: status.as_u16(),
            });
        }

        Ok(text)
    }
}

impl LlmProvider for OpenAiProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        let api_messages = convert_messages(messages);
        let body = ChatRequest {
            model: &self.model,
            messages: &api_messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let text = self.post("chat/completions", &body).await?;
        let resp: OpenAiChatResponse = serde_json::from_str(&text)?;

        if let Some(ref usage) = resp.usage {
            tracing::debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "OpenAI API usage"
            );
        }

        resp.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|content| content.trim().to_owned())
            .ok_or(LlmError::EmptyResponse {
                provider: PROVIDER.into(),
            })
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let input = text.trim();
        if input.is_empty() {
            return Err(LlmError::EmptyInput);
        }
        if self.embedding_model.is_empty() {
            return Err(LlmError::EmbedUnsupported {
                provider: PROVIDER.into(),
            });
        }

        let body = EmbeddingRequest {
            input,
            model: &self.embedding_model,
        };
        let text = self.post("embeddings", &body).await?;
        let resp: EmbeddingResponse = serde_json::from_str(&text)?;

        resp.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or(LlmError::EmptyResponse {
                provider: PROVIDER.into(),
            })
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        PROVIDER
    }
}

fn convert_messages(messages: &[Message]) -> Vec<ApiMessage<'_>> {
    messages
        .iter()
        .map(|msg| {
            let role = match msg.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            ApiMessage {
                role,
                content: &msg.content,
            }
        })
        .collect()
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ApiMessage<'a>],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a str,
    model: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn provider_at(base_url: &str) -> OpenAiProvider {
        OpenAiProvider::new(
            "sk-test-key".into(),
            base_url.into(),
            "gpt-4o-mini".into(),
            "text-embedding-3-small".into(),
            512,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn base_url_strips_trailing_slash() {
        let p = provider_at("https://api.openai.com/v1//");
        assert_eq!(p.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn debug_redacts_api_key() {
        let debug = format!("{:?}", provider_at("https://api.openai.com/v1"));
        assert!(!debug.contains("sk-test-key"));
        assert!(debug.contains("<redacted>"));
        assert!(debug.contains("gpt-4o-mini"));
    }

    #[test]
    fn chat_request_serialization() {
        let msgs = [Message::system("rules"), Message::user("domanda")];
        let api = convert_messages(&msgs);
        let body = ChatRequest {
            model: "gpt-4o-mini",
            messages: &api,
            max_tokens: 100,
            temperature: 0.0,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "domanda");
        assert_eq!(json["temperature"], 0.0);
    }

    #[test]
    fn chat_response_null_content_parses() {
        let json = r#"{"choices":[{"message":{"content":null}}]}"#;
        let resp: OpenAiChatResponse = serde_json::from_str(json).unwrap();
        assert!(resp.choices[0].message.content.is_none());
    }

    #[tokio::test]
    async fn chat_returns_trimmed_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer sk-test-key"))
            .and(body_partial_json(serde_json::json!({"model": "gpt-4o-mini"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "  risposta \n"}}],
                "usage": {"prompt_tokens": 12, "completion_tokens": 3}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let answer = provider_at(&server.uri())
            .chat(&[Message::user("ciao")])
            .await
            .unwrap();
        assert_eq!(answer, "risposta");
    }

    #[tokio::test]
    async fn chat_empty_choices_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})))
            .mount(&server)
            .await;

        let err = provider_at(&server.uri())
            .chat(&[Message::user("ciao")])
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::EmptyResponse { .. }));
    }

    #[tokio::test]
    async fn rate_limit_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429))
            .expect(1)
            .mount(&server)
            .await;

        let err = provider_at(&server.uri())
            .chat(&[Message::user("ciao")])
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::RateLimited { .. }));
    }

    #[tokio::test]
    async fn unauthorized_maps_to_dedicated_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let err = provider_at(&server.uri()).embed("testo").await.unwrap_err();
        assert!(matches!(err, LlmError::Unauthorized { status: 401, .. }));
    }

    #[tokio::test]
    async fn server_error_maps_to_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = provider_at(&server.uri())
            .chat(&[Message::user("ciao")])
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn embed_returns_first_vector() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(body_partial_json(serde_json::json!({
                "input": "obblighi",
                "model": "text-embedding-3-small"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"embedding": [0.25, -0.5, 1.0]}]
            })))
            .mount(&server)
            .await;

        let vector = provider_at(&server.uri()).embed("  obblighi ").await.unwrap();
        assert_eq!(vector, vec![0.25, -0.5, 1.0]);
    }

    #[tokio::test]
    async fn embed_blank_text_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = provider_at(&server.uri()).embed("   ").await.unwrap_err();
        assert!(matches!(err, LlmError::EmptyInput));
    }

    #[tokio::test]
    async fn embed_unreachable_endpoint_errors() {
        let p = provider_at("http://127.0.0.1:1");
        assert!(matches!(p.embed("test").await, Err(LlmError::Http(_))));
    }

    #[test]
    fn name_returns_openai() {
        assert_eq!(provider_at("http://localhost").name(), "openai");
    }
}
