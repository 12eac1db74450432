use crate::session::ConversationTurn;
use crate::{ParleyError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

/// Configuration for ChatClient loaded from environment variables
#[derive(Debug, Clone)]
pub struct ChatClientConfig {
    pub base_url: String, // e.g., http://127.0.0.1:1234 (without /v1)
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub request_timeout_ms: u64,
    pub models_timeout_ms: u64,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ChatClientConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("CHAT_BACKEND_URL")
                .or_else(|_| std::env::var("LM_STUDIO_URL"))
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "http://127.0.0.1:1234".to_string()),
            model: std::env::var("CHAT_MODEL").ok().filter(|s| !s.is_empty()),
            api_key: std::env::var("CHAT_API_KEY").ok().filter(|s| !s.is_empty()),
            request_timeout_ms: std::env::var("CHAT_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30_000),
            models_timeout_ms: std::env::var("CHAT_MODELS_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(5_000),
            temperature: std::env::var("CHAT_TEMPERATURE")
                .ok()
                .and_then(|v| v.parse::<f32>().ok())
                .unwrap_or(0.7),
            max_tokens: std::env::var("CHAT_MAX_TOKENS")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(150),
        }
    }
}

impl ChatClientConfig {
    /// Per-turn options derived from this config.
    pub fn completion_options(&self) -> CompletionOptions {
        CompletionOptions {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            model: self.model.clone(),
        }
    }
}

/// Generation knobs for one `complete` call
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOptions {
    pub max_tokens: u32,
    pub temperature: f32,
    /// Backend model id; `None` lets the backend use whatever it has loaded
    pub model: Option<String>,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            max_tokens: 150,
            temperature: 0.7,
            model: None,
        }
    }
}

/// Remote chat-completion backend.
///
/// Contract:
/// - `complete` is stateless: it gets the full ordered history and returns only
///   the new assistant text. Appending it to a session is the caller's job.
/// - Failures are surfaced as-is; nothing is retried.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn list_models(&self) -> Result<Vec<String>>;

    async fn complete(
        &self,
        turns: &[ConversationTurn],
        options: &CompletionOptions,
    ) -> Result<String>;
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    messages: &'a [ConversationTurn],
    max_tokens: u32,
    temperature: f32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

#[derive(Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

/// HTTP client for OpenAI-compatible backends (LM Studio, vLLM, llama.cpp server)
#[derive(Clone)]
pub struct ChatClient {
    pub(crate) http: Client,
    pub(crate) cfg: ChatClientConfig,
}

impl ChatClient {
    pub fn new(cfg: ChatClientConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()
            .map_err(|e| ParleyError::ConfigError(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { http, cfg })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(ChatClientConfig::default())
    }

    pub fn config(&self) -> &ChatClientConfig {
        &self.cfg
    }

    fn endpoint(&self, path: &str) -> String {
        let base = self.cfg.base_url.trim_end_matches('/');
        let base = base.strip_suffix("/v1").unwrap_or(base);
        format!("{base}/v1/{path}")
    }

    fn with_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.cfg.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }

    /// Send a request and return the body of a 2xx response.
    async fn send(&self, req: reqwest::RequestBuilder, url: &str) -> Result<String> {
        let resp = req.send().await.map_err(|e| map_transport_error(e, url))?;
        let status = resp.status();
        let body = resp.text().await.map_err(|e| map_transport_error(e, url))?;
        if !status.is_success() {
            error!(target = "chat_client", %status, body = %body, url = %url, "Chat backend returned error status");
            return Err(ParleyError::BackendBadStatus {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl ChatBackend for ChatClient {
    async fn list_models(&self) -> Result<Vec<String>> {
        let url = self.endpoint("models");
        debug!(target = "chat_client", "GET {}", url);

        let req = self
            .with_auth(self.http.get(&url))
            .timeout(Duration::from_millis(self.cfg.models_timeout_ms));
        let body = self.send(req, &url).await?;

        let list: ModelList = serde_json::from_str(&body)
            .map_err(|e| ParleyError::MalformedResponse(format!("models list: {e}")))?;
        Ok(list.data.into_iter().map(|m| m.id).collect())
    }

    async fn complete(
        &self,
        turns: &[ConversationTurn],
        options: &CompletionOptions,
    ) -> Result<String> {
        let url = self.endpoint("chat/completions");
        debug!(
            target = "chat_client",
            turns = turns.len(),
            "POST {} via Chat Completions", url
        );

        let body = ChatCompletionRequest {
            messages: turns,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            stream: false,
            model: options.model.as_deref(),
        };
        let req = self
            .with_auth(self.http.post(&url))
            .header("content-type", "application/json")
            .json(&body);
        let text = self.send(req, &url).await?;

        let val: serde_json::Value = serde_json::from_str(&text).map_err(|e| {
            ParleyError::MalformedResponse(format!("Failed to parse Chat Completions JSON: {e}"))
        })?;
        extract_text_from_chat_completions(&val).ok_or_else(|| {
            ParleyError::MalformedResponse(
                "Missing choices[0].message.content in chat completions".into(),
            )
        })
    }
}

fn map_transport_error(err: reqwest::Error, url: &str) -> ParleyError {
    if err.is_timeout() {
        error!(target = "chat_client", error = %err, url = %url, "Chat backend request timed out");
        ParleyError::BackendTimeout(err.to_string())
    } else {
        error!(target = "chat_client", error = %err, url = %url, "Chat backend unreachable");
        ParleyError::BackendUnreachable(err.to_string())
    }
}

fn extract_text_from_chat_completions(v: &serde_json::Value) -> Option<String> {
    v.get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: &str) -> ChatClient {
        ChatClient::new(ChatClientConfig {
            base_url: base_url.to_string(),
            model: None,
            api_key: None,
            request_timeout_ms: 1_000,
            models_timeout_ms: 1_000,
            temperature: 0.7,
            max_tokens: 150,
        })
        .unwrap()
    }

    #[test]
    fn endpoint_does_not_double_version_prefix() {
        assert_eq!(
            client("http://host:1234").endpoint("models"),
            "http://host:1234/v1/models"
        );
        assert_eq!(
            client("http://host:1234/v1/").endpoint("chat/completions"),
            "http://host:1234/v1/chat/completions"
        );
    }

    #[test]
    fn request_body_omits_model_when_unset() {
        let turns = vec![ConversationTurn::system("sys"), ConversationTurn::user("Hello")];
        let body = ChatCompletionRequest {
            messages: &turns,
            max_tokens: 200,
            temperature: 0.7,
            stream: false,
            model: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("model").is_none());
        assert_eq!(json["stream"], false);
        assert_eq!(json["messages"][1]["role"], "user");
    }

    #[test]
    fn extracts_assistant_text() {
        let v = serde_json::json!({"choices": [{"message": {"role": "assistant", "content": "Hi there"}}]});
        assert_eq!(
            extract_text_from_chat_completions(&v).as_deref(),
            Some("Hi there")
        );
        assert!(extract_text_from_chat_completions(&serde_json::json!({"choices": []})).is_none());
    }
}
