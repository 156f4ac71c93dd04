//! Reasoning backends: the trait the analyzer calls and an OpenRouter client

use crate::config::ReasoningConfig;
use crate::error::{RelevanceError, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One reasoning call: a system instruction plus the rendered user prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReasoningRequest {
    pub system: String,
    pub prompt: String,
}

/// Returns the raw model reply. Retries, timeouts and parsing live in
/// `ReasoningAnalyzer`, so implementations make exactly one attempt.
#[async_trait]
pub trait ReasoningBackend: Send + Sync {
    async fn reason(&self, request: &ReasoningRequest) -> Result<String>;

    fn model_id(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// OpenAI-compatible chat completions client (OpenRouter by default).
#[derive(Clone)]
pub struct OpenRouterBackend {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenRouterBackend {
    /// Reads the API key from the environment variable named in the config.
    pub fn from_config(config: &ReasoningConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            RelevanceError::Configuration(format!(
                "Reasoning is enabled but {} is not set",
                config.api_key_env
            ))
        })?;
        Self::new(config, api_key)
    }

    pub fn new(config: &ReasoningConfig, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| RelevanceError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl ReasoningBackend for OpenRouterBackend {
    async fn reason(&self, request: &ReasoningRequest) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| RelevanceError::ReasoningTransientFailure(format!("request failed: {e}")))?;

        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() {
            let text = response.text().await.unwrap_or_default();
            return Err(RelevanceError::ReasoningTransientFailure(format!(
                "backend returned {status}: {}",
                error_message(&text)
            )));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(RelevanceError::Reasoning(format!(
                "backend returned {status}: {}",
                error_message(&text)
            )));
        }

        let chat: ChatResponse = response.json().await.map_err(|e| {
            RelevanceError::ReasoningMalformedResponse(format!("invalid completion body: {e}"))
        })?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| {
                RelevanceError::ReasoningMalformedResponse("completion had no content".to_string())
            })?;

        debug!("Reasoning reply received ({} chars)", content.len());
        Ok(content)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ApiError>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.chars().take(200).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_from_base_url() {
        let config = ReasoningConfig {
            base_url: "https://openrouter.ai/api/v1/".to_string(),
            ..ReasoningConfig::default()
        };
        let backend = OpenRouterBackend::new(&config, "key".to_string()).unwrap();
        assert_eq!(backend.endpoint, "https://openrouter.ai/api/v1/chat/completions");
        assert_eq!(backend.model_id(), "openai/gpt-4o-mini");
    }

    #[test]
    fn test_missing_api_key_is_configuration_error() {
        let config = ReasoningConfig {
            api_key_env: "RESUME_RELEVANCE_TEST_UNSET_KEY".to_string(),
            ..ReasoningConfig::default()
        };
        let err = OpenRouterBackend::from_config(&config).err().unwrap();
        assert!(matches!(err, RelevanceError::Configuration(_)));
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(r#"{"error": {"message": "model not found"}}"#),
            "model not found"
        );
        assert_eq!(error_message("plain failure"), "plain failure");
    }

    #[test]
    fn test_chat_request_shape() {
        let body = ChatRequest {
            model: "m",
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
            temperature: 0.1,
            max_tokens: 10,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["max_tokens"], 10);
    }
}
