use super::scrub::sanitize_api_error;
use crate::config::LlmConfig;
use crate::error::CompletionError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct ChatCompletionClient {
    /// Pre-computed `"Bearer <key>"` header value.
    cached_auth_header: Option<String>,
    api_url: String,
    model: String,
    max_tokens: u32,
    temperature: f64,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl ChatCompletionClient {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            cached_auth_header: config.api_key.as_ref().map(|k| format!("Bearer {k}")),
            api_url: config.api_url.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            client: Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .connect_timeout(Duration::from_secs(10))
                .pool_max_idle_per_host(10)
                .pool_idle_timeout(Duration::from_secs(90))
                .tcp_keepalive(Duration::from_secs(60))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request<'a>(&'a self, system_prompt: &'a str, message: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: system_prompt,
                },
                Message {
                    role: "user",
                    content: message,
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }

    fn extract_text(chat_response: ChatResponse) -> Result<String, CompletionError> {
        let text = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(CompletionError::EmptyResponse)?;
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(CompletionError::EmptyResponse);
        }
        Ok(trimmed.to_string())
    }

    /// One system + user exchange; returns the first choice's text, trimmed.
    pub async fn chat_with_system(
        &self,
        system_prompt: &str,
        message: &str,
    ) -> Result<String, CompletionError> {
        let auth_header = self
            .cached_auth_header
            .as_ref()
            .ok_or(CompletionError::MissingApiKey)?;

        let request = self.build_request(system_prompt, message);
        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", auth_header)
            .json(&request)
            .send()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read error body>".to_string());
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body: sanitize_api_error(&body),
            });
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Decode(e.to_string()))?;
        Self::extract_text(chat_response)
    }
}
