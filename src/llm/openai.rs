use std::time::Duration;

use crate::llm::client::LLMClient;
use crate::types::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Client for OpenAI-compatible chat-completions endpoints.
pub struct OpenAIClient {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: usize,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAIClient {
    pub fn new(api_key: String, api_base: String, model: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::ModelUnavailable(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            http,
            api_key,
            endpoint: format!("{}/chat/completions", api_base.trim_end_matches('/')),
            model,
        })
    }
}

#[async_trait]
impl LLMClient for OpenAIClient {
    async fn generate(&self, prompt: &str, max_new_tokens: usize) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: max_new_tokens,
        };

        let mut request = self.http.post(&self.endpoint).json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::ModelUnavailable(format!("OpenAI API error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::ModelUnavailable(format!(
                "OpenAI API returned {}: {}",
                status, detail
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::ModelUnavailable(format!("Malformed OpenAI response: {}", e)))?;

        // A missing choice is an empty answer, not an outage.
        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
