use crate::llm::client::LLMClient;
use crate::types::{AppError, Result};
use async_trait::async_trait;
use ollama_rs::{
    generation::chat::{request::ChatMessageRequest, ChatMessage},
    models::ModelOptions,
    Ollama,
};

const DEFAULT_OLLAMA_PORT: u16 = 11434;

pub struct OllamaClient {
    client: Ollama,
    model: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: String) -> Result<Self> {
        Ok(Self {
            client: connect(base_url),
            model,
        })
    }
}

/// Build an Ollama handle from a base URL such as `http://localhost:11434`.
pub fn connect(base_url: &str) -> Ollama {
    let (host, port) = split_host_port(base_url);
    Ollama::new(host, port)
}

/// Split a base URL into `scheme://host` and port, defaulting to
/// `http://localhost:11434` for the missing parts.
pub(crate) fn split_host_port(base_url: &str) -> (String, u16) {
    let base_url = base_url.trim_end_matches('/');
    let (scheme, rest) = match base_url.split_once("://") {
        Some((scheme, rest)) => (scheme, rest),
        None => ("http", base_url),
    };

    let (host, port) = match rest.rsplit_once(':') {
        Some((host, port)) => (host, port.parse().unwrap_or(DEFAULT_OLLAMA_PORT)),
        None => (rest, DEFAULT_OLLAMA_PORT),
    };
    let host = if host.is_empty() { "localhost" } else { host };

    (format!("{}://{}", scheme, host), port)
}

#[async_trait]
impl LLMClient for OllamaClient {
    async fn generate(&self, prompt: &str, max_new_tokens: usize) -> Result<String> {
        let messages = vec![ChatMessage::user(prompt.to_string())];
        let num_predict = i32::try_from(max_new_tokens).unwrap_or(i32::MAX);

        let request = ChatMessageRequest::new(self.model.clone(), messages)
            .options(ModelOptions::default().num_predict(num_predict));

        let response = self
            .client
            .send_chat_messages(request)
            .await
            .map_err(|e| AppError::ModelUnavailable(format!("Ollama error: {}", e)))?;

        Ok(response.message.content)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
