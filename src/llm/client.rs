//! Generation client abstraction and provider selection
//!
//! - **Ollama**: local inference through an Ollama server
//! - **OpenAI**: any OpenAI-compatible `/chat/completions` endpoint

use std::sync::Arc;

use crate::types::{AppError, Result};
use async_trait::async_trait;
use tokio::sync::OnceCell;

/// Text-generation client trait for provider abstraction
///
/// The pipeline only ever sends a single, fully assembled prompt and expects
/// one bounded completion back.
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Generate a completion of at most `max_new_tokens` tokens
    async fn generate(&self, prompt: &str, max_new_tokens: usize) -> Result<String>;

    /// Get the model name/identifier
    fn model_name(&self) -> &str;
}

/// Provider enum for runtime selection
#[derive(Debug, Clone)]
pub enum Provider {
    /// OpenAI API provider (including Azure OpenAI and compatible APIs)
    ///
    /// # Example
    /// ```rust,ignore
    /// let provider = Provider::OpenAI {
    ///     api_key: "sk-...".to_string(),
    ///     api_base: "https://api.openai.com/v1".to_string(),
    ///     model: "gpt-4o-mini".to_string(),
    /// };
    /// ```
    OpenAI {
        api_key: String,
        api_base: String,
        model: String,
    },

    /// Ollama local LLM provider
    ///
    /// # Example
    /// ```rust,ignore
    /// let provider = Provider::Ollama {
    ///     base_url: "http://localhost:11434".to_string(),
    ///     model: "llama3.2".to_string(),
    /// };
    /// ```
    Ollama { base_url: String, model: String },
}

impl Provider {
    /// Create a client instance for this provider
    ///
    /// # Errors
    ///
    /// Returns `ModelUnavailable` if the client cannot be constructed, or
    /// `InvalidConfiguration` if the provider was compiled out.
    pub fn create_client(&self) -> Result<Box<dyn LLMClient>> {
        match self {
            Provider::OpenAI {
                api_key,
                api_base,
                model,
            } => Ok(Box::new(super::openai::OpenAIClient::new(
                api_key.clone(),
                api_base.clone(),
                model.clone(),
            )?)),

            #[cfg(feature = "ollama")]
            Provider::Ollama { base_url, model } => Ok(Box::new(
                super::ollama::OllamaClient::new(base_url, model.clone())?,
            )),

            #[cfg(not(feature = "ollama"))]
            Provider::Ollama { .. } => Err(AppError::InvalidConfiguration(
                "the ollama generation provider requires the `ollama` feature".into(),
            )),
        }
    }

    /// Get a human-readable name for this provider
    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAI { .. } => "OpenAI",
            Provider::Ollama { .. } => "Ollama",
        }
    }

    /// Model identifier the provider was configured with
    pub fn model(&self) -> &str {
        match self {
            Provider::OpenAI { model, .. } | Provider::Ollama { model, .. } => model,
        }
    }
}

// ============================================================================
// Lazy Generator
// ============================================================================

/// Generator whose underlying client is built on first use and then shared.
///
/// A failed initialization leaves the cell empty so a later request can try
/// again; a successful one is never repeated.
pub struct LazyGenerator {
    provider: Provider,
    client: OnceCell<Arc<dyn LLMClient>>,
}

impl LazyGenerator {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            client: OnceCell::new(),
        }
    }

    /// Wrap an already-built client, skipping lazy construction
    pub fn from_client(provider: Provider, client: Arc<dyn LLMClient>) -> Self {
        Self {
            provider,
            client: OnceCell::new_with(Some(client)),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.client.initialized()
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    async fn client(&self) -> Result<Arc<dyn LLMClient>> {
        self.client
            .get_or_try_init(|| async {
                tracing::info!(
                    provider = self.provider.name(),
                    model = self.provider.model(),
                    "Initializing generation model"
                );
                let client = self.provider.create_client().map_err(|e| match e {
                    AppError::InvalidConfiguration(msg) => AppError::InvalidConfiguration(msg),
                    other => AppError::ModelUnavailable(format!(
                        "failed to initialize {}: {}",
                        self.provider.name(),
                        other
                    )),
                })?;
                Ok::<_, AppError>(Arc::from(client))
            })
            .await
            .cloned()
    }
}

#[async_trait]
impl LLMClient for LazyGenerator {
    async fn generate(&self, prompt: &str, max_new_tokens: usize) -> Result<String> {
        self.client().await?.generate(prompt, max_new_tokens).await
    }

    fn model_name(&self) -> &str {
        self.provider.model()
    }
}
