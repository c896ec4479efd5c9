//! Text Generation Clients
//!
//! The pipeline talks to a single generation model through the [`LLMClient`]
//! trait. [`Provider`] describes which backend to build and [`LazyGenerator`]
//! defers building it until the first question that actually needs it.
//!
//! # Supported Providers
//!
//! - `openai` - any OpenAI-compatible chat-completions endpoint (always built)
//! - `ollama` - local Ollama server (cargo feature `ollama`)
//!
//! # Example
//!
//! ```ignore
//! use docqa::llm::{LazyGenerator, LLMClient, Provider};
//!
//! let generator = LazyGenerator::new(Provider::Ollama {
//!     base_url: "http://localhost:11434".to_string(),
//!     model: "llama3.2".to_string(),
//! });
//! let text = generator.generate("Say hello", 32).await?;
//! ```

/// Core client trait, provider enum and lazy generator.
pub mod client;

#[cfg(feature = "ollama")]
pub mod ollama;

pub mod openai;

pub use client::{LLMClient, LazyGenerator, Provider};
