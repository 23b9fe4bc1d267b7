//! KCrawl LLM - Text-generation backends
//!
//! Provides the `TextGenerator` implementations used by the extraction
//! pipeline:
//! - OpenAI-compatible chat completions (OpenAI, Azure, local gateways)
//! - Ollama
//! - An offline simulated generator with canned, stage-shaped answers
//!
//! Author: hephaex@gmail.com

use std::sync::Arc;

use kcrawl_core::{LlmConfig, LlmProvider, Result, TextGenerator};

pub mod client;
pub mod simulated;

pub use client::{OllamaClient, OpenAiClient};
pub use simulated::SimulatedGenerator;

/// Create a text generator from config
pub fn create_text_generator(config: &LlmConfig) -> Result<Arc<dyn TextGenerator>> {
    match config.provider {
        LlmProvider::OpenAI | LlmProvider::Azure => Ok(Arc::new(OpenAiClient::from_config(config)?)),
        LlmProvider::Ollama => Ok(Arc::new(OllamaClient::from_config(config)?)),
        LlmProvider::Simulated => Ok(Arc::new(SimulatedGenerator::new())),
    }
}
