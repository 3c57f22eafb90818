//! Provider module for gemma-chat
//!
//! This module contains the completion primitive abstraction and its
//! implementations for the hosted Gemini API and a local Ollama server.

pub mod base;
pub mod gemini;
pub mod ollama;

pub use base::{
    CompletionResponse, ModelCapability, ModelInfo, Provider, ProviderCapabilities, TokenUsage,
};
pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;

use crate::config::ProviderConfig;
use crate::error::{GemmaChatError, Result};

/// Create a provider instance based on configuration
///
/// # Arguments
///
/// * `provider_type` - Type of provider ("gemini" or "ollama")
/// * `config` - Provider configuration
///
/// # Errors
///
/// Returns error if provider type is invalid or initialization fails
///
/// # Examples
///
/// ```
/// use gemma_chat::config::ProviderConfig;
/// use gemma_chat::providers::create_provider;
///
/// let provider = create_provider("ollama", &ProviderConfig::default()).unwrap();
/// assert_eq!(provider.get_current_model().unwrap(), "gemma3:4b");
/// ```
pub fn create_provider(provider_type: &str, config: &ProviderConfig) -> Result<Box<dyn Provider>> {
    match provider_type {
        "gemini" => Ok(Box::new(GeminiProvider::new(config.gemini.clone())?)),
        "ollama" => Ok(Box::new(OllamaProvider::new(config.ollama.clone())?)),
        _ => Err(GemmaChatError::Provider(format!(
            "Unknown provider type: {}",
            provider_type
        ))
        .into()),
    }
}
