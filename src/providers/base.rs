//! Base provider trait and common types for gemma-chat
//!
//! This module defines the [`Provider`] trait that every completion backend
//! implements, along with response, token-usage, and model metadata types.

use crate::error::{GemmaChatError, Result};
use crate::session::{GenerationRequest, SamplingPolicy};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Token usage information from a completion
///
/// Tracks the number of tokens used in prompts and completions,
/// as reported by the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of tokens in the prompt
    pub prompt_tokens: usize,
    /// Number of tokens in the completion
    pub completion_tokens: usize,
    /// Total tokens used (prompt + completion)
    pub total_tokens: usize,
}

impl TokenUsage {
    /// Create a new TokenUsage instance
    ///
    /// # Examples
    ///
    /// ```
    /// use gemma_chat::providers::TokenUsage;
    ///
    /// let usage = TokenUsage::new(100, 50);
    /// assert_eq!(usage.total_tokens, 150);
    /// ```
    pub fn new(prompt_tokens: usize, completion_tokens: usize) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Model capability feature flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelCapability {
    /// Model can generate text completions
    Generation,
    /// Model accepts image input
    Vision,
    /// Model supports long context windows (100k+ tokens)
    LongContext,
}

impl std::fmt::Display for ModelCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Generation => write!(f, "Generation"),
            Self::Vision => write!(f, "Vision"),
            Self::LongContext => write!(f, "LongContext"),
        }
    }
}

/// Model information and capabilities
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Identifier used in requests (e.g. "gemma-3-27b-it", "gemma3:4b")
    pub name: String,
    /// Display name for user-friendly presentation
    pub display_name: String,
    /// Maximum context window size in tokens
    pub context_window: usize,
    /// Supported capabilities
    pub capabilities: Vec<ModelCapability>,
    /// Provider-specific metadata (key-value pairs)
    pub provider_specific: HashMap<String, String>,
}

impl ModelInfo {
    /// Create a new ModelInfo instance
    ///
    /// # Examples
    ///
    /// ```
    /// use gemma_chat::providers::ModelInfo;
    ///
    /// let model = ModelInfo::new("gemma3:4b", "Gemma 3 4B", 131072);
    /// assert_eq!(model.name, "gemma3:4b");
    /// assert!(model.capabilities.is_empty());
    /// ```
    pub fn new(
        name: impl Into<String>,
        display_name: impl Into<String>,
        context_window: usize,
    ) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            context_window,
            capabilities: Vec::new(),
            provider_specific: HashMap::new(),
        }
    }

    /// Add a capability to this model, ignoring duplicates
    pub fn add_capability(&mut self, capability: ModelCapability) {
        if !self.capabilities.contains(&capability) {
            self.capabilities.push(capability);
        }
    }

    /// Check if this model supports a capability
    pub fn supports_capability(&self, capability: ModelCapability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Set provider-specific metadata
    pub fn set_provider_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.provider_specific.insert(key.into(), value.into());
    }
}

/// Provider-level capabilities and features
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProviderCapabilities {
    /// Provider supports listing available models
    pub supports_model_listing: bool,
    /// Provider accepts image attachments
    pub supports_images: bool,
    /// Provider returns token usage information in responses
    pub supports_token_counts: bool,
}

/// Raw completion output with optional token usage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResponse {
    /// Generated text, before session-level decoding
    pub text: String,
    /// Optional token usage information
    pub usage: Option<TokenUsage>,
}

impl CompletionResponse {
    /// Create a response without usage information
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: None,
        }
    }

    /// Create a response with token usage
    pub fn with_usage(text: impl Into<String>, usage: TokenUsage) -> Self {
        Self {
            text: text.into(),
            usage: Some(usage),
        }
    }
}

/// Stateless completion primitive
///
/// Given a framed prompt (and its structured turns) plus a sampling policy,
/// produce the model's text. Implementations must not keep conversation state
/// between calls; with greedy sampling, identical requests are expected to
/// yield identical output.
///
/// # Examples
///
/// ```
/// use gemma_chat::providers::{CompletionResponse, Provider};
/// use gemma_chat::session::{GenerationRequest, SamplingPolicy};
/// use gemma_chat::error::Result;
/// use async_trait::async_trait;
///
/// struct Echo;
///
/// #[async_trait]
/// impl Provider for Echo {
///     async fn complete(
///         &self,
///         request: &GenerationRequest,
///         _sampling: &SamplingPolicy,
///     ) -> Result<CompletionResponse> {
///         let last = request.turns().last().map(|t| t.text()).unwrap_or_default();
///         Ok(CompletionResponse::new(last))
///     }
/// }
/// ```
#[async_trait]
pub trait Provider: Send + Sync {
    /// Generate a completion for the request
    ///
    /// # Errors
    ///
    /// Returns error on transport failure, non-success status, or a
    /// malformed response
    async fn complete(
        &self,
        request: &GenerationRequest,
        sampling: &SamplingPolicy,
    ) -> Result<CompletionResponse>;

    /// List available models
    ///
    /// The default implementation reports that listing is unsupported.
    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        Err(GemmaChatError::Provider(
            "Model listing is not supported by this provider".to_string(),
        )
        .into())
    }

    /// Name of the model requests are sent to
    ///
    /// The default implementation reports that the model is unknown.
    fn get_current_model(&self) -> Result<String> {
        Err(GemmaChatError::Provider(
            "Current model information is not available from this provider".to_string(),
        )
        .into())
    }

    /// Capabilities of this provider
    fn get_provider_capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::default()
    }
}

/// Turn a non-success HTTP response into a provider error carrying the body
pub(crate) async fn ensure_success(
    response: reqwest::Response,
    backend: &str,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let error_text = response.text().await.unwrap_or_default();
    tracing::error!("{} returned error {}: {}", backend, status, error_text);
    Err(GemmaChatError::Provider(format!(
        "{} returned error {}: {}",
        backend, status, error_text
    ))
    .into())
}
