//! Ollama provider implementation for gemma-chat
//!
//! This module implements the Provider trait for Ollama, connecting to a local
//! or remote Ollama server. Prompts are already framed with Gemma turn
//! delimiters, so requests go to `/api/generate` in raw mode and bypass the
//! server-side chat template. Includes model listing and token usage tracking.

use crate::config::OllamaConfig;
use crate::error::{GemmaChatError, Result};
use crate::providers::base::ensure_success;
use crate::providers::{
    CompletionResponse, ModelCapability, ModelInfo, Provider, ProviderCapabilities, TokenUsage,
};
use crate::session::{GenerationRequest, SamplingPolicy};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

/// Ollama API provider
///
/// Models are cached for 5 minutes to reduce API calls.
///
/// # Examples
///
/// ```no_run
/// use gemma_chat::config::OllamaConfig;
/// use gemma_chat::providers::{OllamaProvider, Provider};
/// use gemma_chat::session::{GenerationRequest, SamplingPolicy, Turn};
///
/// # async fn example() -> gemma_chat::error::Result<()> {
/// let provider = OllamaProvider::new(OllamaConfig::default())?;
/// let request = GenerationRequest::new(vec![Turn::user("Hello!")]);
/// let completion = provider.complete(&request, &SamplingPolicy::Greedy).await?;
/// println!("{}", completion.text);
/// # Ok(())
/// # }
/// ```
pub struct OllamaProvider {
    client: Client,
    config: OllamaConfig,
    #[allow(clippy::type_complexity)]
    model_cache: Arc<RwLock<Option<(Vec<ModelInfo>, Instant)>>>,
}

/// Response from Ollama's /api/tags endpoint
#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    models: Vec<OllamaModelTag>,
}

/// Model metadata from /api/tags
#[derive(Debug, Deserialize)]
struct OllamaModelTag {
    name: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    modified_at: String,
    #[serde(default)]
    details: OllamaModelDetails,
}

/// Model details reported alongside each tag
#[derive(Debug, Deserialize, Default)]
struct OllamaModelDetails {
    #[serde(default)]
    parameter_size: String,
    #[serde(default)]
    quantization_level: String,
}

/// Request body for /api/generate
#[derive(Debug, Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    raw: bool,
    stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
    options: OllamaOptions,
}

/// Sampling and runtime options for /api/generate
#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_gpu: Option<u32>,
}

impl OllamaOptions {
    fn new(sampling: &SamplingPolicy, num_gpu: Option<u32>) -> Self {
        match sampling {
            SamplingPolicy::Greedy => Self {
                temperature: 0.0,
                top_k: Some(1),
                num_gpu,
            },
            SamplingPolicy::Randomized { temperature } => Self {
                temperature: *temperature,
                top_k: None,
                num_gpu,
            },
        }
    }
}

/// Response body from /api/generate
#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: usize,
    #[serde(default)]
    eval_count: usize,
}

impl OllamaProvider {
    /// Create a new Ollama provider instance
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    ///
    /// # Examples
    ///
    /// ```
    /// use gemma_chat::config::OllamaConfig;
    /// use gemma_chat::providers::OllamaProvider;
    ///
    /// let provider = OllamaProvider::new(OllamaConfig::default());
    /// assert!(provider.is_ok());
    /// ```
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("gemma-chat/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GemmaChatError::Provider(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!(
            "Initialized Ollama provider: host={}, model={}",
            config.host,
            config.model
        );

        Ok(Self {
            client,
            config,
            model_cache: Arc::new(RwLock::new(None)),
        })
    }

    /// Get the configured Ollama host
    pub fn host(&self) -> &str {
        &self.config.host
    }

    /// Get the configured model name
    ///
    /// # Examples
    ///
    /// ```
    /// use gemma_chat::config::OllamaConfig;
    /// use gemma_chat::providers::OllamaProvider;
    ///
    /// let provider = OllamaProvider::new(OllamaConfig::default()).unwrap();
    /// assert_eq!(provider.model(), "gemma3:4b");
    /// ```
    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.host.trim_end_matches('/'), path)
    }

    /// Fetch models from Ollama's /api/tags endpoint
    async fn fetch_models_from_api(&self) -> Result<Vec<ModelInfo>> {
        let url = self.endpoint("/api/tags");
        tracing::debug!("Fetching models from Ollama: {}", url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            tracing::warn!("Failed to fetch Ollama models: {}", e);
            GemmaChatError::Provider(format!("Failed to connect to Ollama server: {}", e))
        })?;
        let response = ensure_success(response, "Ollama").await?;

        let tags: OllamaTagsResponse = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse Ollama tags response: {}", e);
            GemmaChatError::Provider(format!("Failed to parse Ollama response: {}", e))
        })?;

        let models: Vec<ModelInfo> = tags.models.into_iter().map(model_info_from_tag).collect();
        tracing::debug!("Fetched {} models from Ollama", models.len());
        Ok(models)
    }

    /// Check if cache is still valid (less than 5 minutes old)
    fn is_cache_valid(cached_at: Instant) -> bool {
        cached_at.elapsed() < Duration::from_secs(300)
    }
}

fn model_info_from_tag(tag: OllamaModelTag) -> ModelInfo {
    let mut model = ModelInfo::new(
        &tag.name,
        format!("{} ({})", tag.name, format_size(tag.size)),
        get_context_window_for_model(&tag.name),
    );
    add_model_capabilities(&mut model, &tag.name);
    model.set_provider_metadata("size", format_size(tag.size));
    if !tag.modified_at.is_empty() {
        model.set_provider_metadata("modified_at", tag.modified_at);
    }
    if !tag.details.parameter_size.is_empty() {
        model.set_provider_metadata("parameter_size", tag.details.parameter_size);
    }
    if !tag.details.quantization_level.is_empty() {
        model.set_provider_metadata("quantization_level", tag.details.quantization_level);
    }
    model
}

/// Get context window size for a model based on its name
fn get_context_window_for_model(model_name: &str) -> usize {
    let name = model_name.to_lowercase();
    if name.starts_with("gemma3:1b") || name.starts_with("gemma3:270m") {
        32_768
    } else if name.starts_with("gemma3") {
        131_072
    } else if name.starts_with("gemma2") || name.starts_with("gemma") {
        8192
    } else {
        4096
    }
}

/// Add model capabilities based on model name
fn add_model_capabilities(model: &mut ModelInfo, model_name: &str) {
    model.add_capability(ModelCapability::Generation);

    let name = model_name.to_lowercase();
    let family = name.split(':').next().unwrap_or(&name);
    let small = name.contains(":1b") || name.contains(":270m");
    match family {
        "gemma3" if !small => {
            model.add_capability(ModelCapability::Vision);
            model.add_capability(ModelCapability::LongContext);
        }
        "llava" | "llama3.2-vision" => model.add_capability(ModelCapability::Vision),
        _ => {}
    }
}

/// Format byte size for display
fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    format!("{:.1}{}", size, UNITS[unit_idx])
}

#[async_trait]
impl Provider for OllamaProvider {
    async fn complete(
        &self,
        request: &GenerationRequest,
        sampling: &SamplingPolicy,
    ) -> Result<CompletionResponse> {
        let url = self.endpoint("/api/generate");
        let body = OllamaGenerateRequest {
            model: &self.config.model,
            prompt: request.prompt(),
            raw: true,
            stream: false,
            images: request.images().map(|image| image.to_base64()).collect(),
            options: OllamaOptions::new(sampling, self.config.num_gpu),
        };

        tracing::debug!(
            "Sending Ollama request: {} turns, {} images, sampling={}",
            request.turns().len(),
            body.images.len(),
            sampling
        );

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Ollama request failed: {}", e);
                GemmaChatError::Provider(format!("Ollama request failed: {}", e))
            })?;
        let response = ensure_success(response, "Ollama").await?;

        let generated: OllamaGenerateResponse = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse Ollama response: {}", e);
            GemmaChatError::Provider(format!("Failed to parse Ollama response: {}", e))
        })?;

        tracing::debug!(
            "Ollama response: done={}, prompt_tokens={}, completion_tokens={}",
            generated.done,
            generated.prompt_eval_count,
            generated.eval_count
        );

        let completion = if generated.prompt_eval_count > 0 || generated.eval_count > 0 {
            let usage = TokenUsage::new(generated.prompt_eval_count, generated.eval_count);
            CompletionResponse::with_usage(generated.response, usage)
        } else {
            CompletionResponse::new(generated.response)
        };

        Ok(completion)
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        tracing::debug!("Listing Ollama models");

        if let Ok(cache) = self.model_cache.read() {
            if let Some((models, cached_at)) = cache.as_ref() {
                if Self::is_cache_valid(*cached_at) {
                    tracing::debug!("Using cached model list");
                    return Ok(models.clone());
                }
            }
        }

        let models = self.fetch_models_from_api().await?;

        if let Ok(mut cache) = self.model_cache.write() {
            *cache = Some((models.clone(), Instant::now()));
        }

        Ok(models)
    }

    fn get_current_model(&self) -> Result<String> {
        Ok(self.config.model.clone())
    }

    fn get_provider_capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_model_listing: true,
            supports_images: true,
            supports_token_counts: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> OllamaProvider {
        OllamaProvider::new(OllamaConfig::default()).unwrap()
    }

    #[test]
    fn test_ollama_provider_creation() {
        let provider = provider();
        assert_eq!(provider.host(), "http://localhost:11434");
        assert_eq!(provider.model(), "gemma3:4b");
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let config = OllamaConfig {
            host: "http://gpu-box:11434/".to_string(),
            ..OllamaConfig::default()
        };
        let provider = OllamaProvider::new(config).unwrap();
        assert_eq!(
            provider.endpoint("/api/generate"),
            "http://gpu-box:11434/api/generate"
        );
    }

    #[test]
    fn test_greedy_options_pin_top_k() {
        let options = OllamaOptions::new(&SamplingPolicy::Greedy, None);
        assert_eq!(options.temperature, 0.0);
        assert_eq!(options.top_k, Some(1));

        let json = serde_json::to_value(&options).unwrap();
        assert!(json.get("num_gpu").is_none());
    }

    #[test]
    fn test_randomized_options_carry_temperature() {
        let options = OllamaOptions::new(&SamplingPolicy::Randomized { temperature: 0.8 }, Some(0));
        assert_eq!(options.temperature, 0.8);
        assert_eq!(options.top_k, None);
        assert_eq!(options.num_gpu, Some(0));
    }

    #[test]
    fn test_generate_request_is_raw_and_omits_empty_images() {
        let request = GenerationRequest::new(vec![crate::session::Turn::user("Hi")]);
        let body = OllamaGenerateRequest {
            model: "gemma3:4b",
            prompt: request.prompt(),
            raw: true,
            stream: false,
            images: Vec::new(),
            options: OllamaOptions::new(&SamplingPolicy::Greedy, None),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["raw"], true);
        assert_eq!(json["stream"], false);
        assert!(json.get("images").is_none());
        assert!(json["prompt"]
            .as_str()
            .unwrap()
            .ends_with("<start_of_turn>model\n"));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512.0B");
        assert_eq!(format_size(2048), "2.0KB");
        assert_eq!(format_size(3_338_801_804), "3.1GB");
    }

    #[test]
    fn test_get_context_window_for_model() {
        assert_eq!(get_context_window_for_model("gemma3:4b"), 131_072);
        assert_eq!(get_context_window_for_model("gemma3:1b"), 32_768);
        assert_eq!(get_context_window_for_model("gemma2:9b"), 8192);
        assert_eq!(get_context_window_for_model("phi3"), 4096);
    }

    #[test]
    fn test_add_model_capabilities_vision() {
        let mut model = ModelInfo::new("gemma3:12b", "gemma3:12b", 131_072);
        add_model_capabilities(&mut model, "gemma3:12b");
        assert!(model.supports_capability(ModelCapability::Vision));
        assert!(model.supports_capability(ModelCapability::LongContext));

        let mut small = ModelInfo::new("gemma3:1b", "gemma3:1b", 32_768);
        add_model_capabilities(&mut small, "gemma3:1b");
        assert!(!small.supports_capability(ModelCapability::Vision));
        assert!(small.supports_capability(ModelCapability::Generation));
    }

    #[test]
    fn test_model_info_from_tag_metadata() {
        let tag: OllamaModelTag = serde_json::from_value(serde_json::json!({
            "name": "gemma3:4b",
            "size": 3_338_801_804u64,
            "modified_at": "2025-03-12T10:00:00Z",
            "details": {"parameter_size": "4.3B", "quantization_level": "Q4_K_M"}
        }))
        .unwrap();
        let model = model_info_from_tag(tag);
        assert_eq!(model.name, "gemma3:4b");
        assert_eq!(model.display_name, "gemma3:4b (3.1GB)");
        assert_eq!(
            model.provider_specific.get("quantization_level"),
            Some(&"Q4_K_M".to_string())
        );
    }

    #[test]
    fn test_is_cache_valid_fresh() {
        assert!(OllamaProvider::is_cache_valid(Instant::now()));
    }

    #[test]
    fn test_provider_capabilities() {
        let caps = provider().get_provider_capabilities();
        assert!(caps.supports_model_listing);
        assert!(caps.supports_images);
    }

    #[test]
    fn test_get_current_model() {
        assert_eq!(provider().get_current_model().unwrap(), "gemma3:4b");
    }
}
