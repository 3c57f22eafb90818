//! Gemini API provider implementation for gemma-chat
//!
//! Hosted Gemma models are served by the Gemini API's `generateContent`
//! endpoint. Unlike Ollama, it takes a structured payload: each turn becomes a
//! `contents` entry whose parts carry inline image data followed by the text.

use crate::config::GeminiConfig;
use crate::error::{GemmaChatError, Result};
use crate::providers::base::ensure_success;
use crate::providers::{
    CompletionResponse, ModelCapability, ModelInfo, Provider, ProviderCapabilities, TokenUsage,
};
use crate::session::{GenerationRequest, SamplingPolicy, Turn};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini API provider
///
/// # Examples
///
/// ```no_run
/// use gemma_chat::config::GeminiConfig;
/// use gemma_chat::providers::GeminiProvider;
///
/// let config = GeminiConfig {
///     api_key: Some("my-key".to_string()),
///     ..GeminiConfig::default()
/// };
/// let provider = GeminiProvider::new(config).unwrap();
/// assert_eq!(provider.model(), "gemma-3-27b-it");
/// ```
pub struct GeminiProvider {
    client: Client,
    config: GeminiConfig,
    api_key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
}

impl From<&SamplingPolicy> for GenerationConfig {
    fn from(sampling: &SamplingPolicy) -> Self {
        match sampling {
            SamplingPolicy::Greedy => Self {
                temperature: 0.0,
                top_k: Some(1),
            },
            SamplingPolicy::Randomized { temperature } => Self {
                temperature: *temperature,
                top_k: None,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    prompt_feedback: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: usize,
    #[serde(default)]
    candidates_token_count: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<GeminiModel>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiModel {
    name: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    input_token_limit: usize,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
    #[serde(default)]
    version: Option<String>,
}

impl GeminiProvider {
    /// Create a new Gemini provider instance
    ///
    /// # Errors
    ///
    /// Returns `GemmaChatError::MissingCredentials` if no API key is
    /// configured, or a provider error if HTTP client initialization fails
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                GemmaChatError::MissingCredentials(
                    "Gemini API key not set; export GOOGLE_API_KEY or set provider.gemini.api_key"
                        .to_string(),
                )
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("gemma-chat/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GemmaChatError::Provider(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!(
            "Initialized Gemini provider: api_base={}, model={}",
            config.api_base,
            config.model
        );

        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    /// Get the configured model name
    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base.trim_end_matches('/'), path)
    }

    fn build_body(request: &GenerationRequest, sampling: &SamplingPolicy) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: request.turns().iter().map(content_from_turn).collect(),
            generation_config: GenerationConfig::from(sampling),
        }
    }
}

fn content_from_turn(turn: &Turn) -> Content {
    let mut parts: Vec<Part> = turn
        .attachments()
        .iter()
        .map(|image| Part::InlineData {
            inline_data: InlineData {
                mime_type: image.mime_type().to_string(),
                data: image.to_base64(),
            },
        })
        .collect();
    parts.push(Part::Text {
        text: turn.text().to_string(),
    });

    Content {
        role: turn.role().as_str(),
        parts,
    }
}

fn extract_reply(response: GenerateContentResponse) -> Result<CompletionResponse> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        let feedback = response
            .prompt_feedback
            .map(|f| f.to_string())
            .unwrap_or_else(|| "none".to_string());
        tracing::error!("Gemini response had no candidates (feedback: {})", feedback);
        return Err(GemmaChatError::Provider(format!(
            "Malformed Gemini response: no candidates (prompt feedback: {})",
            feedback
        ))
        .into());
    };

    let text: String = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = candidate.finish_reason.as_deref().unwrap_or("unknown");
        tracing::error!("Gemini candidate carried no text (finish reason: {})", reason);
        return Err(GemmaChatError::Provider(format!(
            "Malformed Gemini response: candidate has no text (finish reason: {})",
            reason
        ))
        .into());
    }

    Ok(match response.usage_metadata {
        Some(usage) => CompletionResponse::with_usage(
            text,
            TokenUsage::new(usage.prompt_token_count, usage.candidates_token_count),
        ),
        None => CompletionResponse::new(text),
    })
}

fn model_info_from_api(model: GeminiModel) -> ModelInfo {
    let name = model
        .name
        .strip_prefix("models/")
        .unwrap_or(&model.name)
        .to_string();
    let display_name = if model.display_name.is_empty() {
        name.clone()
    } else {
        model.display_name
    };

    let mut info = ModelInfo::new(&name, display_name, model.input_token_limit);
    if model
        .supported_generation_methods
        .iter()
        .any(|m| m == "generateContent")
    {
        info.add_capability(ModelCapability::Generation);
    }
    if model.input_token_limit >= 100_000 {
        info.add_capability(ModelCapability::LongContext);
    }
    if name.starts_with("gemma-3") && !name.starts_with("gemma-3-1b") {
        info.add_capability(ModelCapability::Vision);
    }
    if let Some(version) = model.version {
        info.set_provider_metadata("version", version);
    }
    info
}

#[async_trait]
impl Provider for GeminiProvider {
    async fn complete(
        &self,
        request: &GenerationRequest,
        sampling: &SamplingPolicy,
    ) -> Result<CompletionResponse> {
        let url = self.endpoint(&format!(
            "/v1beta/models/{}:generateContent",
            self.config.model
        ));
        let body = Self::build_body(request, sampling);

        tracing::debug!(
            "Sending Gemini request: {} contents, {} images, sampling={}",
            body.contents.len(),
            request.images().count(),
            sampling
        );

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Gemini request failed: {}", e);
                GemmaChatError::Provider(format!("Gemini request failed: {}", e))
            })?;
        let response = ensure_success(response, "Gemini API").await?;

        let parsed: GenerateContentResponse = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse Gemini response: {}", e);
            GemmaChatError::Provider(format!("Failed to parse Gemini response: {}", e))
        })?;

        let completion = extract_reply(parsed)?;
        if let Some(usage) = completion.usage {
            tracing::debug!(
                "Gemini response: prompt_tokens={}, completion_tokens={}",
                usage.prompt_tokens,
                usage.completion_tokens
            );
        }
        Ok(completion)
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        tracing::debug!("Listing Gemini models");

        let url = self.endpoint("/v1beta/models");
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![("pageSize", "1000".to_string())];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }

            let response = self
                .client
                .get(&url)
                .header(API_KEY_HEADER, &self.api_key)
                .query(&query)
                .send()
                .await
                .map_err(|e| {
                    tracing::warn!("Failed to fetch Gemini models: {}", e);
                    GemmaChatError::Provider(format!("Failed to fetch Gemini models: {}", e))
                })?;
            let response = ensure_success(response, "Gemini API").await?;

            let page: ListModelsResponse = response.json().await.map_err(|e| {
                tracing::error!("Failed to parse Gemini models response: {}", e);
                GemmaChatError::Provider(format!("Failed to parse Gemini models response: {}", e))
            })?;

            models.extend(page.models.into_iter().map(model_info_from_api));

            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        tracing::debug!("Fetched {} models from Gemini API", models.len());
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
