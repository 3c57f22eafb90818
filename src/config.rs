//! Configuration management for gemma-chat
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{GemmaChatError, Result};
use crate::session::{Modality, SamplingPolicy, SessionOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for gemma-chat
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Provider configuration (Gemini, Ollama)
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Conversation session behavior
    #[serde(default)]
    pub session: SessionConfig,
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
}

/// Provider configuration
///
/// Specifies which completion backend to use and its settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Type of provider to use
    #[serde(rename = "type", default = "default_provider_type")]
    pub provider_type: String,

    /// Gemini API configuration
    #[serde(default)]
    pub gemini: GeminiConfig,

    /// Ollama configuration
    #[serde(default)]
    pub ollama: OllamaConfig,
}

fn default_provider_type() -> String {
    "gemini".to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider_type: default_provider_type(),
            gemini: GeminiConfig::default(),
            ollama: OllamaConfig::default(),
        }
    }
}

/// Gemini API provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Model to use for Gemini
    #[serde(default = "default_gemini_model")]
    pub model: String,

    /// API base URL (override for tests and proxies)
    #[serde(default = "default_gemini_api_base")]
    pub api_base: String,

    /// API key; usually supplied through `GOOGLE_API_KEY` instead
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub timeout_seconds: u64,
}

fn default_gemini_model() -> String {
    "gemma-3-27b-it".to_string()
}

fn default_gemini_api_base() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_request_timeout() -> u64 {
    120
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            model: default_gemini_model(),
            api_base: default_gemini_api_base(),
            api_key: None,
            timeout_seconds: default_request_timeout(),
        }
    }
}

/// Ollama provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Ollama server host
    #[serde(default = "default_ollama_host")]
    pub host: String,

    /// Model to use for Ollama
    #[serde(default = "default_ollama_model")]
    pub model: String,

    /// Number of layers to offload to the GPU; `None` lets Ollama decide
    #[serde(default)]
    pub num_gpu: Option<u32>,

    /// Request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub timeout_seconds: u64,
}

fn default_ollama_host() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "gemma3:4b".to_string()
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: default_ollama_host(),
            model: default_ollama_model(),
            num_gpu: None,
            timeout_seconds: default_request_timeout(),
        }
    }
}

/// Conversation session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Include prior turns in each request
    #[serde(default = "default_multi_turn")]
    pub multi_turn: bool,

    /// Accept image attachments (multimodal model variant)
    #[serde(default)]
    pub vision: bool,

    /// Token budget for the request window; unset sends the full history
    #[serde(default)]
    pub max_context_tokens: Option<usize>,

    /// Sampling policy for every generation call
    #[serde(default)]
    pub sampling: SamplingPolicy,
}

fn default_multi_turn() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            multi_turn: default_multi_turn(),
            vision: false,
            max_context_tokens: None,
            sampling: SamplingPolicy::Greedy,
        }
    }
}

impl SessionConfig {
    /// Session options described by this configuration
    ///
    /// # Examples
    ///
    /// ```
    /// use gemma_chat::config::SessionConfig;
    /// use gemma_chat::session::Modality;
    ///
    /// let config = SessionConfig { vision: true, ..SessionConfig::default() };
    /// assert_eq!(config.to_options().modality, Modality::Multimodal);
    /// ```
    pub fn to_options(&self) -> SessionOptions {
        SessionOptions {
            multi_turn: self.multi_turn,
            sampling: self.sampling,
            modality: if self.vision {
                Modality::Multimodal
            } else {
                Modality::TextOnly
            },
            max_context_tokens: self.max_context_tokens,
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on, as `host:port`
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Conversations kept per kind before the least recently used is dropped
    #[serde(default = "default_max_conversations")]
    pub max_conversations: usize,
}

fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}

fn default_max_conversations() -> usize {
    crate::server::DEFAULT_MAX_CONVERSATIONS
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_conversations: default_max_conversations(),
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| GemmaChatError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| GemmaChatError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        // Provider overrides
        if let Ok(provider_type) = std::env::var("GEMMA_CHAT_PROVIDER") {
            self.provider.provider_type = provider_type;
        }

        if let Ok(gemini_model) = std::env::var("GEMMA_CHAT_GEMINI_MODEL") {
            self.provider.gemini.model = gemini_model;
        }

        if let Ok(api_base) = std::env::var("GEMMA_CHAT_GEMINI_API_BASE") {
            self.provider.gemini.api_base = api_base;
        }

        if let Ok(api_key) = std::env::var("GOOGLE_API_KEY") {
            self.provider.gemini.api_key = Some(api_key);
        }

        if let Ok(ollama_host) = std::env::var("GEMMA_CHAT_OLLAMA_HOST") {
            self.provider.ollama.host = ollama_host;
        }

        if let Ok(ollama_model) = std::env::var("GEMMA_CHAT_OLLAMA_MODEL") {
            self.provider.ollama.model = ollama_model;
        }

        // Session overrides
        if let Ok(multi_turn) = std::env::var("GEMMA_CHAT_MULTI_TURN") {
            if let Ok(value) = multi_turn.parse() {
                self.session.multi_turn = value;
            } else {
                tracing::warn!("Invalid GEMMA_CHAT_MULTI_TURN: {}", multi_turn);
            }
        }

        if let Ok(temperature) = std::env::var("GEMMA_CHAT_TEMPERATURE") {
            if let Ok(value) = temperature.parse() {
                self.session.sampling = SamplingPolicy::Randomized { temperature: value };
            } else {
                tracing::warn!("Invalid GEMMA_CHAT_TEMPERATURE: {}", temperature);
            }
        }

        if let Ok(max_tokens) = std::env::var("GEMMA_CHAT_MAX_CONTEXT_TOKENS") {
            if let Ok(value) = max_tokens.parse() {
                self.session.max_context_tokens = Some(value);
            } else {
                tracing::warn!("Invalid GEMMA_CHAT_MAX_CONTEXT_TOKENS: {}", max_tokens);
            }
        }

        // Server overrides
        if let Ok(bind) = std::env::var("GEMMA_CHAT_BIND") {
            self.server.bind = bind;
        }

        if let Ok(max) = std::env::var("GEMMA_CHAT_MAX_CONVERSATIONS") {
            if let Ok(value) = max.parse() {
                self.server.max_conversations = value;
            } else {
                tracing::warn!("Invalid GEMMA_CHAT_MAX_CONVERSATIONS: {}", max);
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }

        if let Some(provider) = &cli.provider {
            self.provider.provider_type = provider.clone();
        }

        if let Some(model) = &cli.model {
            match self.provider.provider_type.as_str() {
                "ollama" => self.provider.ollama.model = model.clone(),
                _ => self.provider.gemini.model = model.clone(),
            }
        }

        if let Some(temperature) = cli.temperature {
            self.session.sampling = SamplingPolicy::Randomized { temperature };
        }

        if cli.single_turn {
            self.session.multi_turn = false;
        }

        if cli.vision {
            self.session.vision = true;
        }
    }

    /// Name of the model the selected provider will use
    pub fn active_model(&self) -> &str {
        match self.provider.provider_type.as_str() {
            "ollama" => &self.provider.ollama.model,
            _ => &self.provider.gemini.model,
        }
    }

    /// Validate the configuration
    ///
    /// Ensures all configuration values are within acceptable ranges
    /// and that required fields are properly set.
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.provider.provider_type.is_empty() {
            return Err(GemmaChatError::Config("Provider type cannot be empty".to_string()).into());
        }

        let valid_providers = ["gemini", "ollama"];
        if !valid_providers.contains(&self.provider.provider_type.as_str()) {
            return Err(GemmaChatError::Config(format!(
                "Invalid provider type: {}. Must be one of: {}",
                self.provider.provider_type,
                valid_providers.join(", ")
            ))
            .into());
        }

        if self.provider.gemini.model.trim().is_empty() {
            return Err(
                GemmaChatError::Config("gemini.model cannot be empty".to_string()).into(),
            );
        }

        if self.provider.ollama.model.trim().is_empty() {
            return Err(
                GemmaChatError::Config("ollama.model cannot be empty".to_string()).into(),
            );
        }

        if self.provider.gemini.timeout_seconds == 0 || self.provider.ollama.timeout_seconds == 0 {
            return Err(
                GemmaChatError::Config("timeout_seconds must be greater than 0".to_string()).into(),
            );
        }

        self.session.to_options().validate()?;

        if !is_host_port(&self.server.bind) {
            return Err(GemmaChatError::Config(format!(
                "server.bind must be host:port, got: {}",
                self.server.bind
            ))
            .into());
        }

        if self.server.max_conversations == 0 {
            return Err(GemmaChatError::Config(
                "server.max_conversations must be greater than 0".to_string(),
            )
            .into());
        }

        Ok(())
    }
}

/// Whether `bind` looks like `host:port`, with hostnames left to the resolver
fn is_host_port(bind: &str) -> bool {
    match bind.rsplit_once(':') {
        Some((host, port)) => !host.trim().is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    }
}
