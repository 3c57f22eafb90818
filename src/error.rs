//! Error types for gemma-chat
//!
//! This module defines all error types used throughout the crate,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for gemma-chat operations
///
/// The first four variants are the session taxonomy surfaced by
/// [`ConversationSession`](crate::session::ConversationSession); the rest cover
/// configuration, provider transport, and input loading.
#[derive(Error, Debug)]
pub enum GemmaChatError {
    /// Message was empty or otherwise unusable
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Image attachments were sent to a text-only session
    #[error("Unsupported modality: {0}")]
    UnsupportedModality(String),

    /// A turn is already in flight on this session
    #[error("Another operation is already in progress on this session")]
    ConcurrentOperation,

    /// The completion primitive failed (timeout, quota, transport, malformed response)
    #[error("Generation failed: {cause:#}")]
    Generation {
        /// Underlying failure reported by the provider
        cause: anyhow::Error,
    },

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider-related errors (API calls, unexpected status codes, bad payloads)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Missing credentials for provider
    #[error("Missing credentials for provider: {0}")]
    MissingCredentials(String),

    /// Image loading or decoding errors
    #[error("Image error: {0}")]
    Image(String),

    /// Document loading errors (unsupported format, unreadable content)
    #[error("Document error: {0}")]
    Document(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl GemmaChatError {
    /// Wrap a provider failure as a generation error
    pub fn generation(cause: impl Into<anyhow::Error>) -> Self {
        Self::Generation {
            cause: cause.into(),
        }
    }
}

/// Result type alias for gemma-chat operations
///
/// Uses `anyhow::Error` so context can be attached freely; the session
/// taxonomy is recovered with `err.downcast_ref::<GemmaChatError>()`.
pub type Result<T> = anyhow::Result<T>;
